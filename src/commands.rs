//! CLI command handlers.
//!
//! Each handler drives the stores the way a view would and reports outcomes
//! through the toast store. Handlers return `Err(String)` with a message
//! ready for the terminal.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::api::client::HttpTransport;
use crate::api::types::{Experiment, ExperimentId, ExperimentPatch, NewExperiment};
use crate::state::AppState;
use crate::store::FilterUpdate;

/// Username and password for commands that need a session. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Filter and paging options for `list`.
#[derive(Debug, Default)]
pub struct ListOptions {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Show who the session cookie belongs to.
pub async fn whoami<T: HttpTransport>(state: &AppState<T>) -> Result<(), String> {
    if !state.auth.check_auth().await {
        println!("{}", state.auth.status().await.label());
        return Ok(());
    }
    print_identity(state).await;
    Ok(())
}

/// Log in and show the resulting identity.
pub async fn login<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
) -> Result<(), String> {
    let credentials = credentials.ok_or("--username and --password are required to log in")?;
    let outcome = state
        .auth
        .login(&credentials.username, &credentials.password)
        .await;

    if !outcome.success {
        let message = outcome.error.unwrap_or_default();
        state.toasts.error(message.clone());
        return Err(message);
    }

    state.toasts.success(format!("Logged in as {}", credentials.username));
    print_identity(state).await;
    Ok(())
}

/// Log out and delete the saved session. Logs in first when credentials are
/// supplied and no saved session is live.
pub async fn logout<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
) -> Result<(), String> {
    if credentials.is_some() {
        ensure_session(state, credentials).await?;
    }
    state.auth.logout().await;
    if let Err(e) = state.forget_session() {
        log::warn!("Could not remove saved session: {}", e);
    }
    state.toasts.info("Logged out");
    Ok(())
}

/// List experiments matching the given filters, one page or all of them.
pub async fn list<T: HttpTransport>(state: &AppState<T>, options: ListOptions) -> Result<(), String> {
    state
        .experiments
        .set_filters(FilterUpdate {
            search: options.search,
            tag: options.tag,
        })
        .await;

    let page = options.page.unwrap_or(1);
    let result = match (options.page, options.page_size) {
        (None, None) => state.experiments.refresh().await,
        (_, page_size) => {
            state
                .experiments
                .fetch_page(page, page_size.unwrap_or(20))
                .await
        }
    };
    if result.is_err() {
        return Err(report_store_error(state).await);
    }

    let experiments = state.experiments.experiments().await;
    if experiments.is_empty() {
        println!("No experiments found");
    }
    for experiment in &experiments {
        println!("{}", format_experiment_line(experiment));
    }
    if let Some(total) = state.experiments.total().await {
        println!("({} of {} shown)", experiments.len(), total);
    }
    if state.experiments.has_next_page().await {
        println!("More results: --page {}", page + 1);
    }
    Ok(())
}

/// Print one experiment in full.
pub async fn show<T: HttpTransport>(state: &AppState<T>, id: ExperimentId) -> Result<(), String> {
    match state.experiments.fetch_one(id).await {
        Ok(experiment) => {
            println!("{}", format_experiment_detail(&experiment));
            Ok(())
        }
        Err(_) => Err(report_store_error(state).await),
    }
}

/// Create an experiment. Superuser only.
pub async fn create<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
    new: NewExperiment,
) -> Result<(), String> {
    require_superuser(state, credentials, "Only superusers can create experiments").await?;

    match state.experiments.create_experiment(&new).await {
        Ok(created) => {
            state
                .toasts
                .success(format!("Created experiment {} ({})", created.id, created.title));
            println!("{}", format_experiment_line(&created));
            Ok(())
        }
        Err(_) => Err(report_store_error(state).await),
    }
}

/// Apply a partial update to an experiment. Superuser only.
pub async fn update<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
    id: ExperimentId,
    patch: ExperimentPatch,
) -> Result<(), String> {
    if patch.is_empty() {
        return Err("Nothing to update".to_string());
    }
    require_superuser(state, credentials, "Only superusers can update experiments").await?;

    match state.experiments.update_experiment(id, &patch).await {
        Ok(updated) => {
            state.toasts.success(format!("Updated experiment {}", updated.id));
            println!("{}", format_experiment_line(&updated));
            Ok(())
        }
        Err(_) => Err(report_store_error(state).await),
    }
}

/// Delete an experiment. Superuser only.
pub async fn delete<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
    id: ExperimentId,
) -> Result<(), String> {
    require_superuser(state, credentials, "Only superusers can delete experiments").await?;

    match state.experiments.delete_experiment(id).await {
        Ok(()) => {
            state.toasts.success(format!("Deleted experiment {}", id));
            Ok(())
        }
        Err(_) => Err(report_store_error(state).await),
    }
}

/// Print every tag.
pub async fn tags<T: HttpTransport>(state: &AppState<T>) -> Result<(), String> {
    match state.experiments.fetch_tags().await {
        Ok(tags) => {
            for tag in tags {
                println!("{:>5}  {}", tag.id, tag.name);
            }
            Ok(())
        }
        Err(_) => Err(report_store_error(state).await),
    }
}

/// Create a tag. Superuser only.
pub async fn create_tag<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
    name: &str,
) -> Result<(), String> {
    require_superuser(state, credentials, "Only superusers can create tags").await?;

    match state.experiments.create_tag(name).await {
        Ok(tag) => {
            state.toasts.success(format!("Created tag {} ({})", tag.name, tag.id));
            Ok(())
        }
        Err(_) => Err(report_store_error(state).await),
    }
}

/// Reuse a live session or log in with the given credentials.
async fn ensure_session<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
) -> Result<(), String> {
    if state.auth.check_auth().await {
        return Ok(());
    }
    let credentials =
        credentials.ok_or("Not logged in: pass --username and --password (or set EXPERIMENTS_USERNAME / EXPERIMENTS_PASSWORD)")?;

    let outcome = state
        .auth
        .login(&credentials.username, &credentials.password)
        .await;
    if outcome.success {
        Ok(())
    } else {
        let message = outcome.error.unwrap_or_default();
        state.toasts.error(message.clone());
        Err(message)
    }
}

async fn require_superuser<T: HttpTransport>(
    state: &AppState<T>,
    credentials: Option<&Credentials>,
    denied: &str,
) -> Result<(), String> {
    ensure_session(state, credentials).await?;
    if state.auth.is_superuser().await {
        Ok(())
    } else {
        state.toasts.error(denied);
        Err(denied.to_string())
    }
}

/// Surface the store's error as a toast and return it for the exit message.
async fn report_store_error<T: HttpTransport>(state: &AppState<T>) -> String {
    let message = state
        .experiments
        .error()
        .await
        .unwrap_or_else(|| "Request failed".to_string());
    state.toasts.error(message.clone());
    message
}

async fn print_identity<T: HttpTransport>(state: &AppState<T>) {
    match state.auth.user().await {
        Some(user) => {
            let role = if state.auth.is_superuser().await {
                "superuser"
            } else {
                "user"
            };
            println!("{} (id {}, {})", user.username, user.id, role);
        }
        None => println!("{}", state.auth.status().await.label()),
    }
}

/// One-line summary: id, date, title and tag names.
pub fn format_experiment_line(experiment: &Experiment) -> String {
    let tags = experiment
        .tags
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if tags.is_empty() {
        format!("{:>5}  {}  {}", experiment.id, experiment.date, experiment.title)
    } else {
        format!(
            "{:>5}  {}  {}  [{}]",
            experiment.id, experiment.date, experiment.title, tags
        )
    }
}

/// Multi-line view of a single experiment.
pub fn format_experiment_detail(experiment: &Experiment) -> String {
    let mut lines = vec![
        format!("#{} {}", experiment.id, experiment.title),
        format!("date: {}", experiment.date),
    ];
    if !experiment.tags.is_empty() {
        let names: Vec<&str> = experiment.tags.iter().map(|t| t.name.as_str()).collect();
        lines.push(format!("tags: {}", names.join(", ")));
    }
    if let Some(ref url) = experiment.github_url {
        if !url.is_empty() {
            lines.push(format!("github: {}", url));
        }
    }
    if let Some(ref description) = experiment.description {
        if !description.is_empty() {
            lines.push(String::new());
            lines.push(description.clone());
        }
    }
    if let Some(ref content) = experiment.content {
        if !content.is_empty() {
            lines.push(String::new());
            lines.push(content.clone());
        }
    }
    lines.join("\n")
}
