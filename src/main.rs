use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use experiments_client::api::types::{ExperimentId, ExperimentPatch, NewExperiment, TagId};
use experiments_client::commands::{self, Credentials, ListOptions};
use experiments_client::{AppState, ClientConfig};

mod cli {
    use super::*;

    #[derive(Parser, Debug)]
    #[command(name = "experiments-client", version, about = "Browse and edit the experiments catalog")]
    pub struct Args {
        /// API root URL (overrides EXPERIMENTS_API_URL / VITE_API_URL)
        #[arg(long, global = true)]
        pub api_url: Option<String>,

        /// Username for commands that need a session
        #[arg(long, env = "EXPERIMENTS_USERNAME", global = true)]
        pub username: Option<String>,

        /// Password for commands that need a session
        #[arg(long, env = "EXPERIMENTS_PASSWORD", global = true, hide_env_values = true)]
        pub password: Option<String>,

        /// Where the login session is kept between runs
        /// (overrides EXPERIMENTS_SESSION_FILE)
        #[arg(long, global = true)]
        pub session_file: Option<PathBuf>,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Subcommand, Debug)]
    pub enum Command {
        /// Show the user of the saved session
        Whoami,
        /// Log in, show the resulting identity and save the session for later runs
        Login,
        /// End the saved session and delete it
        Logout,
        /// List experiments
        List {
            #[arg(long)]
            search: Option<String>,
            /// Comma-separated tag name fragments
            #[arg(long)]
            tag: Option<String>,
            #[arg(long)]
            page: Option<u32>,
            #[arg(long)]
            page_size: Option<u32>,
        },
        /// Show one experiment
        Show { id: ExperimentId },
        /// Create an experiment (superuser only)
        Create {
            #[arg(long)]
            title: String,
            #[arg(long)]
            description: Option<String>,
            /// YYYY-MM-DD, defaults to today on the server
            #[arg(long)]
            date: Option<String>,
            #[arg(long)]
            github_url: Option<String>,
            #[arg(long)]
            content: Option<String>,
            #[arg(long = "tag-id")]
            tag_ids: Vec<TagId>,
        },
        /// Update fields of an experiment (superuser only)
        Update {
            id: ExperimentId,
            #[arg(long)]
            title: Option<String>,
            #[arg(long)]
            description: Option<String>,
            #[arg(long)]
            date: Option<String>,
            #[arg(long)]
            github_url: Option<String>,
            #[arg(long)]
            content: Option<String>,
            /// Replaces the tag set; repeat for several tags
            #[arg(long = "tag-id")]
            tag_ids: Option<Vec<TagId>>,
        },
        /// Delete an experiment (superuser only)
        Delete { id: ExperimentId },
        /// List tags
        Tags,
        /// Create a tag (superuser only)
        TagCreate { name: String },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    env_logger::init();

    let args = cli::Args::parse();
    let mut config = ClientConfig::from_env(args.api_url.as_deref());
    if let Some(path) = args.session_file {
        config.session_file = Some(path);
    }
    log::debug!("Using API at {}", config.base_url);

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    match state.restore_session() {
        Ok(0) => {}
        Ok(count) => log::debug!("Restored {} session cookies", count),
        Err(e) => log::warn!("Ignoring saved session: {}", e),
    }

    let credentials = match (args.username, args.password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        _ => None,
    };
    let credentials = credentials.as_ref();

    let result = match args.command {
        cli::Command::Whoami => commands::whoami(&state).await,
        cli::Command::Login => commands::login(&state, credentials).await,
        cli::Command::Logout => commands::logout(&state, credentials).await,
        cli::Command::List {
            search,
            tag,
            page,
            page_size,
        } => {
            let options = ListOptions {
                search,
                tag,
                page,
                page_size,
            };
            commands::list(&state, options).await
        }
        cli::Command::Show { id } => commands::show(&state, id).await,
        cli::Command::Create {
            title,
            description,
            date,
            github_url,
            content,
            tag_ids,
        } => {
            let new = NewExperiment {
                title,
                description,
                github_url,
                content,
                date,
                tag_ids,
            };
            commands::create(&state, credentials, new).await
        }
        cli::Command::Update {
            id,
            title,
            description,
            date,
            github_url,
            content,
            tag_ids,
        } => {
            let patch = ExperimentPatch {
                title,
                description,
                github_url,
                content,
                date,
                tag_ids,
            };
            commands::update(&state, credentials, id, patch).await
        }
        cli::Command::Delete { id } => commands::delete(&state, credentials, id).await,
        cli::Command::Tags => commands::tags(&state).await,
        cli::Command::TagCreate { name } => commands::create_tag(&state, credentials, &name).await,
    };

    if let Err(e) = state.persist_session() {
        log::warn!("Could not save session: {}", e);
    }

    let toasts = state.toasts.drain();
    for toast in &toasts {
        eprintln!("[{}] {}", toast.kind.label(), toast.message);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Store failures were already shown as toasts
            if !toasts.iter().any(|t| t.message == e) {
                eprintln!("error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}
