//! Experiments store: fetched list, current filters, the experiment being
//! viewed, and the tag list.
//!
//! Every failed call records a readable message in `error()` and returns the
//! error to the caller. Overlapping fetches are not sequenced: the response
//! that resolves last overwrites the list.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::client::{ApiClient, HttpTransport, ReqwestTransport};
use crate::api::experiments;
use crate::api::types::{
    Experiment, ExperimentId, ExperimentPatch, ExperimentQuery, ListPayload, NewExperiment,
    NewTag, Tag,
};
use crate::error::ApiError;

pub const FETCH_LIST_FAILED: &str = "Failed to fetch experiments";
pub const FETCH_ONE_FAILED: &str = "Failed to fetch experiment";
pub const CREATE_FAILED: &str = "Failed to create experiment";
pub const UPDATE_FAILED: &str = "Failed to update experiment";
pub const DELETE_FAILED: &str = "Failed to delete experiment";
pub const FETCH_TAGS_FAILED: &str = "Failed to fetch tags";
pub const CREATE_TAG_FAILED: &str = "Failed to create tag";

/// List filters. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentFilters {
    pub search: String,
    /// Comma-separated tag name fragments.
    pub tag: String,
}

/// Partial filter update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct FilterUpdate {
    pub search: Option<String>,
    pub tag: Option<String>,
}

impl ExperimentFilters {
    /// Apply the fields set in `update`, keeping the rest.
    pub fn merge(&mut self, update: FilterUpdate) {
        if let Some(search) = update.search {
            self.search = search;
        }
        if let Some(tag) = update.tag {
            self.tag = tag;
        }
    }

    /// Query with only the non-empty filters set.
    pub fn to_query(&self) -> ExperimentQuery {
        ExperimentQuery {
            search: non_empty(&self.search),
            tag: non_empty(&self.tag),
            ..Default::default()
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Experiment catalog state shared by the CLI commands.
pub struct ExperimentsStore<T = ReqwestTransport> {
    api: Arc<ApiClient<T>>,
    experiments: RwLock<Vec<Experiment>>,
    /// Total across pages, when the backend paginates.
    total: RwLock<Option<u64>>,
    has_next: RwLock<bool>,
    current: RwLock<Option<Experiment>>,
    tags: RwLock<Vec<Tag>>,
    filters: RwLock<ExperimentFilters>,
    loading: RwLock<bool>,
    error: RwLock<Option<String>>,
}

impl<T: HttpTransport> ExperimentsStore<T> {
    /// Empty store over a shared client.
    pub fn new(api: Arc<ApiClient<T>>) -> Self {
        Self {
            api,
            experiments: RwLock::new(Vec::new()),
            total: RwLock::new(None),
            has_next: RwLock::new(false),
            current: RwLock::new(None),
            tags: RwLock::new(Vec::new()),
            filters: RwLock::new(ExperimentFilters::default()),
            loading: RwLock::new(false),
            error: RwLock::new(None),
        }
    }

    /// Fetch the experiment list matching `filters` and replace the stored list.
    pub async fn fetch_list(&self, filters: &ExperimentFilters) -> Result<(), ApiError> {
        self.fetch_query(filters.to_query()).await
    }

    /// Re-fetch using the store's own filters.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let filters = self.filters().await;
        self.fetch_list(&filters).await
    }

    /// Fetch one page using the store's own filters.
    pub async fn fetch_page(&self, page: u32, page_size: u32) -> Result<(), ApiError> {
        let query = ExperimentQuery {
            page: Some(page),
            page_size: Some(page_size),
            ..self.filters().await.to_query()
        };
        self.fetch_query(query).await
    }

    async fn fetch_query(&self, query: ExperimentQuery) -> Result<(), ApiError> {
        let payload = self
            .track(FETCH_LIST_FAILED, experiments::list_experiments(&*self.api, &query))
            .await?;

        if let ListPayload::Unrecognized(ref body) = payload {
            log::warn!("Unrecognized experiment list payload, treating as empty: {}", body);
        }
        let total = payload.total();
        let has_next = payload.has_next_page();
        let items = payload.into_items();
        log::debug!("Fetched {} experiments", items.len());
        *self.experiments.write().await = items;
        *self.total.write().await = total;
        *self.has_next.write().await = has_next;
        Ok(())
    }

    /// Fetch one experiment, make it the current one, and return it.
    pub async fn fetch_one(&self, id: ExperimentId) -> Result<Experiment, ApiError> {
        let experiment = self
            .track(FETCH_ONE_FAILED, experiments::get_experiment(&*self.api, id))
            .await?;
        *self.current.write().await = Some(experiment.clone());
        Ok(experiment)
    }

    /// Create an experiment and put it at the head of the list.
    pub async fn create_experiment(&self, new: &NewExperiment) -> Result<Experiment, ApiError> {
        let created = self
            .track(CREATE_FAILED, experiments::create_experiment(&*self.api, new))
            .await?;
        self.experiments.write().await.insert(0, created.clone());
        log::info!("Created experiment {} ({})", created.id, created.title);
        Ok(created)
    }

    /// Apply a partial update and refresh the local copies.
    pub async fn update_experiment(
        &self,
        id: ExperimentId,
        patch: &ExperimentPatch,
    ) -> Result<Experiment, ApiError> {
        let updated = self
            .track(UPDATE_FAILED, experiments::update_experiment(&*self.api, id, patch))
            .await?;

        if let Some(slot) = self.experiments.write().await.iter_mut().find(|e| e.id == id) {
            *slot = updated.clone();
        }
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|e| e.id == id) {
            *current = Some(updated.clone());
        }
        Ok(updated)
    }

    /// Delete an experiment and drop it from the local copies.
    pub async fn delete_experiment(&self, id: ExperimentId) -> Result<(), ApiError> {
        self.track(DELETE_FAILED, experiments::delete_experiment(&*self.api, id))
            .await?;

        self.experiments.write().await.retain(|e| e.id != id);
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|e| e.id == id) {
            *current = None;
        }
        log::info!("Deleted experiment {}", id);
        Ok(())
    }

    /// Fetch every tag and replace the stored tag list.
    pub async fn fetch_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let tags = self
            .track(FETCH_TAGS_FAILED, experiments::list_tags(&*self.api))
            .await?;
        *self.tags.write().await = tags.clone();
        Ok(tags)
    }

    /// Create a tag and append it to the stored tag list.
    pub async fn create_tag(&self, name: &str) -> Result<Tag, ApiError> {
        let new = NewTag {
            name: name.to_string(),
        };
        let tag = self
            .track(CREATE_TAG_FAILED, experiments::create_tag(&*self.api, &new))
            .await?;
        self.tags.write().await.push(tag.clone());
        Ok(tag)
    }

    /// Shallow-merge a filter update; unspecified fields are preserved.
    pub async fn set_filters(&self, update: FilterUpdate) {
        self.filters.write().await.merge(update);
    }

    /// Current filters.
    pub async fn filters(&self) -> ExperimentFilters {
        self.filters.read().await.clone()
    }

    /// Experiments from the last successful list fetch, in server order.
    pub async fn experiments(&self) -> Vec<Experiment> {
        self.experiments.read().await.clone()
    }

    /// Total across pages from the last list fetch, if the server paginated.
    pub async fn total(&self) -> Option<u64> {
        *self.total.read().await
    }

    /// Whether the last list fetch reported a further page.
    pub async fn has_next_page(&self) -> bool {
        *self.has_next.read().await
    }

    /// Experiment most recently fetched with `fetch_one`.
    pub async fn current(&self) -> Option<Experiment> {
        self.current.read().await.clone()
    }

    /// Tags from the last tag fetch, plus any created since.
    pub async fn tags(&self) -> Vec<Tag> {
        self.tags.read().await.clone()
    }

    /// True while a request is running.
    pub async fn is_loading(&self) -> bool {
        *self.loading.read().await
    }

    /// Message from the last failed request, cleared when the next one starts.
    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    /// Run one request with `loading` set and `error` cleared, recording a
    /// readable message if it fails.
    async fn track<R, F>(&self, fallback: &str, request: F) -> Result<R, ApiError>
    where
        F: Future<Output = Result<R, ApiError>>,
    {
        *self.loading.write().await = true;
        *self.error.write().await = None;

        let result = request.await;
        if let Err(ref e) = result {
            let message = e.describe(fallback);
            log::warn!("{}: {}", fallback, message);
            *self.error.write().await = Some(message);
        }

        *self.loading.write().await = false;
        result
    }
}
