//! Experiment and tag endpoints.
//!
//! Reads are public and go out without a CSRF token. Writes require a
//! superuser session and carry `X-CSRFToken` when one can be resolved.

use super::client::{ApiClient, HttpTransport};
use super::types::{
    Experiment, ExperimentId, ExperimentPatch, ExperimentQuery, ListPayload, NewExperiment, NewTag,
    Tag,
};
use crate::error::ApiError;

pub const EXPERIMENTS_PATH: &str = "/experiments/";
pub const TAGS_PATH: &str = "/tags/";

pub fn experiment_path(id: ExperimentId) -> String {
    format!("{}{}/", EXPERIMENTS_PATH, id)
}

/// GET /experiments/ with optional pagination and filters.
///
/// The raw payload is returned so callers can read pagination info before
/// flattening it with `into_items()`.
pub async fn list_experiments<T: HttpTransport>(
    client: &ApiClient<T>,
    query: &ExperimentQuery,
) -> Result<ListPayload<Experiment>, ApiError> {
    client.get_with_query(EXPERIMENTS_PATH, query.to_pairs()).await
}

/// GET /experiments/{id}/.
pub async fn get_experiment<T: HttpTransport>(
    client: &ApiClient<T>,
    id: ExperimentId,
) -> Result<Experiment, ApiError> {
    client.get(&experiment_path(id)).await
}

/// POST /experiments/.
pub async fn create_experiment<T: HttpTransport>(
    client: &ApiClient<T>,
    experiment: &NewExperiment,
) -> Result<Experiment, ApiError> {
    client.authenticated_post(EXPERIMENTS_PATH, experiment).await
}

/// PATCH /experiments/{id}/.
pub async fn update_experiment<T: HttpTransport>(
    client: &ApiClient<T>,
    id: ExperimentId,
    patch: &ExperimentPatch,
) -> Result<Experiment, ApiError> {
    client.authenticated_patch(&experiment_path(id), patch).await
}

/// DELETE /experiments/{id}/.
pub async fn delete_experiment<T: HttpTransport>(
    client: &ApiClient<T>,
    id: ExperimentId,
) -> Result<(), ApiError> {
    client.authenticated_delete(&experiment_path(id)).await
}

/// GET /tags/.
pub async fn list_tags<T: HttpTransport>(client: &ApiClient<T>) -> Result<Vec<Tag>, ApiError> {
    let payload: ListPayload<Tag> = client.get(TAGS_PATH).await?;
    Ok(payload.into_items())
}

/// POST /tags/.
pub async fn create_tag<T: HttpTransport>(
    client: &ApiClient<T>,
    tag: &NewTag,
) -> Result<Tag, ApiError> {
    client.authenticated_post(TAGS_PATH, tag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::csrf::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME, CSRF_TOKEN_PATH};
    use crate::api::mock::MockTransport;
    use reqwest::Method;
    use serde_json::{json, Value};

    fn experiment(id: u64) -> Value {
        json!({"id": id, "title": "Beam test", "date": "2025-03-01", "tags": []})
    }

    #[tokio::test]
    async fn test_reads_never_fetch_token() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, EXPERIMENTS_PATH, 200, json!([experiment(1)]));
        transport.respond(Method::GET, "/experiments/1/", 200, experiment(1));
        transport.respond(Method::GET, TAGS_PATH, 200, json!([{"id": 1, "name": "gpu"}]));
        let client = ApiClient::with_transport(transport);

        list_experiments(&client, &ExperimentQuery::default()).await.unwrap();
        get_experiment(&client, 1).await.unwrap();
        assert_eq!(list_tags(&client).await.unwrap().len(), 1);

        let transport = client.transport();
        assert_eq!(transport.count(Method::GET, CSRF_TOKEN_PATH), 0);
        assert!(transport.requests().iter().all(|r| r.header(CSRF_HEADER_NAME).is_none()));
    }

    #[tokio::test]
    async fn test_list_sends_query() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, EXPERIMENTS_PATH, 200, json!({"results": []}));
        let client = ApiClient::with_transport(transport);

        let query = ExperimentQuery {
            page: Some(2),
            tag: Some("gpu".into()),
            ..Default::default()
        };
        list_experiments(&client, &query).await.unwrap();

        let sent = client.transport().last(Method::GET, EXPERIMENTS_PATH).unwrap();
        assert_eq!(sent.path_and_query(), "/experiments/?page=2&tag=gpu");
    }

    #[tokio::test]
    async fn test_writes_attach_token_from_cookie() {
        let transport = MockTransport::new();
        transport.set_cookie(CSRF_COOKIE_NAME, "cookie-tok");
        transport.respond(Method::POST, EXPERIMENTS_PATH, 201, experiment(9));
        transport.respond(Method::PATCH, "/experiments/9/", 200, experiment(9));
        transport.respond(Method::DELETE, "/experiments/9/", 204, Value::Null);
        transport.respond(Method::POST, TAGS_PATH, 201, json!({"id": 5, "name": "laser"}));
        let client = ApiClient::with_transport(transport);

        let new = NewExperiment {
            title: "Beam test".into(),
            ..Default::default()
        };
        assert_eq!(create_experiment(&client, &new).await.unwrap().id, 9);
        let patch = ExperimentPatch {
            title: Some("Beam test 2".into()),
            ..Default::default()
        };
        update_experiment(&client, 9, &patch).await.unwrap();
        delete_experiment(&client, 9).await.unwrap();
        let tag = create_tag(&client, &NewTag { name: "laser".into() }).await.unwrap();
        assert_eq!(tag.id, 5);

        let transport = client.transport();
        assert_eq!(transport.count(Method::GET, CSRF_TOKEN_PATH), 0);
        assert_eq!(transport.requests().len(), 4);
        for request in transport.requests() {
            assert_eq!(request.header(CSRF_HEADER_NAME), Some("cookie-tok"));
        }
    }

    #[tokio::test]
    async fn test_write_proceeds_without_token() {
        let transport = MockTransport::new();
        transport.fail(Method::GET, CSRF_TOKEN_PATH, "timed out");
        transport.respond(
            Method::POST,
            TAGS_PATH,
            403,
            json!({"detail": "CSRF Failed: CSRF token missing."}),
        );
        let client = ApiClient::with_transport(transport);

        let err = create_tag(&client, &NewTag { name: "x".into() }).await.unwrap_err();
        assert_eq!(err.status(), Some(403));

        let sent = client.transport().last(Method::POST, TAGS_PATH).unwrap();
        assert_eq!(sent.header(CSRF_HEADER_NAME), None);
    }

    #[tokio::test]
    async fn test_rejection_carries_body() {
        let transport = MockTransport::new();
        transport.set_cookie(CSRF_COOKIE_NAME, "t");
        transport.respond(
            Method::POST,
            EXPERIMENTS_PATH,
            403,
            json!({"error": "Only superusers can create experiments"}),
        );
        let client = ApiClient::with_transport(transport);

        let err = create_experiment(&client, &NewExperiment::default())
            .await
            .unwrap_err();
        assert_eq!(err.describe("fallback"), "Only superusers can create experiments");
    }
}
