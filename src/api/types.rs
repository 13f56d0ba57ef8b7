//! Request and response types for the experiments backend API.
//!
//! Field names follow the backend's snake_case JSON, except the CSRF
//! endpoint which answers in camelCase.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub type ExperimentId = u64;
pub type TagId = u64;

/// Authenticated user as reported by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Only a literal `true` counts; missing, null or any other value is `false`.
    #[serde(default, deserialize_with = "exactly_true")]
    pub is_superuser: bool,
}

fn exactly_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Experiment as returned by list and detail reads. Tags are embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body for POST /experiments/. Tags are referenced by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewExperiment {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Defaults to today on the backend when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub tag_ids: Vec<TagId>,
}

/// Body for PATCH /experiments/{id}/. Only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExperimentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<TagId>>,
}

impl ExperimentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.github_url.is_none()
            && self.content.is_none()
            && self.date.is_none()
            && self.tag_ids.is_none()
    }
}

/// Body for POST /tags/.
#[derive(Debug, Clone, Serialize)]
pub struct NewTag {
    pub name: String,
}

/// Query for GET /experiments/. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    /// Comma-separated tag name fragments.
    pub tag: Option<String>,
}

impl ExperimentQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            pairs.push(("page_size".to_string(), page_size.to_string()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        if let Some(ref tag) = self.tag {
            pairs.push(("tag".to_string(), tag.clone()));
        }
        pairs
    }
}

/// List endpoints answer with a bare array when pagination is off and with
/// an envelope when it is on.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Bare(Vec<T>),
    Paginated {
        results: Vec<T>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
    },
    Wrapped {
        data: Vec<T>,
    },
    /// Any other shape, including `{}` and `null`. Treated as an empty list.
    Unrecognized(Value),
}

impl<T> ListPayload<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListPayload::Bare(items) => items,
            ListPayload::Paginated { results, .. } => results,
            ListPayload::Wrapped { data } => data,
            ListPayload::Unrecognized(_) => Vec::new(),
        }
    }

    /// Total item count across pages, when the backend paginates.
    pub fn total(&self) -> Option<u64> {
        match self {
            ListPayload::Paginated { count, .. } => *count,
            _ => None,
        }
    }

    pub fn has_next_page(&self) -> bool {
        matches!(self, ListPayload::Paginated { next: Some(_), .. })
    }
}

/// Login request body sent to POST /auth/login/. Wiped on drop.
#[derive(Serialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response from POST /auth/login/.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<User>,
    /// Set only for a non-empty string; lists, objects and `""` decode as `None`.
    #[serde(default, deserialize_with = "non_empty_text")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub message: Option<String>,
}

impl LoginResponse {
    /// Failure reason the server gave, `error` before `message`.
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

fn non_empty_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) if !text.is_empty() => Some(text),
        _ => None,
    })
}

/// Response from GET /auth/current-user/.
#[derive(Debug, Deserialize)]
pub struct CurrentUserResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn experiment_json(id: u64) -> Value {
        json!({"id": id, "title": format!("exp {}", id), "date": "2025-01-02", "tags": [{"id": 1, "name": "gpu"}]})
    }

    #[test]
    fn test_list_payload_bare() {
        let payload: ListPayload<Experiment> =
            serde_json::from_value(json!([experiment_json(1), experiment_json(2)])).unwrap();
        let items = payload.into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, 2);
        assert_eq!(items[0].tags[0].name, "gpu");
    }

    #[test]
    fn test_list_payload_results_envelope() {
        let payload: ListPayload<Experiment> = serde_json::from_value(
            json!({"count": 12, "next": "http://x/api/experiments/?page=2", "previous": null, "results": [experiment_json(3)]}),
        )
        .unwrap();
        assert_eq!(payload.total(), Some(12));
        assert!(payload.has_next_page());
        assert_eq!(payload.into_items()[0].id, 3);
    }

    #[test]
    fn test_list_payload_data_envelope() {
        let payload: ListPayload<Experiment> =
            serde_json::from_value(json!({"data": [experiment_json(4)]})).unwrap();
        assert_eq!(payload.total(), None);
        assert_eq!(payload.into_items()[0].id, 4);
    }

    #[test]
    fn test_list_payload_null_results_falls_through_to_data() {
        let payload: ListPayload<Tag> =
            serde_json::from_value(json!({"results": null, "data": [{"id": 1, "name": "a"}]})).unwrap();
        assert_eq!(payload.into_items().len(), 1);
    }

    #[test]
    fn test_login_response_reason_skips_empty_error() {
        let resp: LoginResponse = serde_json::from_value(
            json!({"success": false, "error": "", "message": "Account disabled"}),
        )
        .unwrap();
        assert_eq!(resp.reason(), Some("Account disabled"));
    }

    #[test]
    fn test_login_response_non_string_reason() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"success": false, "error": ["Invalid credentials"], "message": null}))
                .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.reason(), None);
    }

    #[test]
    fn test_list_payload_unrecognized_is_empty() {
        for body in [json!({}), Value::Null, json!("oops"), json!({"results": "x"})] {
            let payload: ListPayload<Tag> = serde_json::from_value(body).unwrap();
            assert!(payload.into_items().is_empty());
        }
    }

    #[test]
    fn test_superuser_requires_literal_true() {
        let cases = [
            (json!({"id": 1, "is_superuser": true}), true),
            (json!({"id": 1, "is_superuser": false}), false),
            (json!({"id": 1, "is_superuser": "true"}), false),
            (json!({"id": 1, "is_superuser": 1}), false),
            (json!({"id": 1, "is_superuser": null}), false),
            (json!({"id": 1}), false),
        ];
        for (body, expected) in cases {
            let user: User = serde_json::from_value(body.clone()).unwrap();
            assert_eq!(user.is_superuser, expected, "body: {}", body);
        }
    }

    #[test]
    fn test_query_skips_unset_fields() {
        let query = ExperimentQuery {
            search: Some("laser".into()),
            page_size: Some(20),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page_size".to_string(), "20".to_string()),
                ("search".to_string(), "laser".to_string()),
            ]
        );
        assert!(ExperimentQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = ExperimentPatch {
            title: Some("renamed".into()),
            tag_ids: Some(vec![2, 3]),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"title": "renamed", "tag_ids": [2, 3]})
        );
        assert!(ExperimentPatch::default().is_empty());
    }

    #[test]
    fn test_new_experiment_omits_missing_date() {
        let new = NewExperiment {
            title: "t".into(),
            tag_ids: vec![1],
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&new).unwrap(), json!({"title": "t", "tag_ids": [1]}));
    }
}
