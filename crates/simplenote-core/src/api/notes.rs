//! Remote CRUD for notes. Every call is authenticated.

use super::{ApiError, ApiRequest, RequestAuthenticator};
use crate::models::{Note, NoteRequest, PaginatedResponse};

/// Default page size for note listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Clone)]
pub struct NotesApi {
    authenticator: RequestAuthenticator,
}

impl NotesApi {
    pub fn new(authenticator: RequestAuthenticator) -> Self {
        Self { authenticator }
    }

    pub async fn list(&self, page: u32, page_size: u32) -> Result<PaginatedResponse<Note>, ApiError> {
        let request = ApiRequest::get("notes/")
            .query("page", page)
            .query("page_size", page_size);
        self.authenticator.send_json(request).await
    }

    pub async fn get(&self, id: i64) -> Result<Note, ApiError> {
        self.authenticator
            .send_json(ApiRequest::get(format!("notes/{}/", id)))
            .await
    }

    pub async fn create(&self, note: &NoteRequest) -> Result<Note, ApiError> {
        let request = ApiRequest::post("notes/").json(note)?;
        self.authenticator.send_json(request).await
    }

    pub async fn update(&self, id: i64, note: &NoteRequest) -> Result<Note, ApiError> {
        let request = ApiRequest::put(format!("notes/{}/", id)).json(note)?;
        self.authenticator.send_json(request).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.authenticator
            .send_empty(ApiRequest::delete(format!("notes/{}/", id)))
            .await
    }

    /// Server-side filter; any field left `None` is not constrained
    pub async fn filter(
        &self,
        title: Option<&str>,
        content: Option<&str>,
        description: Option<&str>,
    ) -> Result<Vec<Note>, ApiError> {
        let mut request = ApiRequest::get("notes/filter");
        for (key, value) in [("title", title), ("content", content), ("description", description)] {
            if let Some(value) = value {
                request = request.query(key, value);
            }
        }
        self.authenticator.send_json(request).await
    }

    pub async fn bulk_create(&self, notes: &[NoteRequest]) -> Result<PaginatedResponse<Note>, ApiError> {
        let request = ApiRequest::post("notes/bulk").json(&notes)?;
        self.authenticator.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AuthApi;
    use crate::auth::{SessionAuthority, TokenStore};
    use crate::testing::{json_response, status_response, FakeTransport};
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn api(transport: Arc<FakeTransport>) -> NotesApi {
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let authority = SessionAuthority::new(store.clone(), AuthApi::new(transport.clone()));
        NotesApi::new(RequestAuthenticator::new(transport, store, authority))
    }

    fn note_json(id: i64) -> serde_json::Value {
        json!({
            "id": id, "title": "T", "description": "D",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_sends_paging_and_token() {
        let transport = FakeTransport::new(|_| {
            json_response(200, json!({"count": 1, "next": null, "previous": null, "results": [note_json(4)]}))
        });
        let page = api(transport.clone()).list(2, 50).await.expect("list");
        assert_eq!(page.results[0].id, 4);

        let sent = &transport.requests()[0];
        assert_eq!(sent.path, "notes/");
        assert_eq!(sent.bearer.as_deref(), Some("A1"));
        assert!(sent.query.contains(&("page".to_string(), "2".to_string())));
        assert!(sent.query.contains(&("page_size".to_string(), "50".to_string())));
    }

    #[tokio::test]
    async fn test_update_and_delete_paths() {
        let transport = FakeTransport::new(|req| {
            if req.method == Method::DELETE {
                status_response(204)
            } else {
                json_response(200, note_json(8))
            }
        });
        let api = api(transport.clone());

        let request = NoteRequest {
            title: "T".to_string(),
            description: "D".to_string(),
        };
        assert_eq!(api.update(8, &request).await.expect("update").id, 8);
        api.delete(8).await.expect("delete");

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::PUT);
        assert_eq!(sent[0].path, "notes/8/");
        assert_eq!(sent[1].method, Method::DELETE);
        assert_eq!(sent[1].path, "notes/8/");
    }

    #[tokio::test]
    async fn test_filter_only_sends_given_fields() {
        let transport = FakeTransport::new(|_| json_response(200, json!([note_json(1)])));
        let found = api(transport.clone()).filter(Some("gro"), None, None).await.expect("filter");
        assert_eq!(found.len(), 1);
        assert_eq!(transport.requests()[0].query, vec![("title".to_string(), "gro".to_string())]);
    }

    #[tokio::test]
    async fn test_bulk_create_posts_array() {
        let transport = FakeTransport::new(|_| {
            json_response(201, json!({"count": 2, "next": null, "previous": null, "results": [note_json(1), note_json(2)]}))
        });
        let notes = vec![
            NoteRequest { title: "a".to_string(), description: "1".to_string() },
            NoteRequest { title: "b".to_string(), description: "2".to_string() },
        ];
        let created = api(transport.clone()).bulk_create(&notes).await.expect("bulk");
        assert_eq!(created.results.len(), 2);

        let sent = &transport.requests()[0];
        assert_eq!(sent.path, "notes/bulk");
        assert_eq!(sent.body.as_ref().and_then(|b| b.as_array()).map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_missing_note_is_not_found() {
        let transport = FakeTransport::new(|_| status_response(404));
        assert!(matches!(api(transport).get(99).await, Err(ApiError::NotFound(_))));
    }
}
