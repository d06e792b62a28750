use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub creator_username: Option<String>,
}

impl Note {
    /// Notes created while the server was unreachable carry negative ids
    /// until they are recreated remotely.
    pub fn is_local_only(&self) -> bool {
        self.id < 0
    }

    /// Case-insensitive match against title and description
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paginated_notes() {
        let json = r#"{
            "count": 1, "next": null, "previous": null,
            "results": [{
                "id": 12, "title": "Groceries", "description": "Milk, eggs",
                "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-02T08:30:00Z",
                "creator_name": "Bob Builder", "creator_username": "bob"
            }]
        }"#;
        let page: PaginatedResponse<Note> = serde_json::from_str(json).expect("parse page");
        assert_eq!(page.count, 1);
        assert!(page.next.is_none());
        assert_eq!(page.results[0].title, "Groceries");
        assert_eq!(page.results[0].creator_username.as_deref(), Some("bob"));
        assert!(!page.results[0].is_local_only());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let note = Note {
            id: -1,
            title: "Groceries".to_string(),
            description: "Milk and EGGS".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            creator_name: None,
            creator_username: None,
        };
        assert!(note.matches("grocer"));
        assert!(note.matches("eggs"));
        assert!(!note.matches("bread"));
        assert!(note.is_local_only());
    }
}
