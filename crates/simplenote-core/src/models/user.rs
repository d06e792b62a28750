use serde::{Deserialize, Serialize};

/// Account profile returned by `auth/userinfo/`.
///
/// Only one user is ever cached locally; it is overwritten on every
/// successful login or profile fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(rename = "firstName", alias = "first_name", default)]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", alias = "last_name", default)]
    pub last_name: Option<String>,
}

impl User {
    /// Full name if known, otherwise the username
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: 7,
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(user(Some("Bob"), Some("Builder")).display_name(), "Bob Builder");
        assert_eq!(user(None, Some("Builder")).display_name(), "Builder");
        assert_eq!(user(Some(" "), None).display_name(), "bob");
        assert_eq!(user(None, None).display_name(), "bob");
    }

    #[test]
    fn test_parse_snake_case_names() {
        let json = r#"{"id": 3, "username": "amy", "email": "a@b.c", "first_name": "Amy"}"#;
        let u: User = serde_json::from_str(json).expect("parse user");
        assert_eq!(u.first_name.as_deref(), Some("Amy"));
        assert_eq!(u.last_name, None);
    }
}
