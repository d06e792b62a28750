use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::warn;

use super::manager::CacheManager;
use crate::models::User;

const USER_CACHE: &str = "user";

/// The signed-in user's profile. At most one is ever kept.
#[derive(Clone)]
pub struct UserCache {
    files: CacheManager,
    current: Arc<watch::Sender<Option<User>>>,
}

impl UserCache {
    pub fn open(files: CacheManager) -> Self {
        let user = match files.load::<User>(USER_CACHE) {
            Ok(cached) => cached.map(|c| c.data),
            Err(e) => {
                warn!(error = %e, "Failed to load cached user");
                None
            }
        };
        let (current, _) = watch::channel(user);
        Self {
            files,
            current: Arc::new(current),
        }
    }

    pub fn get(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    /// Overwrite the cached profile
    pub fn put(&self, user: User) -> Result<()> {
        self.files.save(USER_CACHE, &user)?;
        self.current.send_replace(Some(user));
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.files.remove(USER_CACHE)?;
        self.current.send_replace(None);
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            id: 1,
            username: name.to_string(),
            email: format!("{}@example.com", name),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_put_overwrites_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = CacheManager::new(dir.path().to_path_buf()).expect("files");
        let cache = UserCache::open(files.clone());
        assert!(cache.get().is_none());

        cache.put(user("bob")).expect("put");
        cache.put(user("amy")).expect("put");
        assert_eq!(cache.get().expect("user").username, "amy");
        assert_eq!(UserCache::open(files.clone()).get().expect("user").username, "amy");

        cache.clear().expect("clear");
        assert!(cache.get().is_none());
        assert!(UserCache::open(files).get().is_none());
    }
}
