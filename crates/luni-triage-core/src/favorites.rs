//! Provider favorites with optimistic toggling.
//!
//! The local set changes first so the UI reacts immediately; the backend
//! write follows, and the local change is reverted if that write fails.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::db::DbResult;

/// Storage for a user's favorite providers.
pub trait FavoritesBackend {
    fn add_favorite(&self, user_id: &str, provider_id: &str) -> DbResult<()>;
    fn remove_favorite(&self, user_id: &str, provider_id: &str) -> DbResult<()>;
    fn list_favorites(&self, user_id: &str) -> DbResult<Vec<String>>;
}

/// A user's favorites, cached locally over a backend.
pub struct Favorites<'a> {
    backend: &'a dyn FavoritesBackend,
    user_id: String,
    provider_ids: BTreeSet<String>,
}

impl<'a> Favorites<'a> {
    /// Load a user's favorites from the backend.
    pub fn load(backend: &'a dyn FavoritesBackend, user_id: impl Into<String>) -> DbResult<Self> {
        let user_id = user_id.into();
        let provider_ids = backend.list_favorites(&user_id)?.into_iter().collect();
        Ok(Self {
            backend,
            user_id,
            provider_ids,
        })
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.provider_ids.contains(provider_id)
    }

    /// Favorite provider IDs in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.provider_ids.iter().cloned().collect()
    }

    /// Flip a provider's favorite state.
    ///
    /// Returns the new state. On backend failure the local state is restored
    /// and the error returned.
    pub fn toggle(&mut self, provider_id: &str) -> DbResult<bool> {
        let was_favorite = self.provider_ids.contains(provider_id);

        if was_favorite {
            self.provider_ids.remove(provider_id);
        } else {
            self.provider_ids.insert(provider_id.to_string());
        }

        let result = if was_favorite {
            self.backend.remove_favorite(&self.user_id, provider_id)
        } else {
            self.backend.add_favorite(&self.user_id, provider_id)
        };

        match result {
            Ok(()) => {
                debug!(provider_id, favorite = !was_favorite, "Favorite toggled");
                Ok(!was_favorite)
            }
            Err(e) => {
                warn!(provider_id, error = %e, "Favorite update failed, reverting");
                if was_favorite {
                    self.provider_ids.insert(provider_id.to_string());
                } else {
                    self.provider_ids.remove(provider_id);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, DbError};

    struct FailingBackend;

    impl FavoritesBackend for FailingBackend {
        fn add_favorite(&self, _: &str, _: &str) -> DbResult<()> {
            Err(DbError::Constraint("offline".into()))
        }

        fn remove_favorite(&self, _: &str, _: &str) -> DbResult<()> {
            Err(DbError::Constraint("offline".into()))
        }

        fn list_favorites(&self, _: &str) -> DbResult<Vec<String>> {
            Ok(vec!["vet-1".into()])
        }
    }

    #[test]
    fn test_toggle_persists() {
        let db = Database::open_in_memory().unwrap();
        let mut favorites = Favorites::load(&db, "user-1").unwrap();

        assert!(favorites.toggle("vet-9").unwrap());
        assert!(favorites.contains("vet-9"));

        let reloaded = Favorites::load(&db, "user-1").unwrap();
        assert_eq!(reloaded.ids(), vec!["vet-9".to_string()]);

        assert!(!favorites.toggle("vet-9").unwrap());
        assert!(Favorites::load(&db, "user-1").unwrap().ids().is_empty());
    }

    #[test]
    fn test_toggle_reverts_on_failure() {
        let backend = FailingBackend;
        let mut favorites = Favorites::load(&backend, "user-1").unwrap();

        assert!(favorites.toggle("vet-2").is_err());
        assert!(!favorites.contains("vet-2"));

        assert!(favorites.toggle("vet-1").is_err());
        assert!(favorites.contains("vet-1"));
    }
}
