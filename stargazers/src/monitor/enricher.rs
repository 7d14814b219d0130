//! User profile resolution.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::domain::UserProfile;
use crate::source::RepositorySource;

/// Resolves stargazer ids to display names and follower counts.
#[derive(Clone)]
pub struct UserEnricher {
    source: Arc<dyn RepositorySource>,
}

impl UserEnricher {
    pub fn new(source: Arc<dyn RepositorySource>) -> Self {
        Self { source }
    }

    /// Look up `id`.
    ///
    /// Missing profile fields are not an error. A vanished account surfaces as
    /// `Error::NotFound` so the caller can tell it apart from a transient failure.
    pub async fn resolve(&self, id: &str) -> Result<UserProfile> {
        let mut profile = self.source.user(id).await?;
        if profile.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            profile.name = None;
        }
        debug!(user = %id, name = ?profile.name, followers = ?profile.followers, "resolved user");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::MockSource;

    #[tokio::test]
    async fn test_resolve_profile() {
        let source = Arc::new(MockSource::new());
        source.set_profile("bob", Some("Bob"), Some(42));
        let enricher = UserEnricher::new(source);

        let profile = enricher.resolve("bob").await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Bob"));
        assert_eq!(profile.followers, Some(42));
    }

    #[tokio::test]
    async fn test_missing_fields_are_not_errors() {
        let source = Arc::new(MockSource::new());
        source.set_profile("anon", Some(""), None);
        let enricher = UserEnricher::new(source);

        let profile = enricher.resolve("anon").await.unwrap();
        assert_eq!(profile, UserProfile::default());
    }

    #[tokio::test]
    async fn test_deleted_account_is_not_found() {
        let source = Arc::new(MockSource::new());
        source.delete_user("gone");
        let enricher = UserEnricher::new(source);

        let err = enricher.resolve("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
