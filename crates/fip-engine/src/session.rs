//! Session resolution: credential → user → playlist.

use async_trait::async_trait;
use fip_proto::model::{Credential, Identity, Playlist, User};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::EngineError;

/// Remote account lookups.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn resolve_user(&self, credential: &Credential) -> anyhow::Result<User>;

    /// Find the playlist called `name` owned by `user_id`, creating it if
    /// missing.
    async fn resolve_or_create_playlist(
        &self,
        credential: &Credential,
        user_id: &str,
        name: &str,
    ) -> anyhow::Result<Playlist>;
}

pub struct SessionResolver {
    service: Option<Arc<dyn IdentityService>>,
    playlist_name: String,
}

impl SessionResolver {
    /// `service` is `None` when no remote account integration is available;
    /// any credential then fails to resolve.
    pub fn new(service: Option<Arc<dyn IdentityService>>, playlist_name: impl Into<String>) -> Self {
        Self {
            service,
            playlist_name: playlist_name.into(),
        }
    }

    /// No credential resolves to no identity without touching the service.
    /// Failures are terminal for the credential; they never turn into `Ok(None)`.
    pub async fn resolve(&self, credential: Option<&Credential>) -> Result<Option<Identity>, EngineError> {
        let Some(credential) = credential else {
            info!("[session] no credential, running anonymously");
            return Ok(None);
        };
        let Some(service) = &self.service else {
            return Err(EngineError::Identity(
                "credential supplied but no identity service configured".to_string(),
            ));
        };

        let user = service
            .resolve_user(credential)
            .await
            .map_err(|e| EngineError::identity(&e.context("resolving user")))?;

        let playlist = service
            .resolve_or_create_playlist(credential, &user.id, &self.playlist_name)
            .await
            .map_err(|e| {
                warn!("[session] playlist lookup failed for user {}", user.id);
                EngineError::identity(&e.context(format!("resolving playlist {:?}", self.playlist_name)))
            })?;

        info!("[session] user={} playlist={}", user.id, playlist.id);
        Ok(Some(Identity { user, playlist }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_user: bool,
        fail_playlist: bool,
    }

    #[async_trait]
    impl IdentityService for Recorder {
        async fn resolve_user(&self, credential: &Credential) -> anyhow::Result<User> {
            self.calls.lock().unwrap().push(format!("user:{}", credential.access_token));
            if self.fail_user {
                anyhow::bail!("401 Unauthorized");
            }
            Ok(User {
                id: "1".into(),
                display_name: Some("1".into()),
            })
        }

        async fn resolve_or_create_playlist(
            &self,
            _credential: &Credential,
            user_id: &str,
            name: &str,
        ) -> anyhow::Result<Playlist> {
            self.calls.lock().unwrap().push(format!("playlist:{}:{}", user_id, name));
            if self.fail_playlist {
                anyhow::bail!("403 Forbidden");
            }
            Ok(Playlist {
                id: "2".into(),
                name: name.into(),
            })
        }
    }

    fn credential() -> Credential {
        Credential {
            access_token: "access_token".into(),
            refresh_token: Some("refresh_token".into()),
            expires_in: Some("3600".into()),
            token_type: Some("Bearer".into()),
        }
    }

    #[tokio::test]
    async fn test_resolves_user_then_playlist() {
        let service = Arc::new(Recorder::default());
        let resolver = SessionResolver::new(Some(service.clone() as Arc<dyn IdentityService>), "fipradio");

        let identity = resolver.resolve(Some(&credential())).await.unwrap().unwrap();
        assert_eq!(identity.user.id, "1");
        assert_eq!(identity.playlist.name, "fipradio");
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec!["user:access_token".to_string(), "playlist:1:fipradio".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_credential_skips_service() {
        let service = Arc::new(Recorder::default());
        let resolver = SessionResolver::new(Some(service.clone() as Arc<dyn IdentityService>), "fipradio");
        assert_eq!(resolver.resolve(None).await.unwrap(), None);
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_failure_is_an_error_not_anonymous() {
        let service = Arc::new(Recorder {
            fail_user: true,
            ..Default::default()
        });
        let resolver = SessionResolver::new(Some(service.clone() as Arc<dyn IdentityService>), "fipradio");
        let err = resolver.resolve(Some(&credential())).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Identity("resolving user: 401 Unauthorized".into())
        );
        assert_eq!(service.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_credential_without_service_fails() {
        let resolver = SessionResolver::new(None, "fipradio");
        assert!(matches!(
            resolver.resolve(Some(&credential())).await,
            Err(EngineError::Identity(_))
        ));
    }

    #[tokio::test]
    async fn test_playlist_failure_is_terminal() {
        let service = Arc::new(Recorder {
            fail_playlist: true,
            ..Default::default()
        });
        let resolver = SessionResolver::new(Some(service.clone() as Arc<dyn IdentityService>), "fipradio");
        let err = resolver.resolve(Some(&credential())).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Identity("resolving playlist \"fipradio\": 403 Forbidden".into())
        );
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec!["user:access_token".to_string(), "playlist:1:fipradio".to_string()]
        );
    }
}
