//! Favorites backends.
//!
//! The set is closed: a local key/value store, and a remote playlist that
//! only exists once a session has been resolved.

use async_trait::async_trait;
use fip_proto::model::{Credential, FavoritesSet, Identity, Track};
use fip_proto::store::KeyValueStore;
use std::sync::Arc;

use crate::error::BackendKind;

/// Remote playlist storage (e.g. a streaming-service playlist API).
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn tracks(
        &self,
        credential: &Credential,
        user_id: &str,
        playlist_id: &str,
    ) -> anyhow::Result<Vec<Track>>;

    async fn replace_tracks(
        &self,
        credential: &Credential,
        user_id: &str,
        playlist_id: &str,
        tracks: &[Track],
    ) -> anyhow::Result<()>;
}

/// Favorites stored as one JSON array under `key`.
pub struct LocalBackend {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalBackend {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    async fn get(&self) -> anyhow::Result<FavoritesSet> {
        match self.store.get(&self.key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(FavoritesSet::new()),
        }
    }

    async fn set(&self, favorites: &FavoritesSet) -> anyhow::Result<()> {
        self.store.set(&self.key, serde_json::to_value(favorites)?).await
    }
}

/// Favorites mirrored into the session's playlist.
pub struct RemoteBackend {
    store: Arc<dyn PlaylistStore>,
    credential: Credential,
    user_id: String,
    playlist_id: String,
}

impl RemoteBackend {
    pub fn new(store: Arc<dyn PlaylistStore>, credential: Credential, identity: &Identity) -> Self {
        Self {
            store,
            credential,
            user_id: identity.user.id.clone(),
            playlist_id: identity.playlist.id.clone(),
        }
    }

    async fn get(&self) -> anyhow::Result<FavoritesSet> {
        let tracks = self
            .store
            .tracks(&self.credential, &self.user_id, &self.playlist_id)
            .await?;
        Ok(tracks.into_iter().collect())
    }

    async fn set(&self, favorites: &FavoritesSet) -> anyhow::Result<()> {
        self.store
            .replace_tracks(
                &self.credential,
                &self.user_id,
                &self.playlist_id,
                favorites.tracks(),
            )
            .await
    }
}

pub enum Backend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local(_) => BackendKind::Local,
            Self::Remote(_) => BackendKind::Remote,
        }
    }

    pub async fn get(&self) -> anyhow::Result<FavoritesSet> {
        match self {
            Self::Local(b) => b.get().await,
            Self::Remote(b) => b.get().await,
        }
    }

    pub async fn set(&self, favorites: &FavoritesSet) -> anyhow::Result<()> {
        match self {
            Self::Local(b) => b.set(favorites).await,
            Self::Remote(b) => b.set(favorites).await,
        }
    }
}
