//! Fake collaborators and stream helpers shared by the engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fip_engine::{
    CatalogService, ChannelSource, CommandSource, IdentityService, PlaylistStore, RemoteServices,
    StateUpdate,
};
use fip_proto::model::{
    AppState, CatalogMatch, ChannelEvent, Credential, FavoriteCommand, Playlist, Track, User,
};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ── tracks ────────────────────────────────────────────────────────────────────

pub fn song(id: &str) -> ChannelEvent {
    ChannelEvent::track(Track::new(id))
}

pub fn song_at(id: &str, start: i64) -> ChannelEvent {
    ChannelEvent::track(Track::new(id).with_start_time(start))
}

pub fn fav(id: &str, catalog_id: Option<&str>) -> Track {
    Track::new(id)
        .with_catalog(catalog_id.map(String::from), catalog_id.map(String::from))
        .flagged(true)
}

pub fn credential() -> Credential {
    Credential {
        access_token: "access_token".into(),
        refresh_token: Some("refresh_token".into()),
        expires_in: Some("expires_in".into()),
        token_type: Some("type".into()),
    }
}

// ── streams ───────────────────────────────────────────────────────────────────

/// Sender side of a fake channel feed.
pub fn channel_feed() -> (mpsc::UnboundedSender<anyhow::Result<ChannelEvent>>, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let source = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    (tx, source)
}

pub fn command_feed() -> (mpsc::UnboundedSender<FavoriteCommand>, CommandSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let source = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    (tx, source)
}

pub fn no_commands() -> CommandSource {
    futures_util::stream::empty().boxed()
}

// ── output helpers ────────────────────────────────────────────────────────────

/// Read updates until a snapshot satisfies `pred`.  Errors seen on the way
/// are collected into `errors`.
pub async fn wait_for<F>(
    rx: &mut mpsc::Receiver<StateUpdate>,
    errors: &mut Vec<fip_engine::EngineError>,
    pred: F,
) -> AppState
where
    F: Fn(&AppState) -> bool,
{
    let fut = async {
        loop {
            match rx.recv().await {
                Some(StateUpdate::Snapshot(state)) if pred(&state) => return state,
                Some(StateUpdate::Snapshot(_)) => {}
                Some(StateUpdate::Error(e)) => errors.push(e),
                None => panic!("state stream closed before condition was met"),
            }
        }
    };
    tokio::time::timeout(STEP_TIMEOUT, fut)
        .await
        .expect("timed out waiting for state")
}

/// Drain until the stream closes.  Returns every snapshot and every error.
pub async fn drain(rx: &mut mpsc::Receiver<StateUpdate>) -> (Vec<AppState>, Vec<fip_engine::EngineError>) {
    let fut = async {
        let mut states = Vec::new();
        let mut errors = Vec::new();
        while let Some(update) = rx.recv().await {
            match update {
                StateUpdate::Snapshot(s) => states.push(s),
                StateUpdate::Error(e) => errors.push(e),
            }
        }
        (states, errors)
    };
    tokio::time::timeout(STEP_TIMEOUT, fut)
        .await
        .expect("state stream never closed")
}

/// Read updates until the next reported error.
pub async fn next_error(rx: &mut mpsc::Receiver<StateUpdate>) -> fip_engine::EngineError {
    let fut = async {
        loop {
            match rx.recv().await {
                Some(StateUpdate::Error(e)) => return e,
                Some(StateUpdate::Snapshot(_)) => {}
                None => panic!("state stream closed before an error was reported"),
            }
        }
    };
    tokio::time::timeout(STEP_TIMEOUT, fut)
        .await
        .expect("timed out waiting for an error")
}

pub fn now_id(state: &AppState, channel: &str) -> Option<String> {
    state.channels[channel].now_playing.track().map(|t| t.id.clone())
}

pub fn past_ids(state: &AppState, channel: &str) -> Vec<String> {
    state.channels[channel]
        .past_events
        .iter()
        .filter_map(|e| e.as_track().map(|t| t.id.clone()))
        .collect()
}

// ── catalog ───────────────────────────────────────────────────────────────────

/// Answers from a fixed table, `https://open.spotify.com/<id>` style.
pub struct TableCatalog(HashMap<String, String>);

impl TableCatalog {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[async_trait]
impl CatalogService for TableCatalog {
    async fn search(&self, track: &Track) -> anyhow::Result<Option<CatalogMatch>> {
        Ok(self.0.get(&track.id).map(|id| CatalogMatch {
            id: id.clone(),
            url: format!("https://open.spotify.com/{}", id),
        }))
    }
}

/// Lookups block until the test opens the gate for that track id.
#[derive(Default)]
pub struct GatedCatalog {
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl GatedCatalog {
    pub fn gate(&self, id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(id.to_string(), rx);
        tx
    }
}

#[async_trait]
impl CatalogService for GatedCatalog {
    async fn search(&self, track: &Track) -> anyhow::Result<Option<CatalogMatch>> {
        let gate = self.gates.lock().unwrap().remove(&track.id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(Some(CatalogMatch {
            id: format!("c-{}", track.id),
            url: format!("https://catalog.test/{}", track.id),
        }))
    }
}

// ── remote account ────────────────────────────────────────────────────────────

/// In-memory remote account that counts every call.
pub struct FakeRemote {
    pub user: User,
    pub playlist: Playlist,
    pub songs: Mutex<Vec<Track>>,
    pub fail_user: bool,
    pub fail_read: bool,
    pub fail_write: bool,
    pub identity_calls: AtomicUsize,
    pub playlist_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new(songs: Vec<Track>) -> Self {
        Self {
            user: User {
                id: "42".into(),
                display_name: Some("FORTY TWO".into()),
            },
            playlist: Playlist {
                id: "43".into(),
                name: "fipradio".into(),
            },
            songs: Mutex::new(songs),
            fail_user: false,
            fail_read: false,
            fail_write: false,
            identity_calls: AtomicUsize::new(0),
            playlist_calls: AtomicUsize::new(0),
        }
    }

    pub fn services(self: &Arc<Self>) -> RemoteServices {
        RemoteServices {
            identity: self.clone(),
            playlists: self.clone(),
        }
    }

    pub fn song_ids(&self) -> Vec<String> {
        self.songs.lock().unwrap().iter().map(|t| t.id.clone()).collect()
    }

    pub fn total_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst) + self.playlist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for FakeRemote {
    async fn resolve_user(&self, credential: &Credential) -> anyhow::Result<User> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(credential, &crate::common::credential());
        if self.fail_user {
            anyhow::bail!("401 invalid access token");
        }
        Ok(self.user.clone())
    }

    async fn resolve_or_create_playlist(
        &self,
        _credential: &Credential,
        user_id: &str,
        name: &str,
    ) -> anyhow::Result<Playlist> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(user_id, self.user.id);
        assert_eq!(name, "fipradio");
        Ok(self.playlist.clone())
    }
}

#[async_trait]
impl PlaylistStore for FakeRemote {
    async fn tracks(
        &self,
        _credential: &Credential,
        user_id: &str,
        playlist_id: &str,
    ) -> anyhow::Result<Vec<Track>> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(user_id, self.user.id);
        assert_eq!(playlist_id, self.playlist.id);
        if self.fail_read {
            anyhow::bail!("502 bad gateway");
        }
        Ok(self.songs.lock().unwrap().clone())
    }

    async fn replace_tracks(
        &self,
        _credential: &Credential,
        _user_id: &str,
        _playlist_id: &str,
        tracks: &[Track],
    ) -> anyhow::Result<()> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_write {
            anyhow::bail!("429 rate limited");
        }
        *self.songs.lock().unwrap() = tracks.to_vec();
        Ok(())
    }
}
