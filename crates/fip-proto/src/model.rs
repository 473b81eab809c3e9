use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Tracks ────────────────────────────────────────────────────────────────────

/// A song as announced by a channel, optionally enriched with a catalog match.
///
/// Values are never patched in place once published: enrichment and favorite
/// flagging both produce a new `Track`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Stable identity key.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Start of the broadcast, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub catalog_id: Option<String>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub favorite: bool,
}

impl Track {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_catalog(mut self, id: Option<String>, url: Option<String>) -> Self {
        self.catalog_id = id;
        self.catalog_url = url;
        self
    }

    /// Copy of this track with the favorite flag set to `favorite`.
    pub fn flagged(&self, favorite: bool) -> Self {
        Self {
            favorite,
            ..self.clone()
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// "Artist – Title", "Title", or the id when nothing better is known.
    pub fn display(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(a), Some(t)) => format!("{} \u{2013} {}", a, t),
            (None, Some(t)) => t.clone(),
            _ => self.id.clone(),
        }
    }
}

/// A track's counterpart in the external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub id: String,
    pub url: String,
}

// ── Channels ──────────────────────────────────────────────────────────────────

/// One notification from a channel feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelEvent {
    Track { track: Track },
    /// Anything that is not a song (jingles, shows, ads). Kept opaque.
    Other {
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl ChannelEvent {
    pub fn track(track: Track) -> Self {
        Self::Track { track }
    }

    pub fn as_track(&self) -> Option<&Track> {
        match self {
            Self::Track { track } => Some(track),
            Self::Other { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LoadingTag {
    #[default]
    Loading,
}

/// What a channel currently shows.  Serializes as `{"kind":"loading"}` until
/// the first event arrives, then as the event itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NowPlaying {
    Loading(LoadingTag),
    Playing(ChannelEvent),
}

impl Default for NowPlaying {
    fn default() -> Self {
        Self::Loading(LoadingTag::Loading)
    }
}

impl NowPlaying {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn event(&self) -> Option<&ChannelEvent> {
        match self {
            Self::Loading(_) => None,
            Self::Playing(e) => Some(e),
        }
    }

    pub fn track(&self) -> Option<&Track> {
        self.event().and_then(ChannelEvent::as_track)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    pub now_playing: NowPlaying,
    /// Most recent first.
    pub past_events: Vec<ChannelEvent>,
}

// ── Favorites ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteCommand {
    #[serde(rename = "type")]
    pub action: FavoriteAction,
    pub track: Track,
}

impl FavoriteCommand {
    pub fn add(track: Track) -> Self {
        Self {
            action: FavoriteAction::Add,
            track,
        }
    }

    pub fn remove(track: Track) -> Self {
        Self {
            action: FavoriteAction::Remove,
            track,
        }
    }
}

/// Ordered favorites, unique by `Track::id`.  Deserializing drops repeated
/// ids, keeping the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Track>", into = "Vec<Track>")]
pub struct FavoritesSet(Vec<Track>);

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|t| t.id == id)
    }

    /// Appends `track` unless its id is already present.  Returns whether the
    /// set changed.
    pub fn insert(&mut self, track: Track) -> bool {
        if self.contains(&track.id) {
            return false;
        }
        self.0.push(track);
        true
    }

    /// Drops the entry with `id`.  Returns whether the set changed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t.id != id);
        self.0.len() != before
    }

    pub fn tracks(&self) -> &[Track] {
        &self.0
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_unique_ids(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.0.iter().all(|t| seen.insert(t.id.as_str()))
    }
}

impl From<Vec<Track>> for FavoritesSet {
    fn from(tracks: Vec<Track>) -> Self {
        tracks.into_iter().collect()
    }
}

impl From<FavoritesSet> for Vec<Track> {
    fn from(set: FavoritesSet) -> Self {
        set.0
    }
}

impl FromIterator<Track> for FavoritesSet {
    /// First occurrence of an id wins.
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut set = Self::new();
        for track in iter {
            set.insert(track);
        }
        set
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// OAuth-style access credential for the remote catalog account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

/// A resolved remote session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user: User,
    pub playlist: Playlist,
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// The unified snapshot handed to presentation code.  `rev` increases by one
/// with every emitted snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub rev: u64,
    pub user: Option<User>,
    pub channels: BTreeMap<String, ChannelState>,
    pub favorites: FavoritesSet,
}
