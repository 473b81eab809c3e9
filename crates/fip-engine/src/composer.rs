//! State composition: the single reader of every component's output.
//!
//! Components publish `Update`s into one mpsc channel; the composer owns the
//! latest value of each piece and rebuilds a complete `AppState` after every
//! update.  A snapshot is only ever built here, so consumers never see a
//! partially applied change.

use fip_proto::model::{AppState, ChannelEvent, ChannelState, FavoritesSet, NowPlaying, User};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::EngineError;

/// Everything a component can tell the composer.
#[derive(Debug, Clone)]
pub enum Update {
    /// Session decided.  `None` for anonymous or failed sessions.
    Identity(Option<User>),
    Channel { name: String, state: ChannelState },
    Favorites(FavoritesSet),
    Error(EngineError),
}

/// What consumers receive.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    Snapshot(AppState),
    Error(EngineError),
}

pub struct Composer {
    /// Outer `None` until the session is decided.
    user: Option<Option<User>>,
    channels: BTreeMap<String, ChannelState>,
    favorites: Option<FavoritesSet>,
    rev: u64,
}

impl Composer {
    pub fn new<I, S>(channel_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user: None,
            channels: channel_names
                .into_iter()
                .map(|n| (n.into(), ChannelState::default()))
                .collect(),
            favorites: None,
            rev: 0,
        }
    }

    /// Fold one update.  Returns what should be emitted, if anything.
    pub fn apply(&mut self, update: Update) -> Option<StateUpdate> {
        match update {
            Update::Error(e) => return Some(StateUpdate::Error(e)),
            Update::Identity(user) => self.user = Some(user),
            Update::Channel { name, state } => {
                self.channels.insert(name, state);
            }
            Update::Favorites(set) => {
                debug_assert!(set.has_unique_ids(), "duplicate ids in favorites");
                self.favorites = Some(set);
            }
        }
        self.snapshot().map(StateUpdate::Snapshot)
    }

    /// Build the next snapshot once the session is decided and the initial
    /// favorites are known.
    fn snapshot(&mut self) -> Option<AppState> {
        let user = self.user.as_ref()?;
        let favorites = self.favorites.as_ref()?;
        self.rev += 1;
        Some(AppState {
            rev: self.rev,
            user: user.clone(),
            channels: flag_favorites(&self.channels, favorites),
            favorites: favorites.clone(),
        })
    }

    /// Run until every update sender is gone or the consumer hangs up.
    pub async fn run(mut self, mut updates: mpsc::Receiver<Update>, out: mpsc::Sender<StateUpdate>) {
        info!("[composer] started with {} channels", self.channels.len());
        while let Some(update) = updates.recv().await {
            let Some(emitted) = self.apply(update) else {
                continue;
            };
            if let StateUpdate::Snapshot(state) = &emitted {
                debug!("[composer] emitting rev {}", state.rev);
            }
            if out.send(emitted).await.is_err() {
                info!("[composer] consumer dropped, stopping");
                return;
            }
        }
        info!("[composer] all sources ended");
    }
}

/// Copy of `channels` where every track's `favorite` reflects membership in
/// `favorites`.
pub fn flag_favorites(
    channels: &BTreeMap<String, ChannelState>,
    favorites: &FavoritesSet,
) -> BTreeMap<String, ChannelState> {
    let ids: HashSet<&str> = favorites.tracks().iter().map(|t| t.id.as_str()).collect();
    let flag = |event: &ChannelEvent| match event {
        ChannelEvent::Track { track } => ChannelEvent::Track {
            track: track.flagged(ids.contains(track.id.as_str())),
        },
        other => other.clone(),
    };

    channels
        .iter()
        .map(|(name, state)| {
            let now_playing = match &state.now_playing {
                NowPlaying::Playing(e) => NowPlaying::Playing(flag(e)),
                loading => loading.clone(),
            };
            let flagged = ChannelState {
                now_playing,
                past_events: state.past_events.iter().map(flag).collect(),
            };
            (name.clone(), flagged)
        })
        .collect()
}
