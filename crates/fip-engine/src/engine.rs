//! Wiring: spawn every component and the composer, hand back the snapshot
//! stream.
//!
//! ```text
//!   channel sources ──► run_channel (×N) ─┐
//!                                          │
//!   credential ──► SessionResolver ──┐     ├──► Update mpsc ──► Composer ──► StateUpdate mpsc
//!                                    ▼     │
//!   commands ───────────────► FavoritesSync┘
//! ```
//!
//! The composer owns the only receiver.  When every component has finished
//! (all senders dropped) the composer exits and the output channel closes.

use fip_proto::config::Config;
use fip_proto::model::Credential;
use fip_proto::store::KeyValueStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::backend::{Backend, LocalBackend, PlaylistStore, RemoteBackend};
use crate::catalog::{CatalogMatcher, CatalogService};
use crate::channel::{run_channel, ChannelHistory, ChannelSource};
use crate::composer::{Composer, StateUpdate, Update};
use crate::favorites::{CommandSource, FavoritesSync};
use crate::session::{IdentityService, SessionResolver};

const UPDATE_BUFFER: usize = 256;
const OUTPUT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 0 = unbounded.
    pub history_limit: usize,
    pub storage_key: String,
    pub playlist_name: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            history_limit: config.channels.history_limit,
            storage_key: config.favorites.storage_key.clone(),
            playlist_name: config.favorites.playlist_name.clone(),
        }
    }
}

/// The remote account: identity lookups plus the playlist that mirrors the
/// favorites.  Usually one client implementing both traits.
#[derive(Clone)]
pub struct RemoteServices {
    pub identity: Arc<dyn IdentityService>,
    pub playlists: Arc<dyn PlaylistStore>,
}

pub struct StateEngine {
    options: EngineOptions,
    catalog: Arc<dyn CatalogService>,
    store: Arc<dyn KeyValueStore>,
    remote: Option<RemoteServices>,
}

impl StateEngine {
    pub fn new(
        options: EngineOptions,
        catalog: Arc<dyn CatalogService>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            options,
            catalog,
            store,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteServices) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Start all components on the current tokio runtime.
    ///
    /// `channels` fixes the channel set (and its names) for the whole run.
    /// The returned receiver yields a snapshot per upstream change plus every
    /// reported error, and closes once all sources have ended.
    pub fn spawn(
        self,
        credential: Option<Credential>,
        channels: Vec<(String, ChannelSource)>,
        commands: CommandSource,
    ) -> mpsc::Receiver<StateUpdate> {
        let (update_tx, update_rx) = mpsc::channel::<Update>(UPDATE_BUFFER);
        let (out_tx, out_rx) = mpsc::channel::<StateUpdate>(OUTPUT_BUFFER);

        info!(
            "[engine] starting: {} channels, remote={}, credential={}",
            channels.len(),
            self.remote.is_some(),
            credential.is_some()
        );

        let composer = Composer::new(channels.iter().map(|(name, _)| name.clone()));
        tokio::spawn(composer.run(update_rx, out_tx));

        let matcher = CatalogMatcher::new(self.catalog);
        for (name, source) in channels {
            let history = ChannelHistory::new(name, self.options.history_limit);
            tokio::spawn(run_channel(history, source, matcher.clone(), update_tx.clone()));
        }

        tokio::spawn(run_favorites(
            self.options,
            self.store,
            self.remote,
            credential,
            commands,
            update_tx,
        ));

        out_rx
    }
}

/// Resolve the session, pick the backends, then hand over to the
/// synchronizer.
async fn run_favorites(
    options: EngineOptions,
    store: Arc<dyn KeyValueStore>,
    remote: Option<RemoteServices>,
    credential: Option<Credential>,
    commands: CommandSource,
    updates: mpsc::Sender<Update>,
) {
    let resolver = SessionResolver::new(
        remote.as_ref().map(|r| Arc::clone(&r.identity)),
        options.playlist_name.clone(),
    );

    let mut backends = vec![Backend::Local(LocalBackend::new(store, options.storage_key))];

    let user = match resolver.resolve(credential.as_ref()).await {
        Ok(Some(identity)) => {
            if let (Some(remote), Some(credential)) = (remote, credential) {
                backends.push(Backend::Remote(RemoteBackend::new(
                    remote.playlists,
                    credential,
                    &identity,
                )));
            }
            Some(identity.user)
        }
        Ok(None) => None,
        Err(e) => {
            error!("[engine] {}", e);
            if updates.send(Update::Error(e)).await.is_err() {
                return;
            }
            None
        }
    };

    if updates.send(Update::Identity(user)).await.is_err() {
        return;
    }

    if let Some(sync) = FavoritesSync::init(backends, updates).await {
        sync.run(commands).await;
    }
}
