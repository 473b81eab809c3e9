//! Favorites synchronization across backends.
//!
//! ## Lifecycle
//!
//!   1. `init` reads every backend concurrently and merges the snapshots by
//!      id (first seen wins, backend order).  Unreadable backends are reported
//!      and count as empty.
//!   2. The merged set is published, then queued to every backend that was
//!      read successfully.  A backend that failed to read is not written until
//!      the first command, so a transient read error never replaces its
//!      contents with the other backends' view.
//!   3. `run` folds commands one at a time; every resulting set is published
//!      before it is queued for writing to all backends.
//!
//! Each backend has its own writer task so a slow or failing backend never
//! delays the fold or the other backends.  Writers only keep the latest
//! set: every write replaces the whole collection, so intermediate sets a
//! slow backend has not reached yet are skipped.

use fip_proto::model::{FavoriteAction, FavoriteCommand, FavoritesSet, Track};
use futures_util::future::join_all;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::composer::Update;
use crate::error::EngineError;

/// Live feed of add/remove commands.
pub type CommandSource = BoxStream<'static, FavoriteCommand>;

/// Union by id in the given order; stored entries are always flagged.
pub fn merge_snapshots<I>(snapshots: I) -> FavoritesSet
where
    I: IntoIterator<Item = FavoritesSet>,
{
    snapshots
        .into_iter()
        .flat_map(Vec::<Track>::from)
        .map(|track| track.flagged(true))
        .collect()
}

/// Apply one command.  Both actions are idempotent.
pub fn apply_command(favorites: &mut FavoritesSet, command: &FavoriteCommand) -> bool {
    match command.action {
        FavoriteAction::Add => favorites.insert(command.track.flagged(true)),
        FavoriteAction::Remove => favorites.remove(&command.track.id),
    }
}

pub struct FavoritesSync {
    favorites: FavoritesSet,
    writers: Vec<watch::Sender<FavoritesSet>>,
    updates: mpsc::Sender<Update>,
}

impl FavoritesSync {
    /// Load, merge and publish the initial set.  Returns `None` when the
    /// composer is already gone.
    pub async fn init(backends: Vec<Backend>, updates: mpsc::Sender<Update>) -> Option<Self> {
        info!("[favorites] loading from {} backends", backends.len());

        let reads = join_all(backends.iter().map(|b| b.get())).await;
        let mut snapshots = Vec::with_capacity(reads.len());
        let mut readable = Vec::with_capacity(reads.len());
        for (backend, read) in backends.iter().zip(reads) {
            match read {
                Ok(set) => {
                    debug!("[favorites] {} backend: {} entries", backend.kind(), set.len());
                    snapshots.push(set);
                    readable.push(true);
                }
                Err(e) => {
                    let err = EngineError::backend_read(backend.kind(), &e);
                    warn!("[favorites] {}, write-back deferred to the first command", err);
                    updates.send(Update::Error(err)).await.ok()?;
                    readable.push(false);
                }
            }
        }

        let favorites = merge_snapshots(snapshots);
        info!("[favorites] merged {} entries", favorites.len());

        let writers = backends
            .into_iter()
            .map(|b| spawn_writer(b, updates.clone()))
            .collect();

        let sync = Self {
            favorites,
            writers,
            updates,
        };
        if sync.publish_where(|i| readable[i]).await {
            Some(sync)
        } else {
            None
        }
    }

    /// Fold commands until the source ends.  Queued writes still complete
    /// afterwards.
    pub async fn run(mut self, mut commands: CommandSource) {
        while let Some(command) = commands.next().await {
            let changed = apply_command(&mut self.favorites, &command);
            debug!(
                "[favorites] {:?} {} (changed={}), now {} entries",
                command.action,
                command.track.id,
                changed,
                self.favorites.len()
            );
            if !self.publish().await {
                warn!("[favorites] composer gone, stopping");
                return;
            }
        }
        info!("[favorites] command stream ended");
    }

    /// Hand the current set to the composer, then to every writer.
    async fn publish(&self) -> bool {
        self.publish_where(|_| true).await
    }

    /// Hand the current set to the composer, then to the writers whose index
    /// passes `write`.
    async fn publish_where<F>(&self, write: F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        if self
            .updates
            .send(Update::Favorites(self.favorites.clone()))
            .await
            .is_err()
        {
            return false;
        }
        for (i, writer) in self.writers.iter().enumerate() {
            if write(i) {
                writer.send_replace(self.favorites.clone());
            }
        }
        true
    }
}

fn spawn_writer(backend: Backend, updates: mpsc::Sender<Update>) -> watch::Sender<FavoritesSet> {
    let (tx, mut rx) = watch::channel(FavoritesSet::new());
    tokio::spawn(async move {
        // Ends once the sender is gone and the last queued set was written.
        while rx.changed().await.is_ok() {
            let set = rx.borrow_and_update().clone();
            match backend.set(&set).await {
                Ok(()) => debug!("[favorites] {} backend saved {} entries", backend.kind(), set.len()),
                Err(e) => {
                    let err = EngineError::backend_write(backend.kind(), &e);
                    error!("[favorites] {}", err);
                    let _ = updates.send(Update::Error(err)).await;
                }
            }
        }
    });
    tx
}
