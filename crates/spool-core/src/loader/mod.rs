//! Background asset loading
//!
//! Decoding happens on the `asset-loader` thread. Finished assets are
//! wrapped in `basedrop::Shared` and pushed into the engine's command
//! queue as [`EngineCommand::AssetDecoded`], tagged with the [`TrackId`] of
//! the request so the engine can drop completions for superseded loads.

mod asset;
mod decoder;

pub use asset::*;
pub use decoder::*;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::Shared;
use thiserror::Error;

use crate::engine::{gc_handle, CommandSender, EngineCommand, TrackId};

/// How often to retry handing a decoded asset to a full command queue
const QUEUE_RETRY_INTERVAL: Duration = Duration::from_millis(5);
const QUEUE_RETRY_ATTEMPTS: u32 = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("asset loader thread is not running")]
    Disconnected,
}

/// Lock the shared command sender, recovering from a poisoned lock
///
/// The sender holds no invariants a panicking holder could break.
pub(crate) fn lock_sender(sender: &Mutex<CommandSender>) -> MutexGuard<'_, CommandSender> {
    sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct LoadRequest {
    track: TrackId,
    url: String,
}

/// Handle to the background loader thread
///
/// Dropping the handle closes the request channel and joins the thread
/// after it finishes the decode in progress.
pub struct AssetLoader {
    tx: Option<Sender<LoadRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl AssetLoader {
    /// Spawn the loader thread
    pub fn spawn<D: AssetDecoder>(decoder: D, commands: Arc<Mutex<CommandSender>>) -> Self {
        let (tx, rx) = mpsc::channel::<LoadRequest>();

        let handle = thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || loader_thread(decoder, rx, commands))
            .expect("Failed to spawn asset loader thread");

        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queue a decode for `track` (non-blocking)
    pub fn load(&self, track: TrackId, url: &str) -> Result<(), LoaderError> {
        let tx = self.tx.as_ref().ok_or(LoaderError::Disconnected)?;
        tx.send(LoadRequest {
            track,
            url: url.to_string(),
        })
        .map_err(|_| LoaderError::Disconnected)
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Asset loader thread panicked");
            }
        }
    }
}

fn loader_thread<D: AssetDecoder>(
    decoder: D,
    rx: Receiver<LoadRequest>,
    commands: Arc<Mutex<CommandSender>>,
) {
    log::info!("Asset loader thread started");

    while let Ok(request) = rx.recv() {
        log::info!("Decoding track {:?}: {}", request.track, request.url);

        let asset = match decoder.decode(&request.url) {
            Ok(asset) => asset,
            Err(e) => {
                log::error!("Failed to decode {}: {}", request.url, e);
                continue;
            }
        };

        let mut cmd = EngineCommand::AssetDecoded {
            track: request.track,
            asset: Shared::new(&gc_handle(), asset),
        };

        let mut attempts = 0;
        loop {
            match lock_sender(&commands).send(cmd) {
                Ok(()) => break,
                Err(rejected) if attempts < QUEUE_RETRY_ATTEMPTS => {
                    cmd = rejected;
                    attempts += 1;
                    thread::sleep(QUEUE_RETRY_INTERVAL);
                }
                Err(_) => {
                    log::error!(
                        "Command queue stayed full, dropping decoded track {:?}",
                        request.track
                    );
                    break;
                }
            }
        }
    }

    log::info!("Asset loader thread shutting down");
}
