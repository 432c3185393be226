//! RT-safe garbage collection for decoded assets
//!
//! Decoded tracks reach the audio thread as `basedrop::Shared` pointers.
//! When the engine replaces or discards one, the drop only enqueues the
//! pointer; the actual free happens on the `audio-gc` thread.
//!
//! ```ignore
//! use basedrop::Shared;
//! use spool_core::engine::gc_handle;
//!
//! let asset = Shared::new(&gc_handle(), decoded);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// How often the collector thread frees queued drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created on the thread that owns it
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("Failed to send GC handle");

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for creating `Shared<T>` allocations (cheap to clone)
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_values_through_global_handle() {
        let a = Shared::new(&gc_handle(), vec![1.0f32; 16]);
        let b = a.clone();
        drop(a);
        assert_eq!(b.len(), 16);
    }
}
