//! Background impulse-response loading
//!
//! IR selection is a task submitted to a worker thread. The worker decodes
//! the file, publishes it if no newer request has arrived meanwhile, and
//! posts a completion event that the owning thread drains at its leisure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::dsp::catalog::IrSource;
use crate::dsp::impulse::ImpulseResponseStore;
use crate::error::{ConvoError, LoadError, Result};

/// Completion of an IR load request
#[derive(Debug)]
pub enum LoadEvent {
    /// The IR was decoded and is now the active snapshot
    Published {
        generation: u64,
        name: String,
        channels: usize,
        frames: usize,
    },
    /// A newer request arrived before this one finished; nothing was published
    Superseded { generation: u64 },
    /// Decoding failed; the previous snapshot stays active
    Failed { generation: u64, error: LoadError },
}

impl LoadEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LoadEvent::Published { generation, .. }
            | LoadEvent::Superseded { generation }
            | LoadEvent::Failed { generation, .. } => *generation,
        }
    }
}

struct LoadRequest {
    generation: u64,
    source: IrSource,
}

/// Worker thread that decodes and publishes impulse responses
pub struct IrLoader {
    requests: Option<Sender<LoadRequest>>,
    events: Receiver<LoadEvent>,
    latest: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl IrLoader {
    /// Start the worker, publishing into `store`
    pub fn spawn(store: Arc<ImpulseResponseStore>) -> Result<Self> {
        let (request_tx, request_rx) = channel::unbounded::<LoadRequest>();
        let (event_tx, event_rx) = channel::unbounded();
        let latest = Arc::new(AtomicU64::new(0));
        let worker_latest = Arc::clone(&latest);

        let worker = thread::Builder::new()
            .name("ir-loader".to_string())
            .spawn(move || run_worker(store, request_rx, event_tx, worker_latest))?;

        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            latest,
            worker: Some(worker),
        })
    }

    /// Submit a load; returns the request's generation number
    pub fn request(&self, source: IrSource) -> Result<u64> {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("IR load request #{}: {}", generation, source);

        self.requests
            .as_ref()
            .and_then(|tx| tx.send(LoadRequest { generation, source }).ok())
            .ok_or_else(|| ConvoError::WorkerUnavailable {
                worker: "ir-loader".to_string(),
            })?;

        Ok(generation)
    }

    /// Generation of the most recent request (0 before any request)
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Next completion, if one is ready
    pub fn try_event(&self) -> Option<LoadEvent> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next completion
    pub fn wait_event(&self, timeout: Duration) -> Option<LoadEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for IrLoader {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("IR loader thread panicked");
            }
        }
    }
}

fn run_worker(
    store: Arc<ImpulseResponseStore>,
    requests: Receiver<LoadRequest>,
    events: Sender<LoadEvent>,
    latest: Arc<AtomicU64>,
) {
    for request in requests.iter() {
        let generation = request.generation;
        let event = match request.source.load(&store) {
            Ok(ir) if generation == latest.load(Ordering::Acquire) => {
                let (name, channels, frames) = (ir.name().to_string(), ir.num_channels(), ir.len());
                store.publish(ir);
                LoadEvent::Published {
                    generation,
                    name,
                    channels,
                    frames,
                }
            }
            Ok(ir) => {
                debug!("IR load #{} ('{}') superseded", generation, ir.name());
                LoadEvent::Superseded { generation }
            }
            Err(error) => {
                warn!("Failed to load impulse response {}: {}", request.source, error);
                LoadEvent::Failed { generation, error }
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
    info!("IR loader stopped");
}
