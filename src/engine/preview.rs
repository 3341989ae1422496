//! Offline preview rendering
//!
//! Renders a whole file through the convolution engine using every sample
//! of the impulse response, for display. Runs on worker threads only; a
//! render may take seconds for long files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info, warn};

use crate::dsp::{ConvolutionEngine, ConvolutionSnapshot};
use crate::engine::buffer::AudioBuffer;
use crate::engine::io::decode_file;
use crate::error::{ConvoError, LoadError, Result};

/// Destination for rendered previews (e.g. a waveform view)
pub trait PreviewSink {
    fn show(&mut self, buffer: &AudioBuffer, sample_rate: u32);
}

/// Full-fidelity offline renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewRenderer;

impl PreviewRenderer {
    /// Decode `path` and convolve it with the whole IR held by `snapshot`
    ///
    /// With an empty snapshot the decoded audio is returned unchanged.
    ///
    /// # Returns
    /// The processed buffer (same shape as the file) and the file's sample rate
    pub fn render_preview(
        path: &Path,
        snapshot: &ConvolutionSnapshot,
    ) -> std::result::Result<(AudioBuffer, u32), LoadError> {
        let decoded = decode_file(path)?;
        let sample_rate = decoded.sample_rate;
        let mut buffer = decoded.buffer;

        if let Some(ir) = snapshot.impulse() {
            let mut engine = ConvolutionEngine::full_length(buffer.num_frames(), ir);
            engine.process(&mut buffer.as_block(), Some(ir));
            debug!(
                "Rendered preview of {} with '{}' ({} IR samples)",
                path.display(),
                ir.name(),
                ir.len()
            );
        }

        Ok((buffer, sample_rate))
    }

    /// Render and hand the result to `sink`; the sink is not called on failure
    pub fn render_to_sink<S: PreviewSink + ?Sized>(
        path: &Path,
        snapshot: &ConvolutionSnapshot,
        sink: &mut S,
    ) -> std::result::Result<(), LoadError> {
        let (buffer, sample_rate) = Self::render_preview(path, snapshot)?;
        sink.show(&buffer, sample_rate);
        Ok(())
    }
}

/// Completion of a preview request
#[derive(Debug)]
pub enum PreviewEvent {
    Ready {
        generation: u64,
        buffer: AudioBuffer,
        sample_rate: u32,
    },
    Failed {
        generation: u64,
        error: LoadError,
    },
}

impl PreviewEvent {
    pub fn generation(&self) -> u64 {
        match self {
            PreviewEvent::Ready { generation, .. } | PreviewEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

struct PreviewRequest {
    generation: u64,
    path: PathBuf,
    snapshot: ConvolutionSnapshot,
}

/// Background preview renderer where the newest request wins
///
/// Requests overtaken by a newer one are skipped if not yet started, and
/// their results are discarded if already running.
pub struct PreviewWorker {
    requests: Option<Sender<PreviewRequest>>,
    events: Receiver<PreviewEvent>,
    latest: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    pub fn spawn() -> Result<Self> {
        let (request_tx, request_rx) = channel::unbounded::<PreviewRequest>();
        let (event_tx, event_rx) = channel::unbounded();
        let latest = Arc::new(AtomicU64::new(0));
        let worker_latest = Arc::clone(&latest);

        let worker = thread::Builder::new()
            .name("preview-render".to_string())
            .spawn(move || run_worker(request_rx, event_tx, worker_latest))?;

        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            latest,
            worker: Some(worker),
        })
    }

    /// Queue a render of `path` with `snapshot`; returns the request generation
    pub fn request(&self, path: PathBuf, snapshot: ConvolutionSnapshot) -> Result<u64> {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        self.requests
            .as_ref()
            .and_then(|tx| {
                tx.send(PreviewRequest {
                    generation,
                    path,
                    snapshot,
                })
                .ok()
            })
            .ok_or_else(|| ConvoError::WorkerUnavailable {
                worker: "preview-render".to_string(),
            })?;
        Ok(generation)
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    pub fn try_event(&self) -> Option<PreviewEvent> {
        self.events.try_recv().ok()
    }

    pub fn wait_event(&self, timeout: Duration) -> Option<PreviewEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Deliver the next ready preview to `sink`, if any
    ///
    /// # Returns
    /// The failure of a finished request, or `Ok(true)` if the sink was called
    pub fn deliver<S: PreviewSink + ?Sized>(
        &self,
        sink: &mut S,
    ) -> std::result::Result<bool, LoadError> {
        match self.try_event() {
            Some(PreviewEvent::Ready {
                buffer, sample_rate, ..
            }) => {
                sink.show(&buffer, sample_rate);
                Ok(true)
            }
            Some(PreviewEvent::Failed { error, .. }) => Err(error),
            None => Ok(false),
        }
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Preview render thread panicked");
            }
        }
    }
}

fn run_worker(
    requests: Receiver<PreviewRequest>,
    events: Sender<PreviewEvent>,
    latest: Arc<AtomicU64>,
) {
    for request in requests.iter() {
        let generation = request.generation;
        let is_current = || generation == latest.load(Ordering::Acquire);

        if !is_current() {
            debug!("Skipping superseded preview #{}", generation);
            continue;
        }

        let result = PreviewRenderer::render_preview(&request.path, &request.snapshot);
        if let Err(error) = &result {
            warn!("Preview of {} failed: {}", request.path.display(), error);
        }
        let event = match completion_event(generation, result, is_current()) {
            Some(event) => event,
            None => {
                debug!("Discarding superseded preview #{}", generation);
                continue;
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
    info!("Preview renderer stopped");
}

/// Event for a finished render, or `None` if a newer request superseded it
fn completion_event(
    generation: u64,
    result: std::result::Result<(AudioBuffer, u32), LoadError>,
    current: bool,
) -> Option<PreviewEvent> {
    if !current {
        return None;
    }
    Some(match result {
        Ok((buffer, sample_rate)) => PreviewEvent::Ready {
            generation,
            buffer,
            sample_rate,
        },
        Err(error) => PreviewEvent::Failed { generation, error },
    })
}
