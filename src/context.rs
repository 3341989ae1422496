//! Player context
//!
//! One object, built at startup and passed by reference, that owns the
//! shared engine state and the background workers. Nothing in the crate
//! reaches for global state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::config::PlayerConfig;
use crate::dsp::{IrCatalog, IrLoader, IrSource};
use crate::engine::{EngineState, PreviewWorker, RealtimeProcessor};
use crate::error::Result;

pub struct PlayerContext {
    config: PlayerConfig,
    state: Arc<EngineState>,
    catalog: IrCatalog,
    loader: IrLoader,
    preview: PreviewWorker,
}

impl PlayerContext {
    /// Validate `config`, build the IR catalog and start the workers
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;

        let mut catalog = IrCatalog::builtin();
        if let Some(dir) = &config.ir_directory {
            catalog.scan_dir(dir)?;
        }

        let state = Arc::new(EngineState::new());
        state.set_enabled(config.reverb_enabled);
        let loader = IrLoader::spawn(Arc::clone(state.store()))?;
        let preview = PreviewWorker::spawn()?;

        info!(
            "Player context ready: {} ch, block {} (max {}), {} impulse responses",
            config.output_channels,
            config.block_size,
            config.max_block_size,
            catalog.len()
        );

        Ok(Self {
            config,
            state,
            catalog,
            loader,
            preview,
        })
    }

    /// Build a processor sized for this configuration
    pub fn build_processor(&self) -> RealtimeProcessor {
        let processor = RealtimeProcessor::new(
            Arc::clone(&self.state),
            self.config.output_channels,
            self.config.max_block_size,
        );
        processor.transport().set_looping(self.config.looping);
        processor
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn catalog(&self) -> &IrCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &IrLoader {
        &self.loader
    }

    pub fn preview(&self) -> &PreviewWorker {
        &self.preview
    }

    pub fn set_reverb_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    /// Queue loading of the IR named `selection` (or at that path)
    pub fn select_impulse(&self, selection: &str) -> Result<u64> {
        let source = self.catalog.resolve(selection)?;
        self.loader.request(source)
    }

    /// Queue loading of an explicit source
    pub fn select_source(&self, source: IrSource) -> Result<u64> {
        self.loader.request(source)
    }

    /// Queue a preview of `path` against the currently active IR
    pub fn request_preview(&self, path: &Path) -> Result<u64> {
        self.preview
            .request(PathBuf::from(path), self.state.snapshot())
    }
}
