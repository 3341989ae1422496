//! Impulse-response catalog
//!
//! The selectable set of IRs: a few presets compiled into the binary plus
//! any WAV files found under a user directory.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::dsp::impulse::{ImpulseResponse, ImpulseResponseStore};
use crate::error::{ConvoError, LoadError, Result};

const SMALL_ROOM_WAV: &[u8] = include_bytes!("../../assets/ir/small_room.wav");
const PLATE_WAV: &[u8] = include_bytes!("../../assets/ir/plate.wav");

/// Where an impulse response comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrSource {
    File(PathBuf),
    Embedded {
        name: &'static str,
        bytes: &'static [u8],
    },
}

impl IrSource {
    /// Decode this source through `store` (blocking)
    pub fn load(
        &self,
        store: &ImpulseResponseStore,
    ) -> std::result::Result<ImpulseResponse, LoadError> {
        match self {
            IrSource::File(path) => store.load_from_file(path),
            IrSource::Embedded { name, bytes } => store.load_from_embedded_asset(name, bytes),
        }
    }
}

impl fmt::Display for IrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrSource::File(path) => write!(f, "{}", path.display()),
            IrSource::Embedded { name, .. } => write!(f, "builtin:{}", name),
        }
    }
}

/// One selectable impulse response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrEntry {
    pub name: String,
    pub source: IrSource,
}

/// Ordered list of selectable impulse responses
#[derive(Debug, Clone, Default)]
pub struct IrCatalog {
    entries: Vec<IrEntry>,
}

impl IrCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog holding the embedded presets
    pub fn builtin() -> Self {
        let entries = [("small-room", SMALL_ROOM_WAV), ("plate", PLATE_WAV)]
            .into_iter()
            .map(|(name, bytes)| IrEntry {
                name: name.to_string(),
                source: IrSource::Embedded { name, bytes },
            })
            .collect();
        Self { entries }
    }

    /// Add every `*.wav` file below `dir`, sorted by file name
    ///
    /// Names already in the catalog are skipped.
    ///
    /// # Returns
    /// Number of entries added
    pub fn scan_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(ConvoError::Config {
                reason: format!("impulse response directory not found: {}", dir.display()),
            });
        }

        let mut added = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            let is_wav = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if !entry.file_type().is_file() || !is_wav {
                continue;
            }

            let name = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            if self.find(&name).is_some() {
                debug!("Duplicate impulse response name '{}', keeping first", name);
                continue;
            }

            self.entries.push(IrEntry {
                name,
                source: IrSource::File(path.to_path_buf()),
            });
            added += 1;
        }

        debug!("Found {} impulse responses in {}", added, dir.display());
        Ok(added)
    }

    pub fn entries(&self) -> &[IrEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name, ignoring case
    pub fn find(&self, name: &str) -> Option<&IrEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a user selection: a catalog name, or else a path to a WAV file
    pub fn resolve(&self, selection: &str) -> Result<IrSource> {
        if let Some(entry) = self.find(selection) {
            return Ok(entry.source.clone());
        }

        let path = Path::new(selection);
        if path.is_file() {
            return Ok(IrSource::File(path.to_path_buf()));
        }

        Err(ConvoError::UnknownImpulse {
            name: selection.to_string(),
        })
    }
}
