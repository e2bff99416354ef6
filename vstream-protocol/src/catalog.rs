//! Frame catalogs
//!
//! A frame catalog is the ordered list of frame sizes for one quality level,
//! in play order. The quality catalog holds one frame catalog per level and is
//! shared read-only between every session that streams from it.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame size on line {line}: {content:?}")]
    Malformed { line: usize, content: String },

    #[error("Catalog contains no frames")]
    Empty,

    #[error("Quality catalog has no levels")]
    NoLevels,

    #[error("Too many quality levels: {0}")]
    TooManyLevels(usize),
}

/// A single catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Position in the catalog (0-based)
    pub index: usize,
    /// Frame size in bytes
    pub size_bytes: u32,
}

/// Ordered frame sizes for one quality level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCatalog {
    sizes: Vec<u32>,
}

impl FrameCatalog {
    /// Create a catalog from frame sizes in play order
    pub fn new(sizes: Vec<u32>) -> Result<Self, CatalogError> {
        if sizes.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(FrameCatalog { sizes })
    }

    /// Create a catalog of `frame_count` frames that all have the same size
    pub fn uniform(frame_size: u32, frame_count: usize) -> Result<Self, CatalogError> {
        Self::new(vec![frame_size; frame_count])
    }

    /// Parse a catalog from a line-oriented reader
    ///
    /// Each non-blank line holds one decimal frame size. Every line is parsed
    /// and appended on its own; a line that does not parse fails the whole load.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, CatalogError> {
        let mut sizes = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let size = trimmed
                .parse::<u32>()
                .map_err(|_| CatalogError::Malformed {
                    line: idx + 1,
                    content: trimmed.to_string(),
                })?;
            sizes.push(size);
        }

        Self::new(sizes)
    }

    /// Load a catalog from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = File::open(path.as_ref())?;
        let catalog = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(
            "Loaded {} frames from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    /// Get the frame at `index`, if the catalog is that long
    pub fn frame(&self, index: usize) -> Option<Frame> {
        self.sizes.get(index).map(|&size_bytes| Frame { index, size_bytes })
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false for a constructed catalog
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total bytes across all frames
    pub fn total_bytes(&self) -> u64 {
        self.sizes.iter().map(|&s| s as u64).sum()
    }

    /// Iterate frames in play order
    pub fn frames(&self) -> impl Iterator<Item = Frame> + '_ {
        self.sizes
            .iter()
            .enumerate()
            .map(|(index, &size_bytes)| Frame { index, size_bytes })
    }
}

/// One frame catalog per quality level
///
/// Levels are numbered from 1; the number of catalogs is the maximum level.
#[derive(Debug, Clone)]
pub struct QualityCatalog {
    levels: Vec<Arc<FrameCatalog>>,
}

impl QualityCatalog {
    /// Create a quality catalog; `levels[0]` is level 1
    pub fn new(levels: Vec<FrameCatalog>) -> Result<Self, CatalogError> {
        if levels.is_empty() {
            return Err(CatalogError::NoLevels);
        }
        if levels.len() > u16::MAX as usize {
            return Err(CatalogError::TooManyLevels(levels.len()));
        }

        Ok(QualityCatalog {
            levels: levels.into_iter().map(Arc::new).collect(),
        })
    }

    /// Load one catalog file per level, in level order
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CatalogError> {
        let levels = paths
            .iter()
            .map(FrameCatalog::from_file)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(levels)
    }

    /// Use the same catalog for every level up to `max_level`
    pub fn replicated(catalog: FrameCatalog, max_level: u16) -> Result<Self, CatalogError> {
        Self::new(vec![catalog; max_level as usize])
    }

    /// Highest quality level
    pub fn max_level(&self) -> u16 {
        self.levels.len() as u16
    }

    /// Catalog for `level`, if it is in `[1, max_level]`
    pub fn level(&self, level: u16) -> Option<&Arc<FrameCatalog>> {
        if level == 0 {
            return None;
        }
        self.levels.get(level as usize - 1)
    }

    /// Frame `index` of `level`
    pub fn frame(&self, level: u16, index: usize) -> Option<Frame> {
        self.level(level).and_then(|catalog| catalog.frame(index))
    }
}
