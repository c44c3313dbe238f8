//! Chunk lookup tables.
//!
//! The on-disk index structures (B-tree v1/v2, fixed array, extensible
//! array, single chunk) all boil down to the same view: a map from a chunk's
//! logical offset to its location in the file. Readers are polymorphic over
//! that one capability; whichever component parses an index hands its
//! entries to a [MapIndex].

use std::collections::HashMap;

use crate::{DimensionMismatch, GridCoord, Ndim};

/// One stored chunk: logical offset, file address, and on-disk byte length
/// (after filtering, so possibly compressed). Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub offset: GridCoord,
    pub address: u64,
    pub size: u64,
}

impl Chunk {
    pub fn new(offset: GridCoord, address: u64, size: u64) -> Self {
        Self {
            offset,
            address,
            size,
        }
    }
}

impl Ndim for Chunk {
    fn ndim(&self) -> usize {
        self.offset.len()
    }
}

/// Read-only view of a dataset's chunk locations.
pub trait ChunkIndex: Send + Sync {
    fn chunk_lookup(&self) -> &HashMap<GridCoord, Chunk>;
}

/// Index over prebuilt entries.
pub struct MapIndex {
    lookup: HashMap<GridCoord, Chunk>,
}

impl MapIndex {
    /// Keys the entries by their logical offsets.
    ///
    /// Fails if entries disagree on dimensionality. Duplicate offsets keep
    /// the last entry.
    pub fn new<I: IntoIterator<Item = Chunk>>(chunks: I) -> Result<Self, DimensionMismatch> {
        let mut lookup = HashMap::default();
        let mut ndim = None;
        for chunk in chunks {
            match ndim {
                None => ndim = Some(chunk.ndim()),
                Some(n) => {
                    DimensionMismatch::check(chunk.ndim(), n)?;
                }
            }
            lookup.insert(chunk.offset.clone(), chunk);
        }
        Ok(Self { lookup })
    }
}

impl ChunkIndex for MapIndex {
    fn chunk_lookup(&self) -> &HashMap<GridCoord, Chunk> {
        &self.lookup
    }
}

/// The degenerate single-chunk layout: one chunk at the dataset origin.
pub struct SingleChunkIndex {
    lookup: HashMap<GridCoord, Chunk>,
}

impl SingleChunkIndex {
    pub fn new(ndim: usize, address: u64, size: u64) -> Self {
        let origin: GridCoord = std::iter::repeat(0).take(ndim).collect();
        let chunk = Chunk::new(origin.clone(), address, size);
        let mut lookup = HashMap::with_capacity(1);
        lookup.insert(origin, chunk);
        Self { lookup }
    }
}

impl ChunkIndex for SingleChunkIndex {
    fn chunk_lookup(&self) -> &HashMap<GridCoord, Chunk> {
        &self.lookup
    }
}
