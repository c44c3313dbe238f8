//! The chunked-dataset read engine.
//!
//! A [ChunkedDataset] combines a [BackingStorage], a chunk lookup from a
//! [ChunkIndex], and the dataset's object header. It can materialize the
//! whole dataset, a rectangular hyperslab, or a single chunk, always as a
//! contiguous row-major byte buffer. Element bytes pass through untouched.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use log::debug;
use thiserror::Error;

use crate::{
    datatype::DataType,
    filter::{FilterDecodeError, FilterInitError, FilterPipeline, FilterRegistry},
    header::ObjectHeader,
    index::{Chunk, ChunkIndex},
    storage::BackingStorage,
    DimensionMismatch, GridCoord, Ndim,
};

pub mod layout;
mod runs;
pub mod stride;

mod full;
mod slice;

pub use layout::{DatasetLayout, LayoutError};
pub use stride::DimensionOverflow;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("dataset {path} has no chunk at offset {offset:?}")]
    ChunkNotFound { path: String, offset: GridCoord },
    #[error("dataset {path}: could not read {size} bytes at address {address}")]
    BackingRead {
        path: String,
        address: u64,
        size: u64,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    FilterInit(#[from] FilterInitError),
    #[error(transparent)]
    FilterDecode(#[from] FilterDecodeError),
    #[error(transparent)]
    Overflow(#[from] DimensionOverflow),
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),
    #[error("dataset {path} needs {bytes} bytes, past the addressable limit")]
    DatasetTooLarge { path: String, bytes: u64 },
}

/// Reader over one chunked dataset.
///
/// The backing storage is borrowed machinery of the enclosing file: the
/// reader never closes it. All read methods take `&self` and may be called
/// from any thread.
pub struct ChunkedDataset<S: BackingStorage, I: ChunkIndex> {
    storage: S,
    path: String,
    layout: DatasetLayout,
    datatype: DataType,
    header: ObjectHeader,
    index: I,
    registry: FilterRegistry,
    pipeline: OnceLock<Result<Arc<FilterPipeline>, FilterInitError>>,
}

impl<S: BackingStorage, I: ChunkIndex> Ndim for ChunkedDataset<S, I> {
    fn ndim(&self) -> usize {
        self.layout.ndim()
    }
}

impl<S: BackingStorage, I: ChunkIndex> ChunkedDataset<S, I> {
    pub fn new(
        storage: S,
        path: impl Into<String>,
        dims: GridCoord,
        chunk_dims: GridCoord,
        datatype: DataType,
        header: ObjectHeader,
        index: I,
    ) -> Result<Self, LayoutError> {
        let layout = DatasetLayout::new(dims, chunk_dims, datatype.size())?;
        if let Some(chunk) = index.chunk_lookup().values().next() {
            layout.same_ndim(chunk)?;
        }
        Ok(Self {
            storage,
            path: path.into(),
            layout,
            datatype,
            header,
            index,
            registry: FilterRegistry::default(),
            pipeline: OnceLock::new(),
        })
    }

    /// Replace the filter registry. Only meaningful before the first decode:
    /// the pipeline is built once and kept.
    pub fn with_filter_registry(mut self, registry: FilterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dims(&self) -> &[u64] {
        self.layout.dims()
    }

    pub fn chunk_dims(&self) -> &[u64] {
        self.layout.chunk_dims()
    }

    pub fn datatype(&self) -> &DataType {
        &self.datatype
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// True iff no chunk has been allocated for this dataset.
    pub fn is_empty(&self) -> bool {
        self.index.chunk_lookup().is_empty()
    }

    /// Total on-disk (filtered) size of all allocated chunks.
    pub fn storage_in_bytes(&self) -> u64 {
        self.index.chunk_lookup().values().map(|c| c.size).sum()
    }

    /// The dataset's filter pipeline, building it on first use.
    ///
    /// Construction runs at most once per reader; a failure is kept and
    /// returned to every subsequent caller.
    pub fn filters(&self) -> Result<&FilterPipeline, ReadError> {
        Ok(self.pipeline()?.as_ref())
    }

    /// On-disk bytes of one chunk, still filtered.
    pub fn raw_chunk_buffer(&self, chunk_offset: &[u64]) -> Result<Bytes, ReadError> {
        let chunk = self.find_chunk(chunk_offset)?;
        self.read_raw(chunk)
    }

    /// Bytes of one chunk after undoing the filter pipeline. Always the full
    /// logical chunk size; edge chunks keep their overhang padding.
    pub fn decompressed_chunk(&self, chunk_offset: &[u64]) -> Result<Vec<u8>, ReadError> {
        let chunk = self.find_chunk(chunk_offset)?;
        self.decode_chunk(chunk)
    }

    fn find_chunk(&self, chunk_offset: &[u64]) -> Result<&Chunk, ReadError> {
        DimensionMismatch::check(chunk_offset.len(), self.ndim())?;
        let key: GridCoord = chunk_offset.iter().copied().collect();
        self.index
            .chunk_lookup()
            .get(&key)
            .ok_or_else(|| ReadError::ChunkNotFound {
                path: self.path.clone(),
                offset: key,
            })
    }

    fn pipeline(&self) -> Result<&Arc<FilterPipeline>, FilterInitError> {
        self.pipeline
            .get_or_init(|| match self.header.filter_pipeline() {
                Some(message) => {
                    debug!("building filter pipeline for {}", self.path);
                    self.registry.pipeline_for(message).map(Arc::new)
                }
                None => Ok(Arc::new(FilterPipeline::none())),
            })
            .as_ref()
            .map_err(|e| e.clone())
    }

    fn read_raw(&self, chunk: &Chunk) -> Result<Bytes, ReadError> {
        self.storage
            .map(chunk.address, chunk.size)
            .map_err(|source| ReadError::BackingRead {
                path: self.path.clone(),
                address: chunk.address,
                size: chunk.size,
                source,
            })
    }

    /// Read and unfilter one chunk, checking it decodes to the logical
    /// chunk size.
    fn decode_chunk(&self, chunk: &Chunk) -> Result<Vec<u8>, ReadError> {
        let pipeline = self.pipeline()?;
        let raw = self.read_raw(chunk)?;
        let data = if pipeline.is_identity() {
            raw.to_vec()
        } else {
            pipeline.decode(&raw)?
        };
        let expected = self.layout.chunk_byte_len()?;
        if data.len() != expected {
            return Err(FilterDecodeError::UnexpectedSize {
                actual: data.len(),
                expected,
            }
            .into());
        }
        Ok(data)
    }
}
