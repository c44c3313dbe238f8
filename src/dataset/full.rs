//! Whole-dataset materialization: one task per chunk, fanned out on the
//! rayon pool, all writing into a single shared output buffer.
//!
//! Chunk tiles are pairwise disjoint, and each run copy targets the tile's
//! image in the row-major output, so concurrent writes never overlap. The
//! join at the end of the fan-out orders every write before the buffer is
//! returned.

use log::debug;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use unsafe_cell_slice::UnsafeCellSlice;

use crate::{
    index::{Chunk, ChunkIndex},
    storage::BackingStorage,
};

use super::{runs::RunTable, stride, ChunkedDataset, ReadError};

impl<S: BackingStorage, I: ChunkIndex> ChunkedDataset<S, I> {
    /// Materialize the entire dataset as a row-major byte buffer of length
    /// `product(dims) * element_size`.
    ///
    /// Unallocated regions stay zeroed. Chunks are decoded in parallel; the
    /// first failure is returned.
    pub fn data_buffer(&self) -> Result<Vec<u8>, ReadError> {
        let total_bytes = self.total_byte_len()?;
        let mut out = vec![0; total_bytes];
        if total_bytes == 0 || self.is_empty() {
            return Ok(out);
        }

        let runs = RunTable::new(self.layout())?;
        let lookup = self.index.chunk_lookup();
        debug!(
            "reading {} chunks of dataset {} in parallel",
            lookup.len(),
            self.path()
        );
        {
            let shared = UnsafeCellSlice::new(&mut out);
            lookup
                .par_iter()
                .try_for_each(|(_, chunk)| self.fill_from_chunk(chunk, &runs, &shared, total_bytes))?;
        }
        Ok(out)
    }

    fn total_byte_len(&self) -> Result<usize, ReadError> {
        let bytes = self
            .layout()
            .total_elements()?
            .checked_mul(self.layout().element_size() as u64)
            .ok_or(stride::DimensionOverflow)?;
        usize::try_from(bytes).map_err(|_| ReadError::DatasetTooLarge {
            path: self.path().to_owned(),
            bytes,
        })
    }

    /// Decode one chunk and copy its runs into place.
    fn fill_from_chunk(
        &self,
        chunk: &Chunk,
        runs: &RunTable,
        out: &UnsafeCellSlice<u8>,
        out_bytes: usize,
    ) -> Result<(), ReadError> {
        let data = self.decode_chunk(chunk)?;
        let e = self.layout().element_size() as u64;
        let origin = stride::index_to_linear(&chunk.offset, self.layout().dims())?;
        let full_run_bytes = (runs.fastest_chunk_dim() * e) as usize;

        if !self.layout().is_partial(&chunk.offset) {
            for run in 0..runs.len() {
                let src = runs.byte_start(run) as usize;
                let dst = ((runs.elem_offset(run) + origin) * e) as usize;
                // SAFETY: chunk tiles are disjoint, so no two chunks write
                // overlapping output ranges.
                unsafe {
                    out.index_mut(dst..dst + full_run_bytes)
                        .copy_from_slice(&data[src..src + full_run_bytes]);
                }
            }
            return Ok(());
        }

        // edge chunk: trim the fastest dimension, skip rows outside the
        // dataset in the other dimensions
        let kept = runs
            .fastest_chunk_dim()
            .saturating_sub(self.layout().fastest_overhang(&chunk.offset));
        let kept_bytes = (kept * e) as usize;
        for run in 0..runs.len() {
            // fast skip for runs starting past the dataset end; compares an
            // element count against the byte length, which only over-accepts
            if runs.elem_offset(run) > out_bytes as u64 {
                continue;
            }
            if self
                .layout()
                .run_outside_dataset(runs.byte_start(run) / e, &chunk.offset)?
            {
                continue;
            }
            let src = runs.byte_start(run) as usize;
            let dst = ((runs.elem_offset(run) + origin) * e) as usize;
            // SAFETY: as above; trimmed runs stay inside this chunk's tile.
            unsafe {
                out.index_mut(dst..dst + kept_bytes)
                    .copy_from_slice(&data[src..src + kept_bytes]);
            }
        }
        Ok(())
    }
}
