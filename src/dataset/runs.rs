//! Per-chunk run table: where each contiguous run along the fastest
//! dimension starts, both inside the chunk and in the dataset's linear
//! layout. Every chunk shares one chunk shape, so the table is computed
//! once per dataset and reused for all chunks.

use super::{
    layout::DatasetLayout,
    stride::{self, DimensionOverflow},
};

pub(crate) struct RunTable {
    /// Byte offset inside the (decompressed) chunk at which run i begins.
    byte_starts: Vec<u64>,
    /// Element offset of run i relative to the chunk's origin, in the
    /// dataset's linearization.
    elem_offsets: Vec<u64>,
    /// Elements per run.
    fastest_chunk_dim: u64,
}

impl RunTable {
    pub fn new(layout: &DatasetLayout) -> Result<Self, DimensionOverflow> {
        let chunk_dims = layout.chunk_dims();
        let r = chunk_dims.len();
        let fastest_chunk_dim = chunk_dims[r - 1];
        let element_size = layout.element_size() as u64;

        let run_count = stride::total_elements(&chunk_dims[..r - 1])?;
        let run_count = usize::try_from(run_count).map_err(|_| DimensionOverflow)?;
        let run_bytes = fastest_chunk_dim
            .checked_mul(element_size)
            .ok_or(DimensionOverflow)?;

        let dim_linear = stride::strides(layout.dims())?;

        let mut byte_starts = Vec::with_capacity(run_count);
        let mut elem_offsets = Vec::with_capacity(run_count);
        for i in 0..run_count as u64 {
            let byte_start = i.checked_mul(run_bytes).ok_or(DimensionOverflow)?;
            byte_starts.push(byte_start);

            let within = stride::linear_to_index(i * fastest_chunk_dim, chunk_dims)?;
            let elem = within
                .iter()
                .zip(dim_linear.iter())
                .try_fold(0u64, |acc, (loc, dl)| {
                    acc.checked_add(loc.checked_mul(*dl)?)
                })
                .ok_or(DimensionOverflow)?;
            elem_offsets.push(elem);
        }

        Ok(Self {
            byte_starts,
            elem_offsets,
            fastest_chunk_dim,
        })
    }

    pub fn len(&self) -> usize {
        self.byte_starts.len()
    }

    pub fn byte_start(&self, run: usize) -> u64 {
        self.byte_starts[run]
    }

    pub fn elem_offset(&self, run: usize) -> u64 {
        self.elem_offsets[run]
    }

    pub fn fastest_chunk_dim(&self) -> u64 {
        self.fastest_chunk_dim
    }
}
