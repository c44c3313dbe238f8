//! Dataset/chunk geometry: shared shape bookkeeping, partial-chunk
//! detection, and the overhang math for edge chunks.

use thiserror::Error;

use crate::{DimensionMismatch, GridCoord, Ndim};

use super::stride::{self, DimensionOverflow};

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("dataset shape is empty")]
    EmptyShape,
    #[error("chunk shape contains a zero")]
    ZeroChunkDimension,
    #[error("element size is zero")]
    ZeroElementSize,
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),
}

/// The fixed geometry of one chunked dataset: dataset extent, chunk tile
/// shape, and element size. Chunk tiles need not divide the extent evenly;
/// chunks reaching past it are "partial" and get trimmed during copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    dims: GridCoord,
    chunk_dims: GridCoord,
    element_size: u32,
}

impl Ndim for DatasetLayout {
    fn ndim(&self) -> usize {
        self.dims.len()
    }
}

impl DatasetLayout {
    pub fn new(
        dims: GridCoord,
        chunk_dims: GridCoord,
        element_size: u32,
    ) -> Result<Self, LayoutError> {
        if dims.is_empty() {
            return Err(LayoutError::EmptyShape);
        }
        DimensionMismatch::check(chunk_dims.len(), dims.len())?;
        if chunk_dims.iter().any(|d| *d == 0) {
            return Err(LayoutError::ZeroChunkDimension);
        }
        if element_size == 0 {
            return Err(LayoutError::ZeroElementSize);
        }
        Ok(Self {
            dims,
            chunk_dims,
            element_size,
        })
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn chunk_dims(&self) -> &[u64] {
        &self.chunk_dims
    }

    pub fn element_size(&self) -> u32 {
        self.element_size
    }

    /// Chunk extent along the fastest-varying (last) dimension.
    pub fn fastest_chunk_dim(&self) -> u64 {
        *self.chunk_dims.last().expect("rank is at least one")
    }

    pub fn total_elements(&self) -> Result<u64, DimensionOverflow> {
        stride::total_elements(&self.dims)
    }

    pub fn chunk_elements(&self) -> Result<u64, DimensionOverflow> {
        stride::total_elements(&self.chunk_dims)
    }

    /// Logical (decompressed) size of any one chunk in bytes.
    pub fn chunk_byte_len(&self) -> Result<usize, DimensionOverflow> {
        let n = self
            .chunk_elements()?
            .checked_mul(self.element_size as u64)
            .ok_or(DimensionOverflow)?;
        usize::try_from(n).map_err(|_| DimensionOverflow)
    }

    /// Whether the chunk at `chunk_offset` reaches past the dataset extent
    /// in any dimension.
    pub fn is_partial(&self, chunk_offset: &[u64]) -> bool {
        chunk_offset
            .iter()
            .zip(self.chunk_dims.iter())
            .zip(self.dims.iter())
            .any(|((off, cd), d)| off.saturating_add(*cd) > *d)
    }

    /// Whether the run starting at element `internal` of a chunk placed at
    /// `chunk_offset` lies outside the dataset in a non-fastest dimension.
    ///
    /// Overhang in the fastest dimension is excluded: it is handled by
    /// truncating the copy length rather than skipping the run.
    pub fn run_outside_dataset(
        &self,
        internal: u64,
        chunk_offset: &[u64],
    ) -> Result<bool, DimensionOverflow> {
        let within = stride::linear_to_index(internal, &self.chunk_dims)?;
        let r = self.ndim();
        Ok(chunk_offset[..r - 1]
            .iter()
            .zip(within[..r - 1].iter())
            .zip(self.dims[..r - 1].iter())
            .any(|((off, loc), d)| off.saturating_add(*loc) >= *d))
    }

    /// By how many elements the chunk at `chunk_offset` overhangs the
    /// dataset in the fastest dimension. Zero for interior chunks.
    pub fn fastest_overhang(&self, chunk_offset: &[u64]) -> u64 {
        let r = self.ndim();
        chunk_offset[r - 1]
            .saturating_add(self.chunk_dims[r - 1])
            .saturating_sub(self.dims[r - 1])
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    fn layout() -> DatasetLayout {
        // 3x3 dataset tiled by 2x2 chunks: every edge chunk is partial
        DatasetLayout::new(smallvec![3u64, 3], smallvec![2u64, 2], 4).unwrap()
    }

    #[test]
    fn rejects_bad_shapes() {
        let empty: GridCoord = smallvec![];
        assert!(matches!(
            DatasetLayout::new(empty.clone(), empty, 1),
            Err(LayoutError::EmptyShape)
        ));
        assert!(matches!(
            DatasetLayout::new(smallvec![4u64], smallvec![0u64], 1),
            Err(LayoutError::ZeroChunkDimension)
        ));
        assert!(matches!(
            DatasetLayout::new(smallvec![4u64], smallvec![2u64], 0),
            Err(LayoutError::ZeroElementSize)
        ));
        assert!(matches!(
            DatasetLayout::new(smallvec![4u64, 4], smallvec![2u64], 1),
            Err(LayoutError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn partial_detection() {
        let l = layout();
        assert!(!l.is_partial(&[0, 0]));
        assert!(l.is_partial(&[0, 2]));
        assert!(l.is_partial(&[2, 0]));
        assert!(l.is_partial(&[2, 2]));

        let even = DatasetLayout::new(smallvec![4u64, 4], smallvec![2u64, 2], 1).unwrap();
        assert!(!even.is_partial(&[2, 2]));
    }

    #[test]
    fn run_membership_ignores_fastest_dimension() {
        let l = layout();
        // chunk at [2, 0]: row 0 is inside, row 1 is past the dataset
        assert!(!l.run_outside_dataset(0, &[2, 0]).unwrap());
        assert!(l.run_outside_dataset(2, &[2, 0]).unwrap());
        // chunk at [0, 2] overhangs only the fastest dimension: never skipped
        assert!(!l.run_outside_dataset(0, &[0, 2]).unwrap());
        assert!(!l.run_outside_dataset(2, &[0, 2]).unwrap());
    }

    #[test]
    fn fastest_overhang_is_trim_width() {
        let l = layout();
        assert_eq!(l.fastest_overhang(&[0, 0]), 0);
        assert_eq!(l.fastest_overhang(&[0, 2]), 1);
        assert_eq!(l.fastest_overhang(&[2, 0]), 0);
    }

    #[test]
    fn byte_lengths() {
        let l = layout();
        assert_eq!(l.chunk_byte_len().unwrap(), 16);
        assert_eq!(l.total_elements().unwrap(), 9);
    }
}
