//! Read-only access to chunked HDF5 datasets: on-disk chunk layout,
//! filter pipelines, and extraction of full datasets, hyperslabs,
//! and single chunks as contiguous byte buffers.

use smallvec::SmallVec;

pub mod dataset;
pub mod datatype;
pub mod filter;
pub mod header;
pub mod index;
pub mod prelude;
pub mod storage;

const COORD_SMALLVEC_SIZE: usize = 6;

/// Coordinate tuple with inline storage for the common low-rank case.
pub type CoordVec<T> = SmallVec<[T; COORD_SMALLVEC_SIZE]>;
/// Element coordinates, shapes and strides within a dataset.
pub type GridCoord = CoordVec<u64>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("coordinate has {actual} dimensions, expected {expected}")]
pub struct DimensionMismatch {
    pub actual: usize,
    pub expected: usize,
}

impl DimensionMismatch {
    pub fn check(actual: usize, expected: usize) -> Result<(), Self> {
        if actual == expected {
            Ok(())
        } else {
            Err(Self { actual, expected })
        }
    }
}

pub trait Ndim {
    fn ndim(&self) -> usize;

    fn same_ndim<T: Ndim>(&self, other: &T) -> Result<usize, DimensionMismatch> {
        let n = self.ndim();
        DimensionMismatch::check(other.ndim(), n)?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_check() {
        assert!(DimensionMismatch::check(3, 3).is_ok());
        let e = DimensionMismatch::check(2, 3).unwrap_err();
        assert_eq!(e.actual, 2);
        assert_eq!(e.expected, 3);
    }
}
