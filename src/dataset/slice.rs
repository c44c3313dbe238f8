//! Hyperslab reads: a rectangular sub-region materialized by intersecting
//! the slice with every chunk it touches and copying element by element.
//!
//! Chunks absent from the lookup are skipped; the slice keeps its zero fill
//! for positions they would have covered. Decoding is sequential here, one
//! chunk at a time.

use itertools::Itertools;

use crate::{
    index::ChunkIndex, storage::BackingStorage, DimensionMismatch, GridCoord, Ndim,
};

use super::{stride, stride::DimensionOverflow, ChunkedDataset, ReadError};

impl<S: BackingStorage, I: ChunkIndex> ChunkedDataset<S, I> {
    /// Materialize the hyperslab at `slice_offset` of extent `slice_shape`
    /// as a row-major byte buffer of length
    /// `product(slice_shape) * element_size`.
    pub fn slice_buffer(
        &self,
        slice_offset: &[u64],
        slice_shape: &[u64],
    ) -> Result<Vec<u8>, ReadError> {
        let r = self.ndim();
        DimensionMismatch::check(slice_offset.len(), r)?;
        DimensionMismatch::check(slice_shape.len(), r)?;

        let e = self.layout().element_size() as u64;
        let total_bytes = stride::total_elements(slice_shape)?
            .checked_mul(e)
            .ok_or(DimensionOverflow)?;
        let total_bytes = usize::try_from(total_bytes).map_err(|_| ReadError::DatasetTooLarge {
            path: self.path().to_owned(),
            bytes: total_bytes,
        })?;
        let mut out = vec![0; total_bytes];
        if total_bytes == 0 || self.is_empty() {
            return Ok(out);
        }

        let chunk_dims = self.layout().chunk_dims();
        let slice_strides = stride::strides(slice_shape)?;
        let chunk_strides = stride::strides(chunk_dims)?;

        // chunk-grid bounding box of the slice, inclusive
        let grid_ranges = (0..r)
            .map(|d| {
                let first = slice_offset[d] / chunk_dims[d];
                let last = slice_offset[d]
                    .checked_add(slice_shape[d] - 1)
                    .ok_or(DimensionOverflow)?
                    / chunk_dims[d];
                Ok(first..=last)
            })
            .collect::<Result<Vec<_>, DimensionOverflow>>()?;

        for grid in grid_ranges.into_iter().multi_cartesian_product() {
            let chunk_offset: GridCoord = grid
                .iter()
                .zip(chunk_dims.iter())
                .map(|(g, cd)| g * cd)
                .collect();
            let chunk = match self.index.chunk_lookup().get(&chunk_offset) {
                Some(c) => c,
                // unallocated region; the output keeps its zero fill
                None => continue,
            };
            let data = self.decode_chunk(chunk)?;

            // intersection of chunk and slice, in dataset coordinates,
            // rebased to chunk-local and slice-local origins
            let mut copy_shape: GridCoord = GridCoord::with_capacity(r);
            let mut chunk_start: GridCoord = GridCoord::with_capacity(r);
            let mut slice_start: GridCoord = GridCoord::with_capacity(r);
            for d in 0..r {
                let start = slice_offset[d].max(chunk_offset[d]);
                let end = slice_offset[d]
                    .saturating_add(slice_shape[d])
                    .min(chunk_offset[d].saturating_add(chunk_dims[d]));
                copy_shape.push(end - start);
                chunk_start.push(start - chunk_offset[d]);
                slice_start.push(start - slice_offset[d]);
            }

            self.copy_intersection(
                &data,
                &mut out,
                &copy_shape,
                &chunk_start,
                &chunk_strides,
                &slice_start,
                &slice_strides,
            );
        }
        Ok(out)
    }

    /// Row-major walk over the intersection, copying one element per step.
    #[allow(clippy::too_many_arguments)]
    fn copy_intersection(
        &self,
        chunk_data: &[u8],
        out: &mut [u8],
        copy_shape: &[u64],
        chunk_start: &[u64],
        chunk_strides: &[u64],
        slice_start: &[u64],
        slice_strides: &[u64],
    ) {
        let r = copy_shape.len();
        let e = self.layout().element_size() as usize;
        let mut idx: GridCoord = std::iter::repeat(0).take(r).collect();
        'walk: loop {
            let mut chunk_elem = 0u64;
            let mut slice_elem = 0u64;
            for d in 0..r {
                chunk_elem += (chunk_start[d] + idx[d]) * chunk_strides[d];
                slice_elem += (slice_start[d] + idx[d]) * slice_strides[d];
            }
            let src = chunk_elem as usize * e;
            let dst = slice_elem as usize * e;
            out[dst..dst + e].copy_from_slice(&chunk_data[src..src + e]);

            // odometer increment, fastest dimension last
            let mut d = r;
            loop {
                if d == 0 {
                    break 'walk;
                }
                d -= 1;
                idx[d] += 1;
                if idx[d] < copy_shape[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use crate::dataset::tests::{dataset_from_chunks, TestDataset};
    use crate::dataset::ReadError;

    fn four_by_four() -> TestDataset {
        dataset_from_chunks(
            smallvec![4, 4],
            smallvec![2, 2],
            1,
            vec![
                (smallvec![0, 0], vec![0, 1, 2, 3]),
                (smallvec![0, 2], vec![4, 5, 6, 7]),
                (smallvec![2, 0], vec![8, 9, 10, 11]),
                (smallvec![2, 2], vec![12, 13, 14, 15]),
            ],
        )
    }

    #[test]
    fn slice_across_chunk_corners() {
        let ds = four_by_four();
        // dataBuffer is [0,1,4,5, 2,3,6,7, 8,9,12,13, 10,11,14,15]
        let got = ds.reader().slice_buffer(&[1, 1], &[2, 2]).unwrap();
        assert_eq!(got, vec![3, 6, 9, 12]);
    }

    #[test]
    fn slice_within_one_chunk() {
        let ds = four_by_four();
        assert_eq!(ds.reader().slice_buffer(&[0, 0], &[2, 2]).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(ds.reader().slice_buffer(&[3, 2], &[1, 2]).unwrap(), vec![14, 15]);
    }

    #[test]
    fn degenerate_slice_is_a_row_or_column() {
        let ds = four_by_four();
        assert_eq!(ds.reader().slice_buffer(&[1, 0], &[1, 4]).unwrap(), vec![2, 3, 6, 7]);
        assert_eq!(ds.reader().slice_buffer(&[0, 1], &[4, 1]).unwrap(), vec![1, 3, 9, 11]);
    }

    #[test]
    fn whole_dataset_slice_equals_full_read() {
        for ds in [four_by_four(), TestDataset::checkerboard()] {
            let r = ds.reader();
            let dims = r.dims().to_vec();
            let origin = vec![0; dims.len()];
            assert_eq!(r.slice_buffer(&origin, &dims).unwrap(), r.data_buffer().unwrap());
        }
    }

    #[test]
    fn interior_slices_match_the_full_buffer() {
        let ds = TestDataset::checkerboard();
        let r = ds.reader();
        let full = r.data_buffer().unwrap();
        let (rows, cols) = (r.dims()[0], r.dims()[1]);
        for off_r in 0..rows {
            for off_c in 0..cols {
                let shape = [rows - off_r, cols - off_c];
                let got = r.slice_buffer(&[off_r, off_c], &shape).unwrap();
                let mut expect = Vec::default();
                for row in off_r..rows {
                    let base = (row * cols + off_c) as usize;
                    expect.extend_from_slice(&full[base..base + shape[1] as usize]);
                }
                assert_eq!(got, expect, "slice at [{}, {}]", off_r, off_c);
            }
        }
    }

    #[test]
    fn absent_chunks_leave_zero_fill() {
        let ds = dataset_from_chunks(
            smallvec![4, 4],
            smallvec![2, 2],
            1,
            vec![(smallvec![0, 0], vec![1, 2, 3, 4])],
        );
        let got = ds.reader().slice_buffer(&[0, 0], &[4, 4]).unwrap();
        let expect = vec![1, 2, 0, 0, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(got, expect);
    }

    #[test]
    fn empty_slice_is_empty() {
        let ds = four_by_four();
        assert_eq!(ds.reader().slice_buffer(&[1, 1], &[0, 2]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn wrong_rank_is_rejected() {
        let ds = four_by_four();
        assert!(matches!(
            ds.reader().slice_buffer(&[1], &[2]),
            Err(ReadError::DimensionMismatch(_))
        ));
    }
}
