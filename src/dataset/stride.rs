//! Linear-offset arithmetic over n-dimensional row-major shapes.
//!
//! Everything here multiplies checked: a shape whose product leaves `u64`
//! is reported, never wrapped.

use crate::GridCoord;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("shape arithmetic overflowed a 64-bit size")]
pub struct DimensionOverflow;

/// Row-major strides: `s[R-1] = 1`, `s[i] = s[i+1] * shape[i+1]`.
///
/// A dimension's stride is the linear distance between elements adjacent in
/// that dimension.
pub fn strides(shape: &[u64]) -> Result<GridCoord, DimensionOverflow> {
    if shape.is_empty() {
        return Ok(GridCoord::new());
    }
    let mut out: GridCoord = GridCoord::with_capacity(shape.len());
    out.push(1);
    let mut acc: u64 = 1;
    for s in shape[1..].iter().rev() {
        acc = acc.checked_mul(*s).ok_or(DimensionOverflow)?;
        out.push(acc);
    }
    out.reverse();
    Ok(out)
}

/// Number of elements in a shape. The empty shape has one element.
pub fn total_elements(shape: &[u64]) -> Result<u64, DimensionOverflow> {
    shape
        .iter()
        .try_fold(1u64, |acc, s| acc.checked_mul(*s))
        .ok_or(DimensionOverflow)
}

/// Convert a linear element offset to a multi-index within `shape`.
pub fn linear_to_index(linear: u64, shape: &[u64]) -> Result<GridCoord, DimensionOverflow> {
    let s = strides(shape)?;
    Ok(shape
        .iter()
        .zip(s.iter())
        .map(|(dim, stride)| (linear / stride) % dim)
        .collect())
}

/// Convert a multi-index within `shape` to a linear element offset.
pub fn index_to_linear(index: &[u64], shape: &[u64]) -> Result<u64, DimensionOverflow> {
    let s = strides(shape)?;
    index
        .iter()
        .zip(s.iter())
        .try_fold(0u64, |acc, (i, stride)| {
            acc.checked_add(i.checked_mul(*stride)?)
        })
        .ok_or(DimensionOverflow)
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn row_major_strides() {
        let expect: GridCoord = smallvec![30, 6, 1];
        assert_eq!(strides(&[4, 5, 6]).unwrap(), expect);
        let expect: GridCoord = smallvec![1];
        assert_eq!(strides(&[7]).unwrap(), expect);
        assert_eq!(strides(&[]).unwrap(), GridCoord::new());
    }

    #[test]
    fn linear_round_trip() {
        let shape = [3u64, 4, 5];
        for linear in 0..60 {
            let idx = linear_to_index(linear, &shape).unwrap();
            assert_eq!(index_to_linear(&idx, &shape).unwrap(), linear);
        }
        let expect: GridCoord = smallvec![1, 0, 3];
        assert_eq!(linear_to_index(23, &shape).unwrap(), expect);
    }

    #[test]
    fn totals() {
        assert_eq!(total_elements(&[3, 4, 5]).unwrap(), 60);
        assert_eq!(total_elements(&[]).unwrap(), 1);
        assert_eq!(total_elements(&[10, 0]).unwrap(), 0);
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(total_elements(&[u64::MAX, 2]), Err(DimensionOverflow));
        assert_eq!(strides(&[2, u64::MAX, u64::MAX]), Err(DimensionOverflow));
        assert_eq!(
            index_to_linear(&[u64::MAX, 0], &[u64::MAX, 3]),
            Err(DimensionOverflow)
        );
    }
}
