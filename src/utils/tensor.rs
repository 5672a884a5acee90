//! Layout-independent reshaping.
//!
//! ndarray's `into_shape` follows the memory order of its input, so a
//! permuted or column-major view would be reshaped in the wrong element
//! order. Layers reshape through [`reshape`] instead, which always reads in
//! logical row-major order.

use crate::error::Result;
use ndarray::{Array, ArrayBase, Data, Dimension, StrideShape};

/// Copy `source` into a new array of `shape`, reading elements row-major.
pub fn reshape<S, D, E, Sh>(source: &ArrayBase<S, D>, shape: Sh) -> Result<Array<f64, E>>
where
    S: Data<Elem = f64>,
    D: Dimension,
    E: Dimension,
    Sh: Into<StrideShape<E>>,
{
    Ok(Array::from_shape_vec(shape, source.iter().copied().collect())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn test_reshape_transposed_view_uses_logical_order() {
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let t: Array2<f64> = reshape(&m.t(), (2, 3)).unwrap();
        assert_eq!(t, array![[1.0, 4.0, 2.0], [5.0, 3.0, 6.0]]);
    }

    #[test]
    fn test_reshape_rank_change() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        let r: Array3<f64> = reshape(&m, (1, 2, 2)).unwrap();
        assert_eq!(r[[0, 1, 0]], 3.0);
    }

    #[test]
    fn test_reshape_wrong_size_fails() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        let r: Result<Array2<f64>> = reshape(&m, (3, 2));
        assert!(r.is_err());
    }
}
