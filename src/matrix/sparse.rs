//! Sparse row-major (CSR-ish) octet matrix, used for phase 3's
//! `X[0:i,0:i] * A[0:i,:]` block multiply.
//!
//! Grounded on the teacher's `CsrMatrix` (`src/fec/decoder.rs`):
//! `values`/`col_indices`/`row_ptr` triplet with `append_row`/`get_val`/
//! `row_entries`, generalized here to a construct-from-dense builder (phase
//! 3 starts from a dense sub-block of X) instead of incremental packet
//! ingestion.

use crate::gf256;

/// One non-zero entry per (row, col).
#[derive(Clone)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    col_indices: Vec<u32>,
    values: Vec<u8>,
}

impl SparseMatrix {
    /// Builds a sparse view of `dense[0..rows, 0..cols]`.
    pub fn from_dense_block(
        get: impl Fn(usize, usize) -> u8,
        rows: usize,
        cols: usize,
    ) -> Self {
        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for r in 0..rows {
            for c in 0..cols {
                let v = get(r, c);
                if v != 0 {
                    col_indices.push(c as u32);
                    values.push(v);
                }
            }
            row_ptr.push(col_indices.len());
        }
        SparseMatrix {
            rows,
            cols,
            row_ptr,
            col_indices,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row_entries(&self, r: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
        let start = self.row_ptr[r];
        let end = self.row_ptr[r + 1];
        self.col_indices[start..end]
            .iter()
            .zip(self.values[start..end].iter())
            .map(|(&c, &v)| (c as usize, v))
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `out_row = sum_c self[row, c] * rhs_row(c)`, folded with XOR, where
    /// `rhs_row(c)` yields the byte slice of row `c` of the right-hand
    /// dense operand. Used to compute `sub_X * sub_A` and `sub_X * D` in
    /// phase 3 without materializing `sub_X` densely.
    pub fn multiply_row_into(
        &self,
        row: usize,
        rhs_row: impl Fn(usize) -> Vec<u8>,
        out: &mut [u8],
    ) {
        out.fill(0);
        for (c, coeff) in self.row_entries(row) {
            let rhs = rhs_row(c);
            for (o, &b) in out.iter_mut().zip(rhs.iter()) {
                *o = gf256::mul_add(coeff, b, *o);
            }
        }
    }
}
