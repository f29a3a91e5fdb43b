//! Assembles the constraint matrix `A` (the precode matrix) that the
//! five-phase solver reduces to recover the L intermediate symbols.
//!
//! Grounded verbatim on
//! `examples/original_source/.../Precode_Matrix_Init.hpp`: LDPC1's
//! three-ones-per-column circulant, LDPC2's two-consecutive-ones band,
//! the HDPC block as `MT * GAMMA`, and `G_ENC`'s per-ISI LT/PI columns.

use crate::matrix::DenseMatrix;
use crate::params::Parameters;

/// `A`, sized `(L + overhead) x L`, plus the parameters it was built from.
pub struct PrecodeMatrix {
    pub a: DenseMatrix,
    pub params: Parameters,
}

impl PrecodeMatrix {
    /// Builds `A` with `repair_overhead` extra rows of `G_ENC` appended past
    /// the first `L` rows, one per source ISI `0..K'` in order, matching
    /// `Precode_Matrix::gen`. Correct only when every one of those ISIs is
    /// actually the data being placed in the matching `D` row (the
    /// encoder's case, where every source symbol is present); a decoder
    /// missing some source symbols must use [`Self::gen_with_isis`] instead
    /// so each row's constraint matches the data actually substituted in.
    pub fn gen(params: Parameters, repair_overhead: u32) -> Self {
        let row_isi: Vec<u32> = (0..(params.k_padded + repair_overhead)).collect();
        Self::gen_with_isis(params, repair_overhead, &row_isi)
    }

    /// Builds `A` the same way as [`Self::gen`], but with `row_isi[k]`
    /// giving the actual ISI each `G_ENC` row `k` (`0..K'+repair_overhead`)
    /// is generated for, instead of assuming row `k` is always ISI `k`.
    /// Grounded on `decode_phase0`: a missing source symbol's row is
    /// replaced wholesale by a received repair symbol's real constraint
    /// (and that repair's real data goes in the matching `D` row), rather
    /// than leaving the row's own (unknown) constraint in place.
    pub fn gen_with_isis(params: Parameters, repair_overhead: u32, row_isi: &[u32]) -> Self {
        assert_eq!(row_isi.len(), (params.k_padded + repair_overhead) as usize);
        let l = params.l as usize;
        let s = params.s as usize;
        let h = params.h as usize;
        let k_padded_plus_s = (params.k_padded + params.s) as usize;
        let total_rows = l + repair_overhead as usize;

        let mut a = DenseMatrix::zero(total_rows, l);

        init_ldpc1(&mut a, params.s, params.b);
        add_identity(&mut a, s, 0, params.b as usize);
        init_ldpc2(&mut a, params.w as usize, s, params.p as usize);

        let mt = make_mt(&params, k_padded_plus_s);
        let gamma = make_gamma(k_padded_plus_s);
        let hdpc = multiply(&mt, &gamma);
        for (r, row) in hdpc.iter().enumerate() {
            a.row_mut(s + r)[..k_padded_plus_s].copy_from_slice(row);
        }
        add_identity(&mut a, h, s, k_padded_plus_s);

        for (k, &isi) in row_isi.iter().enumerate() {
            add_g_enc_row(&mut a, &params, s + h + k, isi);
        }

        log::trace!(
            "precode matrix generated: L={l} rows={total_rows} overhead={repair_overhead}"
        );
        PrecodeMatrix { a, params }
    }
}

/// `init_LDPC1`: three ones per column in the S x B circulant band. Uses
/// set-to-1 (not XOR) per column/row pair: the three candidate rows can
/// coincide for some (col, submtx) pairs, and the reference assigns `1`
/// unconditionally on a match rather than toggling.
fn init_ldpc1(a: &mut DenseMatrix, s: u32, b: u32) {
    let s = s as usize;
    for col in 0..b as usize {
        let submtx = col / s;
        let r1 = col % s;
        let r2 = (col + submtx + 1) % s;
        let r3 = (col + 2 * (submtx + 1)) % s;
        a.set(r1, col, 1);
        a.set(r2, col, 1);
        a.set(r3, col, 1);
    }
}

/// Adds a `size x size` identity block starting at `(skip_row, skip_col)`.
fn add_identity(a: &mut DenseMatrix, size: usize, skip_row: usize, skip_col: usize) {
    for i in 0..size {
        a.set(skip_row + i, skip_col + i, a.get(skip_row + i, skip_col + i) ^ 1);
    }
}

/// `init_LDPC2`: two consecutive ones per row (rows `0..rows`, i.e. `0..S`),
/// in a `cols`-wide (`P`-wide) band starting at column `col_skip` (`W`).
fn init_ldpc2(a: &mut DenseMatrix, col_skip: usize, rows: usize, cols: usize) {
    for row in 0..rows {
        let start = row % cols;
        let c1 = col_skip + start;
        let c2 = col_skip + (start + 1) % cols;
        a.set(row, c1, 1);
        a.set(row, c2, 1);
    }
}

/// `make_MT`: H x (K'+S), mostly zero with two or three ones per column
/// (per `Rand`) plus a final alpha^row column.
fn make_mt(params: &Parameters, cols: usize) -> Vec<Vec<u8>> {
    let h = params.h as usize;
    let mut mt = vec![vec![0u8; cols]; h];
    for c in 0..cols {
        if c == cols - 1 {
            for (r, row) in mt.iter_mut().enumerate() {
                row[c] = crate::params::alpha_pow(r as u32);
            }
            continue;
        }
        // Both rows are set to 1 outright, not XORed: r1 == r2 is possible
        // for some columns, and the reference assigns 1 on a match rather
        // than toggling, so a coincidence must not cancel back to 0.
        let r1 = crate::params::rand((c as u32) + 1, 6, h as u32) as usize;
        mt[r1][c] = 1;
        let r2 = ((r1 as u32 + crate::params::rand((c as u32) + 1, 7, (h - 1) as u32) + 1) % h as u32)
            as usize;
        mt[r2][c] = 1;
    }
    mt
}

/// `make_GAMMA`: lower-triangular (K'+S) x (K'+S), `GAMMA[r][c] = alpha^(r-c)`
/// for `c <= r`, else 0.
fn make_gamma(size: usize) -> Vec<Vec<u8>> {
    let mut gamma = vec![vec![0u8; size]; size];
    for r in 0..size {
        for c in 0..=r {
            gamma[r][c] = crate::params::alpha_pow(((r - c) % 255) as u32);
        }
    }
    gamma
}

fn multiply(lhs: &[Vec<u8>], rhs: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let rows = lhs.len();
    let inner = rhs.len();
    let cols = rhs.first().map(|r| r.len()).unwrap_or(0);
    let mut out = vec![vec![0u8; cols]; rows];
    for r in 0..rows {
        for (k, lhs_rk) in lhs[r].iter().enumerate().take(inner) {
            if *lhs_rk == 0 {
                continue;
            }
            for c in 0..cols {
                out[r][c] = crate::gf256::mul_add(*lhs_rk, rhs[k][c], out[r][c]);
            }
        }
    }
    out
}

/// `add_G_ENC`: zeroes row `row` then sets ones at the LT/PI indices for
/// the given ISI, per `Parameters::get_idxs`.
fn add_g_enc_row(a: &mut DenseMatrix, params: &Parameters, row: usize, isi: u32) {
    a.zero_row(row);
    // Assignment, not XOR: the LT portion of get_idxs can repeat an index
    // when `a` and `W` share a factor, and the reference only ever writes
    // `1` at these columns, never toggles.
    for idx in params.get_idxs(isi) {
        let c = idx as usize;
        a.set(row, c, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_produces_l_rows_plus_overhead() {
        let params = Parameters::new(10);
        let pm = PrecodeMatrix::gen(params, 2);
        assert_eq!(pm.a.rows(), params.l as usize + 2);
        assert_eq!(pm.a.cols(), params.l as usize);
    }

    #[test]
    fn ldpc2_band_sits_at_column_offset_w() {
        let params = Parameters::new(10);
        let mut a = DenseMatrix::zero(params.l as usize, params.l as usize);
        init_ldpc2(&mut a, params.w as usize, params.s as usize, params.p as usize);
        for row in 0..params.s as usize {
            let before: u32 = (0..params.w as usize).map(|c| a.get(row, c) as u32).sum();
            assert_eq!(before, 0, "LDPC2 must not touch columns before W");
            let within: u32 = (params.w as usize..params.l as usize)
                .map(|c| a.get(row, c) as u32)
                .sum();
            assert_eq!(within, 2, "each LDPC2 row has exactly two ones within [W, L)");
        }
    }

    #[test]
    fn ldpc1_band_has_three_ones_per_column() {
        let params = Parameters::new(10);
        let mut a = DenseMatrix::zero(params.l as usize, params.l as usize);
        init_ldpc1(&mut a, params.s, params.b);
        for col in 0..params.b as usize {
            let ones: u32 = (0..params.s as usize).map(|r| a.get(r, col) as u32).sum();
            assert_eq!(ones, 3);
        }
    }
}
