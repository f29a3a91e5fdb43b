//! Produces one encoding symbol (source or repair) from the solved
//! intermediate symbols `C`, given its encoding symbol ID.
//!
//! Grounded on
//! `examples/original_source/.../Precode_Matrix_Solver.hpp::encode`: XOR
//! together `C[tuple.b]`, the `d-1` further LT-indexed rows, and the
//! `d1` PI-indexed rows past `W`.

use crate::matrix::DenseMatrix;
use crate::params::Parameters;

/// Writes `C`'s combination for `isi` into `out`, which must be at least
/// `C`'s row width.
pub fn encode_symbol(c: &DenseMatrix, params: &Parameters, isi: u32, out: &mut [u8]) {
    out.fill(0);
    for idx in params.get_idxs(isi) {
        let row = c.row(idx as usize);
        for (o, &b) in out.iter_mut().zip(row.iter()) {
            *o ^= b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_symbol_recombination_is_deterministic() {
        let params = Parameters::new(10);
        let mut c = DenseMatrix::zero(params.l as usize, 8);
        for r in 0..params.l as usize {
            for col in 0..8 {
                c.set(r, col, ((r * 3 + col) % 251) as u8);
            }
        }
        let mut out1 = vec![0u8; 8];
        let mut out2 = vec![0u8; 8];
        encode_symbol(&c, &params, 0, &mut out1);
        encode_symbol(&c, &params, 0, &mut out2);
        assert_eq!(out1, out2);
    }

    #[test]
    fn different_isi_usually_differ() {
        let params = Parameters::new(10);
        let mut c = DenseMatrix::zero(params.l as usize, 8);
        for r in 0..params.l as usize {
            for col in 0..8 {
                c.set(r, col, ((r * 13 + col * 5 + 1) % 251) as u8);
            }
        }
        let mut out0 = vec![0u8; 8];
        let mut out1 = vec![0u8; 8];
        encode_symbol(&c, &params, 0, &mut out0);
        encode_symbol(&c, &params, 1, &mut out1);
        assert_ne!(out0, out1);
    }
}
