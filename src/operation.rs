//! Recorded row operations that replay a solved elimination against a
//! fresh `D` matrix without re-running the solver.
//!
//! Grounded on `examples/original_source/.../Operation.hpp`/`.cpp`: five
//! operation kinds (`SWAP`, `ADD_MUL`, `DIV`, `BLOCK`, `REORDER`), each
//! able to replay itself onto a matrix (`build_mtx`) and report its
//! serialized byte size. Modeled here as a single tagged-sum enum per
//! SPEC_FULL §9 instead of a class hierarchy.

use crate::matrix::{DenseMatrix, SparseMatrix};

#[derive(Debug, Clone)]
pub enum Operation {
    Swap { row_1: u16, row_2: u16 },
    AddMul { row_1: u16, row_2: u16, scalar: u8 },
    Div { row: u16, scalar: u8 },
    Block(SparseMatrix),
    Reorder(Vec<u16>),
}

const TAG_SWAP: u8 = 0;
const TAG_ADD_MUL: u8 = 1;
const TAG_DIV: u8 = 2;
const TAG_BLOCK: u8 = 3;
const TAG_REORDER: u8 = 4;

impl Operation {
    /// Replays this operation onto `mtx`, matching each `Operation_*::build_mtx`.
    pub fn build(&self, mtx: &mut DenseMatrix) {
        match self {
            Operation::Swap { row_1, row_2 } => {
                mtx.row_swap(*row_1 as usize, *row_2 as usize);
            }
            Operation::AddMul {
                row_1,
                row_2,
                scalar,
            } => {
                mtx.row_scaled_add(*row_1 as usize, *row_2 as usize, *scalar);
            }
            Operation::Div { row, scalar } => {
                mtx.row_div(*row as usize, *scalar);
            }
            Operation::Block(sparse) => {
                let rows = sparse.rows();
                let cols = mtx.cols();
                let mut out_rows = vec![vec![0u8; cols]; rows];
                for r in 0..rows {
                    sparse.multiply_row_into(r, |c| mtx.row(c).to_vec(), &mut out_rows[r]);
                }
                for (r, row) in out_rows.into_iter().enumerate() {
                    mtx.row_mut(r).copy_from_slice(&row);
                }
            }
            Operation::Reorder(order) => {
                let cols = mtx.cols();
                let snapshot: Vec<Vec<u8>> = (0..mtx.rows()).map(|r| mtx.row(r).to_vec()).collect();
                for (dst, &src) in order.iter().enumerate() {
                    mtx.row_mut(dst)[..cols].copy_from_slice(&snapshot[src as usize]);
                }
            }
        }
    }

    /// Serialized byte size: one tag byte plus payload, matching each
    /// `Operation_*::size()`.
    pub fn size(&self) -> usize {
        match self {
            Operation::Swap { .. } => 1 + 2 + 2,
            Operation::AddMul { .. } => 1 + 2 + 2 + 1,
            Operation::Div { .. } => 1 + 2 + 1,
            Operation::Block(sparse) => 1 + 4 + 4 + sparse.nnz() * (4 + 1) + (sparse.rows() + 1) * 4,
            Operation::Reorder(order) => 1 + 4 + order.len() * 2,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Operation::Swap { row_1, row_2 } => {
                out.push(TAG_SWAP);
                out.extend_from_slice(&row_1.to_le_bytes());
                out.extend_from_slice(&row_2.to_le_bytes());
            }
            Operation::AddMul {
                row_1,
                row_2,
                scalar,
            } => {
                out.push(TAG_ADD_MUL);
                out.extend_from_slice(&row_1.to_le_bytes());
                out.extend_from_slice(&row_2.to_le_bytes());
                out.push(*scalar);
            }
            Operation::Div { row, scalar } => {
                out.push(TAG_DIV);
                out.extend_from_slice(&row.to_le_bytes());
                out.push(*scalar);
            }
            Operation::Block(sparse) => {
                out.push(TAG_BLOCK);
                out.extend_from_slice(&(sparse.rows() as u32).to_le_bytes());
                out.extend_from_slice(&(sparse.cols() as u32).to_le_bytes());
                for r in 0..sparse.rows() {
                    let entries: Vec<_> = sparse.row_entries(r).collect();
                    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                    for (c, v) in entries {
                        out.extend_from_slice(&(c as u32).to_le_bytes());
                        out.push(v);
                    }
                }
            }
            Operation::Reorder(order) => {
                out.push(TAG_REORDER);
                out.extend_from_slice(&(order.len() as u32).to_le_bytes());
                for &idx in order {
                    out.extend_from_slice(&idx.to_le_bytes());
                }
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Option<(Operation, usize)> {
        let tag = *bytes.first()?;
        let rest = &bytes[1..];
        match tag {
            TAG_SWAP => {
                let row_1 = u16::from_le_bytes(rest.get(0..2)?.try_into().ok()?);
                let row_2 = u16::from_le_bytes(rest.get(2..4)?.try_into().ok()?);
                Some((Operation::Swap { row_1, row_2 }, 1 + 4))
            }
            TAG_ADD_MUL => {
                let row_1 = u16::from_le_bytes(rest.get(0..2)?.try_into().ok()?);
                let row_2 = u16::from_le_bytes(rest.get(2..4)?.try_into().ok()?);
                let scalar = *rest.get(4)?;
                Some((
                    Operation::AddMul {
                        row_1,
                        row_2,
                        scalar,
                    },
                    1 + 5,
                ))
            }
            TAG_DIV => {
                let row = u16::from_le_bytes(rest.get(0..2)?.try_into().ok()?);
                let scalar = *rest.get(2)?;
                Some((Operation::Div { row, scalar }, 1 + 3))
            }
            TAG_REORDER => {
                let len = u32::from_le_bytes(rest.get(0..4)?.try_into().ok()?) as usize;
                let mut order = Vec::with_capacity(len);
                let mut off = 4;
                for _ in 0..len {
                    order.push(u16::from_le_bytes(rest.get(off..off + 2)?.try_into().ok()?));
                    off += 2;
                }
                Some((Operation::Reorder(order), 1 + off))
            }
            TAG_BLOCK => {
                let rows = u32::from_le_bytes(rest.get(0..4)?.try_into().ok()?) as usize;
                let cols = u32::from_le_bytes(rest.get(4..8)?.try_into().ok()?) as usize;
                let mut off = 8;
                let mut dense = vec![vec![0u8; cols]; rows];
                for r in dense.iter_mut() {
                    let n = u32::from_le_bytes(rest.get(off..off + 4)?.try_into().ok()?) as usize;
                    off += 4;
                    for _ in 0..n {
                        let c = u32::from_le_bytes(rest.get(off..off + 4)?.try_into().ok()?) as usize;
                        off += 4;
                        let v = *rest.get(off)?;
                        off += 1;
                        r[c] = v;
                    }
                }
                let sparse = SparseMatrix::from_dense_block(|r, c| dense[r][c], rows, cols);
                Some((Operation::Block(sparse), 1 + off))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DenseMatrix;

    #[test]
    fn swap_replays_correctly() {
        let mut m = DenseMatrix::zero(2, 2);
        m.set(0, 0, 1);
        m.set(1, 0, 2);
        Operation::Swap { row_1: 0, row_2: 1 }.build(&mut m);
        assert_eq!(m.get(0, 0), 2);
        assert_eq!(m.get(1, 0), 1);
    }

    #[test]
    fn div_replays_correctly() {
        let mut m = DenseMatrix::zero(1, 1);
        m.set(0, 0, 2);
        Operation::Div { row: 0, scalar: 2 }.build(&mut m);
        assert_eq!(m.get(0, 0), 1);
    }

    #[test]
    fn swap_round_trips_through_encode_decode() {
        let op = Operation::Swap { row_1: 3, row_2: 9 };
        let mut buf = Vec::new();
        op.encode(&mut buf);
        assert_eq!(buf.len(), op.size());
        let (decoded, consumed) = Operation::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        match decoded {
            Operation::Swap { row_1, row_2 } => {
                assert_eq!(row_1, 3);
                assert_eq!(row_2, 9);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn reorder_round_trips() {
        let op = Operation::Reorder(vec![2, 0, 1]);
        let mut buf = Vec::new();
        op.encode(&mut buf);
        let (decoded, consumed) = Operation::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        match decoded {
            Operation::Reorder(order) => assert_eq!(order, vec![2, 0, 1]),
            _ => panic!("wrong variant"),
        }
    }
}
