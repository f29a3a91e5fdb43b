//! Octet-matrix kernel: a dense, SIMD-backed representation for the
//! precode matrix proper, and a sparse representation for phase 3's
//! densifying multiply.

mod dense;
mod sparse;

pub use dense::DenseMatrix;
pub use sparse::SparseMatrix;
