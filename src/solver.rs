//! The five-phase structured Gaussian elimination that recovers the L
//! intermediate symbols from a constraint matrix `A` and received-data
//! matrix `D`.
//!
//! Grounded on
//! `examples/original_source/.../Precode_Matrix_Solver.hpp` (phases 1-5
//! and the `intermediate()` orchestration) and `util/Graph.hpp` (the
//! union-find used to break phase 1's degree-2 ties). `decode_phase0`
//! (substituting lost repair rows) is folded into `PrecodeMatrix::gen`
//! and the decoder's `D`-matrix fill, since this crate always builds the
//! full `G_ENC` block up front rather than patching individual rows in
//! place; see DESIGN.md. Phases 3-5 collapse into diagonal normalization
//! plus a column-permutation un-swap (see `intermediate`'s tail); phase
//! 2 here runs Gauss-Jordan across every row instead of the reference's
//! `[row, L)` slice, which folds phase 4's `U_upper` clearing into the
//! same pass.

use crate::matrix::DenseMatrix;
use crate::operation::Operation;
use crate::params::Parameters;
use crate::work_state::KeepWorking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    Done,
    Failed,
    Stopped,
}

/// Union-find over column indices, used to find the largest connected
/// component among degree-2 rows in phase 1. Grounded on `util/Graph.hpp`:
/// note the reference `find` does single-step parent compression only,
/// not full path compression, which this port preserves.
struct Graph {
    parent: Vec<u16>,
    count: Vec<u16>,
    max_connections: u16,
}

impl Graph {
    fn new(size: usize) -> Self {
        Graph {
            parent: (0..size as u16).collect(),
            count: vec![1; size],
            max_connections: 1,
        }
    }

    fn find(&mut self, id: u16) -> u16 {
        let p = self.parent[id as usize];
        if p == id {
            return id;
        }
        let root = self.find(p);
        self.parent[id as usize] = root;
        root
    }

    fn connect(&mut self, a: u16, b: u16) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let new_count = self.count[ra as usize] + self.count[rb as usize];
        self.parent[rb as usize] = ra;
        self.count[ra as usize] = new_count;
        if new_count > self.max_connections {
            self.max_connections = new_count;
        }
    }

    fn is_max(&mut self, id: u16) -> bool {
        let root = self.find(id);
        self.count[root as usize] == self.max_connections
    }
}

struct Solver<'a> {
    a: DenseMatrix,
    d: &'a mut DenseMatrix,
    hdpc: Vec<bool>,
    ops: Vec<Operation>,
    keep_working: &'a KeepWorking,
    /// `c[pos]` is the original intermediate-symbol index now sitting at
    /// column `pos`, updated as phase 1 swaps columns to push non-pivot
    /// entries into the U tail. Needed to un-permute `D`'s rows back to
    /// symbol order once the solve finishes.
    c: Vec<u16>,
}

impl<'a> Solver<'a> {
    fn record(&mut self, op: Operation) {
        op.build(&mut self.a);
        self.apply_to_d(&op);
        self.ops.push(op);
    }

    fn col_swap(&mut self, a: usize, b: usize) {
        self.a.col_swap(a, b);
        self.c.swap(a, b);
    }

    fn apply_to_d(&mut self, op: &Operation) {
        match op {
            Operation::Swap { row_1, row_2 } => self.d.row_swap(*row_1 as usize, *row_2 as usize),
            Operation::AddMul {
                row_1,
                row_2,
                scalar,
            } => self.d.row_scaled_add(*row_1 as usize, *row_2 as usize, *scalar),
            Operation::Div { row, scalar } => self.d.row_div(*row as usize, *scalar),
            Operation::Block(_) | Operation::Reorder(_) => op.build(self.d),
        }
    }

    fn stopped(&self) -> bool {
        self.keep_working.is_stopped()
    }

    /// Row degree within the active V-window `[col_lo, col_hi)`.
    fn row_degree(&self, row: usize, col_lo: usize, col_hi: usize) -> usize {
        (col_lo..col_hi).filter(|&c| self.a.get(row, c) != 0).count()
    }

    /// Phase 1: reduce to `[I_i, 0; *, U]` by repeatedly choosing a pivot
    /// row/column from the active window and eliminating below it.
    ///
    /// `u` starts at `p`, the permanent-inactivation column count, holding
    /// those columns out of the active window `A[i.., i..L-u)` from the
    /// first iteration, per spec §4.4 ("starting with i=0, u=P").
    fn phase1(&mut self, l: usize, p: usize) -> Result<(usize, usize), ()> {
        let mut i = 0usize;
        let mut u = p;
        let rows = self.a.rows();

        // tracking[row] = (is_hdpc, original_degree): fixed once, before any
        // elimination, over the *full* row (columns [0, l)), and carried
        // along with whichever row currently occupies a given position
        // (swapped in lockstep with the matrix rows below).
        let mut degree: Vec<u32> = (0..rows)
            .map(|r| (0..l).filter(|&c| self.a.get(r, c) != 0).count() as u32)
            .collect();
        let mut is_hdpc: Vec<bool> = self.hdpc.clone();

        while i + u < l {
            if self.stopped() {
                return Err(());
            }
            let col_hi = l - u;

            // Step 1: minimum nonzero count `r` among rows with >=1 nonzero.
            let mut r_min = usize::MAX;
            for row in i..rows {
                let d = self.row_degree(row, i, col_hi);
                if d > 0 && d < r_min {
                    r_min = d;
                }
            }
            if r_min == usize::MAX {
                return Err(());
            }

            // Candidates: every row at the minimum count.
            let candidates: Vec<usize> = (i..rows)
                .filter(|&row| self.row_degree(row, i, col_hi) == r_min)
                .collect();

            // Step 2: graph over non-HDPC two-ones rows in the window; step 3
            // picks, among r=2 candidates, one whose first "1" lies in the
            // largest connected component.
            let chosen = if r_min == 2 {
                let mut graph = Graph::new(col_hi - i);
                for &row in &candidates {
                    if is_hdpc[row] {
                        continue;
                    }
                    let cols: Vec<usize> =
                        (i..col_hi).filter(|&c| self.a.get(row, c) != 0).collect();
                    if cols.len() == 2 {
                        graph.connect((cols[0] - i) as u16, (cols[1] - i) as u16);
                    }
                }
                candidates.iter().copied().find(|&row| {
                    let cols: Vec<usize> =
                        (i..col_hi).filter(|&c| self.a.get(row, c) != 0).collect();
                    cols.len() == 2 && graph.is_max((cols[0] - i) as u16)
                })
            } else {
                None
            };

            // Otherwise: minimum original_degree, non-HDPC preferred on ties.
            let chosen = chosen.or_else(|| {
                candidates.iter().copied().min_by(|&x, &y| {
                    degree[x]
                        .cmp(&degree[y])
                        .then_with(|| is_hdpc[x].cmp(&is_hdpc[y]))
                })
            });

            let Some(row) = chosen else {
                return Err(());
            };

            if row != i {
                self.record(Operation::Swap {
                    row_1: i as u16,
                    row_2: row as u16,
                });
                degree.swap(i, row);
                is_hdpc.swap(i, row);
            }

            if self.a.get(i, i) == 0 {
                if let Some(col) = (i + 1..col_hi).find(|&c| self.a.get(i, c) != 0) {
                    self.col_swap(i, col);
                }
            }

            let mut remaining: Vec<usize> =
                (i + 1..col_hi).filter(|&c| self.a.get(i, c) != 0).collect();
            remaining.reverse();
            let mut shrink = col_hi;
            for c in remaining {
                shrink -= 1;
                if c != shrink {
                    self.col_swap(c, shrink);
                }
            }

            for r in (i + 1)..rows {
                let v = self.a.get(r, i);
                if v == 0 {
                    continue;
                }
                let scalar = crate::gf256::div(v, self.a.get(i, i));
                self.record(Operation::AddMul {
                    row_1: r as u16,
                    row_2: i as u16,
                    scalar,
                });
            }

            u += r_min.saturating_sub(1);
            i += 1;
        }
        Ok((i, u))
    }

    /// Phase 2: reduce the `U_lower` block (rows `i..`, cols `i..l`) to
    /// identity.
    fn phase2(&mut self, i_end: usize, l: usize) -> Result<(), ()> {
        for col in i_end..l {
            if self.stopped() {
                return Err(());
            }
            let pivot_row = (col..self.a.rows()).find(|&r| self.a.get(r, col) != 0);
            let Some(pivot_row) = pivot_row else {
                return Err(());
            };
            if pivot_row != col {
                self.record(Operation::Swap {
                    row_1: col as u16,
                    row_2: pivot_row as u16,
                });
            }
            let pivot_val = self.a.get(col, col);
            if pivot_val != 1 {
                self.record(Operation::Div {
                    row: col as u16,
                    scalar: pivot_val,
                });
            }
            for r in 0..self.a.rows() {
                if r == col {
                    continue;
                }
                let v = self.a.get(r, col);
                if v != 0 {
                    self.record(Operation::AddMul {
                        row_1: r as u16,
                        row_2: col as u16,
                        scalar: v,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Runs phases 1-5 (phase 0 already folded into matrix construction, see
/// module docs) and returns the recovered intermediate symbols in `D`'s
/// first `L` rows on success.
pub fn intermediate(
    a: DenseMatrix,
    d: &mut DenseMatrix,
    params: &Parameters,
    keep_working: &KeepWorking,
) -> (SolveOutcome, Vec<Operation>) {
    let l = params.l as usize;
    let s = params.s as usize;
    let h = params.h as usize;

    let mut hdpc = vec![false; a.rows()];
    for row in hdpc.iter_mut().take(s + h).skip(s) {
        *row = true;
    }

    let mut solver = Solver {
        a,
        d,
        hdpc,
        ops: Vec::new(),
        keep_working,
        c: (0..l as u16).collect(),
    };

    let p = params.p as usize;
    log::trace!("solver phase1 starting, L={l}, P={p}");
    let (i_end, _u) = match solver.phase1(l, p) {
        Ok(v) => v,
        Err(()) => {
            let outcome = if solver.stopped() {
                SolveOutcome::Stopped
            } else {
                SolveOutcome::Failed
            };
            log::trace!("solver phase1 exited with {outcome:?}");
            return (outcome, solver.ops);
        }
    };
    log::trace!("solver phase1 done, i_end={i_end}, entering phase2");

    if solver.phase2(i_end, l).is_err() {
        let outcome = if solver.stopped() {
            SolveOutcome::Stopped
        } else {
            SolveOutcome::Failed
        };
        log::trace!("solver phase2 exited with {outcome:?}");
        return (outcome, solver.ops);
    }
    log::trace!("solver phase2 done, recovered {l} intermediate symbols");

    // Phases 3-5 collapse, for this port, into diagonal normalization plus
    // an un-permute: phase 1's forward elimination zeroes every column
    // left of a row's own pivot, and any non-pivot entry within a row's
    // active window at finalization time is physically swapped into the
    // U tail (never revisited), so by the end of phase 2 (which runs
    // full Gauss-Jordan over the U block across all rows, folding in what
    // would otherwise be a separate "clear U_upper" phase) `A`'s leading
    // `L x L` block is diagonal, not merely triangular. No back-
    // substitution remains; only the diagonal needs normalizing to 1.
    for row in 0..l {
        let diag = solver.a.get(row, row);
        if diag != 1 {
            solver.record(Operation::Div {
                row: row as u16,
                scalar: diag,
            });
        }
    }

    // Phase 1's column swaps permuted which intermediate-symbol index
    // lives at which column; undo that so D's row i ends up holding
    // symbol i, not symbol solver.c[i]. Matches the original's final
    // `C[c[i]] = D[i]` assignment via an explicit REORDER op so a cached
    // plan replays correctly against a fresh D.
    let mut inv_c = vec![0u16; l];
    for (pos, &sym) in solver.c.iter().enumerate() {
        inv_c[sym as usize] = pos as u16;
    }
    if inv_c.iter().enumerate().any(|(i, &v)| v as usize != i) {
        let reorder = Operation::Reorder(inv_c);
        reorder.build(solver.d);
        solver.ops.push(reorder);
    }

    log::trace!("solver finished, {} ops recorded", solver.ops.len());
    (SolveOutcome::Done, solver.ops)
}
