//! Sigil SAT - a small CNF satisfiability solver.
//!
//! Watched-literal unit propagation with chronological DPLL search. Every
//! `solve` call restarts the search from the accumulated clause set, so
//! clauses may be added freely between calls. An optional deadline makes
//! the solver return [`SolverResult::Unknown`] instead of running
//! indefinitely; timeouts are never conflated with unsatisfiability.
//!
//! # Examples
//!
//! ```
//! use sigil_sat::{Lit, Solver, SolverResult};
//!
//! let mut sat = Solver::new();
//! let a = sat.new_var();
//! let b = sat.new_var();
//! sat.add_clause([Lit::pos(a), Lit::pos(b)]);
//! sat.add_clause([Lit::neg(a)]);
//! assert_eq!(sat.solve(), SolverResult::Sat);
//! assert!(sat.value(b).is_true());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use smallvec::SmallVec;
use std::fmt;
use std::time::{Duration, Instant};

/// Clause storage; most encoder-produced clauses are short.
type Clause = SmallVec<[Lit; 8]>;

/// A boolean variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(u32);

impl Var {
    /// The variable's index into assignment slices.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A literal: a variable with a sign, packed into one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lit(u32);

impl Lit {
    /// The positive literal of `var`.
    #[must_use]
    pub const fn pos(var: Var) -> Self {
        Self(var.0 << 1)
    }

    /// The negative literal of `var`.
    #[must_use]
    pub const fn neg(var: Var) -> Self {
        Self((var.0 << 1) | 1)
    }

    /// The underlying variable.
    #[must_use]
    pub const fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    /// True if this literal is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        (self.0 & 1) == 0
    }

    /// The opposite literal of the same variable.
    #[must_use]
    pub const fn negate(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// The literal's index into watch lists.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positive() {
            write!(f, "{}", self.var().0)
        } else {
            write!(f, "-{}", self.var().0)
        }
    }
}

/// A three-valued assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LBool {
    /// Assigned true.
    True,
    /// Assigned false.
    False,
    /// Unassigned.
    Undef,
}

impl LBool {
    /// True iff assigned true.
    #[must_use]
    pub fn is_true(self) -> bool {
        self == LBool::True
    }

    /// True iff assigned false.
    #[must_use]
    pub fn is_false(self) -> bool {
        self == LBool::False
    }

    /// True iff unassigned.
    #[must_use]
    pub fn is_undef(self) -> bool {
        self == LBool::Undef
    }
}

/// The outcome of a `solve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResult {
    /// A satisfying assignment was found.
    Sat,
    /// The clause set is unsatisfiable.
    Unsat,
    /// The search was cut short (deadline reached).
    Unknown,
}

/// Search statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    /// Number of decisions made.
    pub decisions: u64,
    /// Number of literals propagated.
    pub propagations: u64,
    /// Number of conflicts hit.
    pub conflicts: u64,
}

#[derive(Debug, Clone, Copy)]
struct Decision {
    trail_pos: usize,
    flipped: bool,
}

/// The SAT solver.
#[derive(Debug, Default)]
pub struct Solver {
    num_vars: u32,
    clauses: Vec<Clause>,
    /// Clause indices per watched literal, keyed by `Lit::index`.
    watches: Vec<Vec<u32>>,
    assign: Vec<LBool>,
    trail: Vec<Lit>,
    prop_head: usize,
    decisions: Vec<Decision>,
    pending_units: Vec<Lit>,
    has_empty_clause: bool,
    deadline: Option<Instant>,
    stats: SolverStats,
}

impl Solver {
    /// Create an empty solver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable.
    pub fn new_var(&mut self) -> Var {
        let v = Var(self.num_vars);
        self.num_vars += 1;
        self.assign.push(LBool::Undef);
        self.watches.push(Vec::new());
        self.watches.push(Vec::new());
        v
    }

    /// Number of allocated variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.num_vars as usize
    }

    /// Number of stored clauses (units and the empty clause excluded).
    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Abort any `solve` call that runs past `deadline`.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Abort any `solve` call that runs longer than `timeout` from now.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.deadline = Instant::now().checked_add(timeout);
    }

    /// Search statistics so far.
    #[must_use]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Add a clause. Tautologies are dropped, duplicate literals are
    /// merged, the empty clause marks the instance unsatisfiable.
    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) {
        let mut lits: Clause = lits.into_iter().collect();
        lits.sort_unstable();
        lits.dedup();
        // After dedup, two adjacent literals of one variable must be
        // complementary: the clause is a tautology.
        if lits.windows(2).any(|w| w[0].var() == w[1].var()) {
            return;
        }
        match lits.len() {
            0 => self.has_empty_clause = true,
            1 => self.pending_units.push(lits[0]),
            _ => {
                let ci = u32::try_from(self.clauses.len()).unwrap_or(u32::MAX);
                self.watches[lits[0].index()].push(ci);
                self.watches[lits[1].index()].push(ci);
                self.clauses.push(lits);
            }
        }
    }

    /// The current assignment, indexed by [`Var::index`]. Meaningful after
    /// a `Sat` result; every variable is assigned.
    #[must_use]
    pub fn model(&self) -> &[LBool] {
        &self.assign
    }

    /// The assignment of one variable.
    #[must_use]
    pub fn value(&self, var: Var) -> LBool {
        self.assign[var.index()]
    }

    fn lit_value(&self, lit: Lit) -> LBool {
        match self.assign[lit.var().index()] {
            LBool::Undef => LBool::Undef,
            LBool::True => {
                if lit.is_positive() {
                    LBool::True
                } else {
                    LBool::False
                }
            }
            LBool::False => {
                if lit.is_positive() {
                    LBool::False
                } else {
                    LBool::True
                }
            }
        }
    }

    /// Assign a literal true. Returns false on an immediate conflict.
    fn enqueue(&mut self, lit: Lit) -> bool {
        match self.lit_value(lit) {
            LBool::True => true,
            LBool::False => false,
            LBool::Undef => {
                self.assign[lit.var().index()] = if lit.is_positive() {
                    LBool::True
                } else {
                    LBool::False
                };
                self.trail.push(lit);
                true
            }
        }
    }

    fn restart(&mut self) {
        self.assign.fill(LBool::Undef);
        self.trail.clear();
        self.decisions.clear();
        self.prop_head = 0;
    }

    /// Propagate pending assignments. Returns a conflicting clause index,
    /// or `None` when a fixpoint is reached.
    fn propagate(&mut self) -> Option<u32> {
        while self.prop_head < self.trail.len() {
            let p = self.trail[self.prop_head];
            self.prop_head += 1;
            self.stats.propagations += 1;

            let false_lit = p.negate();
            let key = false_lit.index();
            let watching = std::mem::take(&mut self.watches[key]);
            let mut kept: Vec<u32> = Vec::with_capacity(watching.len());
            let mut conflict: Option<u32> = None;

            for (wi, &ci) in watching.iter().enumerate() {
                if conflict.is_some() {
                    kept.extend_from_slice(&watching[wi..]);
                    break;
                }
                let c = ci as usize;
                if self.clauses[c][0] == false_lit {
                    self.clauses[c].swap(0, 1);
                }
                let first = self.clauses[c][0];
                if self.lit_value(first) == LBool::True {
                    kept.push(ci);
                    continue;
                }
                // Look for a non-false literal to watch instead.
                let mut replacement = None;
                for k in 2..self.clauses[c].len() {
                    if self.lit_value(self.clauses[c][k]) != LBool::False {
                        replacement = Some(k);
                        break;
                    }
                }
                if let Some(k) = replacement {
                    self.clauses[c].swap(1, k);
                    let w = self.clauses[c][1];
                    self.watches[w.index()].push(ci);
                    continue;
                }
                // Unit under the current assignment, or conflicting.
                kept.push(ci);
                match self.lit_value(first) {
                    LBool::Undef => {
                        self.enqueue(first);
                    }
                    LBool::False => {
                        self.stats.conflicts += 1;
                        conflict = Some(ci);
                    }
                    LBool::True => {}
                }
            }

            self.watches[key] = kept;
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    /// Undo to the most recent decision with an untried polarity and flip
    /// it. Returns false when the search space is exhausted.
    fn backtrack(&mut self) -> bool {
        while let Some(d) = self.decisions.pop() {
            let decided = self.trail[d.trail_pos];
            while self.trail.len() > d.trail_pos {
                if let Some(l) = self.trail.pop() {
                    self.assign[l.var().index()] = LBool::Undef;
                }
            }
            self.prop_head = self.trail.len();
            if !d.flipped {
                self.decisions.push(Decision {
                    trail_pos: d.trail_pos,
                    flipped: true,
                });
                let _ok = self.enqueue(decided.negate());
                debug_assert!(_ok, "flipping an unassigned variable cannot conflict");
                return true;
            }
        }
        false
    }

    fn next_unassigned(&self) -> Option<Var> {
        self.assign
            .iter()
            .position(|v| v.is_undef())
            .map(|i| Var(u32::try_from(i).unwrap_or(0)))
    }

    /// Run the search. Restarts from scratch over the accumulated clause
    /// set, so interleaving `add_clause` and `solve` is fine.
    pub fn solve(&mut self) -> SolverResult {
        self.restart();
        if self.has_empty_clause {
            return SolverResult::Unsat;
        }
        let units = self.pending_units.clone();
        for u in units {
            if !self.enqueue(u) {
                return SolverResult::Unsat;
            }
        }
        loop {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return SolverResult::Unknown;
                }
            }
            if self.propagate().is_some() {
                if !self.backtrack() {
                    return SolverResult::Unsat;
                }
            } else {
                match self.next_unassigned() {
                    Some(v) => {
                        self.stats.decisions += 1;
                        self.decisions.push(Decision {
                            trail_pos: self.trail.len(),
                            flipped: false,
                        });
                        let _ok = self.enqueue(Lit::neg(v));
                        debug_assert!(_ok, "deciding an unassigned variable cannot conflict");
                    }
                    None => return SolverResult::Sat,
                }
            }
        }
    }
}
