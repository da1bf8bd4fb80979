//! Stateful solver sessions.
//!
//! A session owns a term arena and a stack of constraint frames. `push`
//! opens a nested frame and `pop` discards it as a unit, without touching
//! outer constraints. Nothing here is thread-safe by itself: operations on
//! one session mutate the shared constraint stack and must be serialized
//! by the owner (one session per worker, or an external mutex). Separate
//! sessions are fully independent.

use crate::lower::lower_expr;
use crate::term::{TermId, TermManager};
use sigil_core::{Expr, Result, SigilError};
use std::time::Duration;

/// Where a session stands in its solving lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No constraints added yet.
    Empty,
    /// Constraints added since the last check.
    Constrained,
    /// The last check found a model.
    CheckedSat,
    /// The last check proved unsatisfiability.
    CheckedUnsat,
}

/// An incremental solving session.
#[derive(Debug)]
pub struct Session {
    tm: TermManager,
    frames: Vec<Vec<TermId>>,
    timeout: Option<Duration>,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            tm: TermManager::new(),
            frames: vec![Vec::new()],
            timeout,
            state: SessionState::Empty,
        }
    }

    /// The session's lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// The per-check timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Change the per-check timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The session's term arena.
    #[must_use]
    pub fn term_manager(&self) -> &TermManager {
        &self.tm
    }

    /// Mutable access to the arena, for lowering additional terms into
    /// this session.
    pub fn term_manager_mut(&mut self) -> &mut TermManager {
        &mut self.tm
    }

    /// Add a boolean constraint to the current frame.
    pub fn add(&mut self, constraint: &Expr) -> Result<()> {
        let t = lower_expr(&mut self.tm, constraint)?;
        if !self.tm.sort(t).is_bool() {
            return Err(SigilError::Type("constraints must be boolean".into()));
        }
        self.add_term(t);
        Ok(())
    }

    /// Add several constraints to the current frame.
    pub fn add_all(&mut self, constraints: &[Expr]) -> Result<()> {
        for c in constraints {
            self.add(c)?;
        }
        Ok(())
    }

    pub(crate) fn add_term(&mut self, t: TermId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(t);
        }
        self.state = SessionState::Constrained;
    }

    /// Open a nested constraint frame.
    pub fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Discard the innermost frame and everything added in it.
    pub fn pop(&mut self) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(SigilError::Operation("pop with no pushed frame".into()));
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of nested frames currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Number of live constraints across all frames.
    #[must_use]
    pub fn num_assertions(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    /// All live constraint terms, outermost frame first.
    pub(crate) fn live_terms(&self) -> Vec<TermId> {
        self.frames.iter().flatten().copied().collect()
    }
}
