//! The solver backend.
//!
//! Owns no expression state itself; all solving state lives in the
//! [`Session`]s it hands out. Satisfiability checks re-blast the session's
//! live constraint frames into a fresh SAT instance, which keeps the
//! push/pop discipline exact and makes a timeout an `Unknown` outcome
//! rather than a corrupted solver.

use crate::abstraction;
use crate::blast::{bits_value, BitBlaster};
use crate::config::SolverConfig;
use crate::lower::lower_expr;
use crate::model::SolverModel;
use crate::session::{Session, SessionState};
use crate::tactic::Pipeline;
use crate::term::{TermId, TermKind, TermManager};
use num_bigint::BigUint;
use num_traits::One;
use rustc_hash::{FxHashMap, FxHashSet};
use sigil_core::{
    Arg, Backend, BackendError, BackendResult, BitVec, Counters, Engine, Expr, OpKind, Result,
    SigilError, Value,
};
use sigil_sat::{Solver as SatSolver, SolverResult as SatResult};
use std::sync::Arc;
use tracing::{debug, trace};

/// The outcome of a model-producing check.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Whether the constraints are satisfiable.
    pub satisfiable: bool,
    /// Variable assignment, populated when satisfiable.
    pub assignment: FxHashMap<String, Value>,
    /// The native model, retained for repeated evaluation calls.
    pub native_model: Option<SolverModel>,
}

/// The SMT-style solver backend.
#[derive(Debug)]
pub struct SmtBackend {
    split_on: FxHashSet<OpKind>,
    config: SolverConfig,
    counters: Arc<Counters>,
}

impl SmtBackend {
    /// Create a backend with default configuration and fresh counters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(SolverConfig::new(), Arc::new(Counters::new()))
    }

    /// Create a backend with the given configuration and fresh counters.
    #[must_use]
    pub fn with_config(config: SolverConfig) -> Self {
        Self::with_parts(config, Arc::new(Counters::new()))
    }

    /// Create a backend sharing a counter service with its engine.
    #[must_use]
    pub fn with_parts(config: SolverConfig, counters: Arc<Counters>) -> Self {
        Self {
            split_on: [OpKind::And, OpKind::Or].into_iter().collect(),
            config,
            counters,
        }
    }

    /// Replace the split-boundary operator set used by abstraction. The
    /// same set must be used for any later `split` on abstracted trees.
    #[must_use]
    pub fn with_split_boundary(mut self, split_on: FxHashSet<OpKind>) -> Self {
        self.split_on = split_on;
        self
    }

    /// The split-boundary operator set.
    #[must_use]
    pub fn split_boundary(&self) -> &FxHashSet<OpKind> {
        &self.split_on
    }

    /// The shared counter service.
    #[must_use]
    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// A fresh solving session with the configured timeout.
    #[must_use]
    pub fn new_session(&self) -> Session {
        Session::new(self.config.timeout)
    }

    /// Blast the live frames and run one satisfiability check.
    fn solve_session(&self, session: &mut Session) -> Result<Option<SolverModel>> {
        let terms = session.live_terms();
        let mut sat = SatSolver::new();
        if let Some(t) = session.timeout() {
            sat.set_timeout(t);
        }
        let mut blaster = BitBlaster::new(session.term_manager(), &mut sat);
        for t in terms {
            blaster.assert_term(t)?;
        }
        let var_bits = blaster.variable_bits();
        drop(blaster);

        self.counters.record_solve();
        debug!(
            assertions = session.num_assertions(),
            "issuing a satisfiability check"
        );
        match sat.solve() {
            SatResult::Sat => {
                let mut model = SolverModel::empty();
                for (term, bits) in var_bits {
                    if let TermKind::Var { name, .. } = session.term_manager().kind(term) {
                        let name = session.term_manager().resolve_name(*name).to_owned();
                        model.insert(name, Value::BitVec(bits_value(sat.model(), &bits)));
                    }
                }
                Ok(Some(model))
            }
            SatResult::Unsat => Ok(None),
            SatResult::Unknown => Err(SigilError::Unknown("solver timeout".into())),
        }
    }

    /// Satisfiability of the session's constraints, with optional extra
    /// constraints scoped to this call.
    pub fn check(&self, session: &mut Session, extra: &[Expr]) -> Result<bool> {
        let scoped = !extra.is_empty();
        if scoped {
            session.push();
            if let Err(e) = session.add_all(extra) {
                let _ = session.pop();
                return Err(e);
            }
        }
        let outcome = self.solve_session(session);
        if scoped {
            let _ = session.pop();
        }
        let satisfiable = outcome?.is_some();
        session.set_state(if satisfiable {
            SessionState::CheckedSat
        } else {
            SessionState::CheckedUnsat
        });
        Ok(satisfiable)
    }

    /// Like [`SmtBackend::check`], but returns the satisfying assignment
    /// and retains the native model for later evaluation.
    pub fn results(&self, session: &mut Session, extra: &[Expr]) -> Result<SolveResult> {
        let scoped = !extra.is_empty();
        if scoped {
            session.push();
            if let Err(e) = session.add_all(extra) {
                let _ = session.pop();
                return Err(e);
            }
        }
        let outcome = self.solve_session(session);
        if scoped {
            let _ = session.pop();
        }
        match outcome? {
            Some(model) => {
                session.set_state(SessionState::CheckedSat);
                debug!("sat");
                Ok(SolveResult {
                    satisfiable: true,
                    assignment: model.assignment().clone(),
                    native_model: Some(model),
                })
            }
            None => {
                session.set_state(SessionState::CheckedUnsat);
                debug!("unsat");
                Ok(SolveResult {
                    satisfiable: false,
                    assignment: FxHashMap::default(),
                    native_model: None,
                })
            }
        }
    }

    /// Up to `n` distinct concrete values of `expr` consistent with the
    /// session's constraints. Fewer than `n` values are returned when the
    /// space is exhausted; zero values is the unsatisfiable-constraints
    /// signal.
    pub fn eval(
        &self,
        session: &mut Session,
        expr: &Expr,
        n: usize,
        extra: &[Expr],
    ) -> Result<Vec<Value>> {
        if n == 0 {
            return Err(SigilError::Operation("eval of zero values".into()));
        }
        let scoped = !extra.is_empty() || n != 1;
        if scoped {
            session.push();
        }
        let out = self.eval_inner(session, expr, n, extra);
        if scoped {
            let _ = session.pop();
        }
        out
    }

    fn eval_inner(
        &self,
        session: &mut Session,
        expr: &Expr,
        n: usize,
        extra: &[Expr],
    ) -> Result<Vec<Value>> {
        session.add_all(extra)?;
        let expr_term = lower_expr(session.term_manager_mut(), expr)?;
        let mut results: Vec<Value> = Vec::new();
        let mut model: Option<SolverModel> = None;
        for i in 0..n {
            if model.is_none() {
                match self.solve_session(session)? {
                    Some(m) => model = Some(m),
                    None => break,
                }
            } else {
                self.counters.record_cache_hit();
            }
            let Some(m) = model.as_ref() else { break };
            let value = m.eval_term(session.term_manager(), expr_term)?;
            results.push(value.clone());
            if i + 1 != n {
                // Force a different value next round.
                let vt = value_to_term(session.term_manager_mut(), &value)?;
                let ne = session.term_manager_mut().mk_ne(expr_term, vt)?;
                session.add_term(ne);
                model = None;
            }
        }
        if results.is_empty() {
            return Err(SigilError::Unsat);
        }
        trace!(count = results.len(), "eval enumerated values");
        Ok(results)
    }

    /// The smallest satisfying unsigned value of `expr`.
    pub fn min(&self, session: &mut Session, expr: &Expr, extra: &[Expr]) -> Result<BitVec> {
        self.optimize(session, expr, extra, true)
    }

    /// The largest satisfying unsigned value of `expr`.
    pub fn max(&self, session: &mut Session, expr: &Expr, extra: &[Expr]) -> Result<BitVec> {
        self.optimize(session, expr, extra, false)
    }

    fn optimize(
        &self,
        session: &mut Session,
        expr: &Expr,
        extra: &[Expr],
        minimize: bool,
    ) -> Result<BitVec> {
        let width = expr.size()?.ok_or_else(|| {
            SigilError::Type("optimization requires a bitvector expression".into())
        })?;
        let scoped = !extra.is_empty();
        if scoped {
            session.push();
        }
        let out = self.optimize_inner(session, expr, width, extra, minimize);
        if scoped {
            let _ = session.pop();
        }
        out
    }

    /// Binary search over `[0, 2^width - 1]`: `O(log range)` checks, each
    /// probing one half-open half of the interval in a frame that is
    /// discarded whichever way the check goes.
    fn optimize_inner(
        &self,
        session: &mut Session,
        expr: &Expr,
        width: u32,
        extra: &[Expr],
        minimize: bool,
    ) -> Result<BitVec> {
        session.add_all(extra)?;
        if self.solve_session(session)?.is_none() {
            return Err(SigilError::Unsat);
        }
        let expr_term = lower_expr(session.term_manager_mut(), expr)?;

        let mut lo = BigUint::default();
        let mut hi = BitVec::mask(width);
        while (&hi - &lo) > BigUint::one() {
            let mid = (&lo + &hi) >> 1u32;
            // The optimum stays inside [lo, hi] throughout.
            let satisfiable = if minimize {
                self.probe_range(session, expr_term, width, &lo, &mid)?
            } else {
                let above = &mid + BigUint::one();
                self.probe_range(session, expr_term, width, &above, &hi)?
            };
            trace!(%lo, %hi, %mid, satisfiable, "optimization probe");
            match (minimize, satisfiable) {
                (true, true) => hi = mid,
                (true, false) => lo = mid,
                (false, true) => lo = mid,
                (false, false) => hi = mid,
            }
        }
        if lo == hi {
            return Ok(BitVec::new(lo, width));
        }
        let (preferred, fallback) = if minimize { (lo, hi) } else { (hi, lo) };
        let tie = self.probe_eq(session, expr_term, width, &preferred)?;
        Ok(BitVec::new(if tie { preferred } else { fallback }, width))
    }

    fn probe_range(
        &self,
        session: &mut Session,
        term: TermId,
        width: u32,
        lo: &BigUint,
        hi: &BigUint,
    ) -> Result<bool> {
        session.push();
        let outcome = self.probe_range_inner(session, term, width, lo, hi);
        let _ = session.pop();
        outcome
    }

    fn probe_range_inner(
        &self,
        session: &mut Session,
        term: TermId,
        width: u32,
        lo: &BigUint,
        hi: &BigUint,
    ) -> Result<bool> {
        let tm = session.term_manager_mut();
        let lo_t = tm.mk_bv_const(BitVec::new(lo.clone(), width));
        let hi_t = tm.mk_bv_const(BitVec::new(hi.clone(), width));
        let above = tm.mk_ule(lo_t, term)?;
        let below = tm.mk_ule(term, hi_t)?;
        session.add_term(above);
        session.add_term(below);
        Ok(self.solve_session(session)?.is_some())
    }

    fn probe_eq(
        &self,
        session: &mut Session,
        term: TermId,
        width: u32,
        value: &BigUint,
    ) -> Result<bool> {
        session.push();
        let outcome = (|| {
            let tm = session.term_manager_mut();
            let v = tm.mk_bv_const(BitVec::new(value.clone(), width));
            let eq = tm.mk_eq(term, v)?;
            session.add_term(eq);
            self.solve_session(session).map(|m| m.is_some())
        })();
        let _ = session.pop();
        outcome
    }

    /// Reconstruct an operation tree from a native term of the given
    /// arena, using this backend's split-boundary set.
    pub fn abstract_term(
        &self,
        engine: &Engine,
        tm: &TermManager,
        term: TermId,
    ) -> Result<Expr> {
        abstraction::abstract_term(engine, tm, term, &self.split_on)
    }
}

impl Default for SmtBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn value_to_term(tm: &mut TermManager, value: &Value) -> Result<TermId> {
    match value {
        Value::BitVec(bv) => Ok(tm.mk_bv_const(bv.clone())),
        Value::Bool(b) => Ok(tm.mk_bool(*b)),
        Value::Uint(_) => Err(SigilError::Type(
            "bare integer has no term representation".into(),
        )),
    }
}

impl Backend for SmtBackend {
    fn name(&self) -> &'static str {
        "solver"
    }

    fn convert(&self, _arg: &Arg) -> BackendResult<Value> {
        Err(BackendError::Unsupported(
            "the solver backend produces no concrete values",
        ))
    }

    fn call(&self, _op: OpKind, _args: &[Value]) -> BackendResult<Value> {
        Err(BackendError::Unsupported(
            "the solver backend evaluates through sessions",
        ))
    }

    /// Simplify by lowering into a scratch arena, running the tactic
    /// pipeline, and abstracting the result back. A result that collapsed
    /// to a constant comes back concrete: empty variable set, not
    /// symbolic.
    fn simplify(&self, engine: &Engine, expr: &Expr) -> BackendResult<Expr> {
        let refused = |e: SigilError| match e {
            SigilError::Backend(b) => b,
            other => BackendError::UnexpectedType(other.to_string()),
        };
        let mut tm = TermManager::new();
        let term = lower_expr(&mut tm, expr).map_err(refused)?;
        let mut pipeline = Pipeline::standard();
        let simplified = pipeline.apply(&mut tm, term).map_err(refused)?;
        match tm.kind(simplified) {
            TermKind::BvConst(bv) => Ok(engine.wrap_value(Value::BitVec(bv.clone()))),
            TermKind::BoolConst(b) => Ok(engine.wrap_value(Value::Bool(*b))),
            _ => abstraction::abstract_term(engine, &tm, simplified, &self.split_on)
                .map_err(refused),
        }
    }
}
