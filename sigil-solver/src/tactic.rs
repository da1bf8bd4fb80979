//! Tactic-based simplification of native terms.
//!
//! A tactic transforms a term into an equivalent, simpler term. The solver
//! backend runs a [`Pipeline`] of tactics; when the result collapses to a
//! constant, the backend reports the expression concrete. Caches are keyed
//! by term id and therefore per-arena: use a fresh pipeline per arena.
//!
//! ## Tactics
//!
//! - [`RewriteTactic`]: bottom-up constant folding plus algebraic
//!   identities (x+0, x&x, double negation, degenerate conditionals)
//! - [`PropagateValuesTactic`]: substitutes `var = const` equalities into
//!   the sibling conjuncts of a conjunction

use crate::term::{TermId, TermKind, TermManager};
use rustc_hash::{FxHashMap, FxHashSet};
use sigil_core::{Backend, BitVec, ConcreteBackend, Result, Value};
use std::fmt;
use tracing::trace;

/// A term-to-term simplification pass.
pub trait Tactic: fmt::Debug {
    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Transform a term into an equivalent term.
    fn apply(&mut self, tm: &mut TermManager, term: TermId) -> Result<TermId>;
}

/// Configuration for [`RewriteTactic`].
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    /// Fold operations over constant operands.
    pub fold_constants: bool,
    /// Apply algebraic identities.
    pub algebraic: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            fold_constants: true,
            algebraic: true,
        }
    }
}

/// Statistics for [`RewriteTactic`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteStats {
    /// Terms that changed.
    pub rewritten: u64,
    /// Terms left as they were.
    pub unchanged: u64,
}

/// Bottom-up rewriting with a per-arena cache.
#[derive(Debug, Default)]
pub struct RewriteTactic {
    cache: FxHashMap<TermId, TermId>,
    config: RewriteConfig,
    stats: RewriteStats,
}

impl RewriteTactic {
    /// Create with the given configuration.
    #[must_use]
    pub fn new(config: RewriteConfig) -> Self {
        Self {
            cache: FxHashMap::default(),
            config,
            stats: RewriteStats::default(),
        }
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> RewriteStats {
        self.stats
    }

    fn rewrite(&mut self, tm: &mut TermManager, t: TermId) -> Result<TermId> {
        if let Some(&r) = self.cache.get(&t) {
            return Ok(r);
        }
        let kind = tm.kind(t).clone();
        let mut new_children = Vec::new();
        for c in kind.children() {
            new_children.push(self.rewrite(tm, c)?);
        }
        let rebuilt = tm.rebuild(&kind, &new_children)?;
        let mut result = rebuilt;
        if self.config.fold_constants {
            if let Some(folded) = const_fold(tm, result)? {
                result = folded;
            }
        }
        if self.config.algebraic && result == rebuilt {
            result = algebraic(tm, result)?;
        }
        if result == t {
            self.stats.unchanged += 1;
        } else {
            self.stats.rewritten += 1;
        }
        self.cache.insert(t, result);
        Ok(result)
    }
}

impl Tactic for RewriteTactic {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    fn apply(&mut self, tm: &mut TermManager, term: TermId) -> Result<TermId> {
        self.rewrite(tm, term)
    }
}

fn as_bv_const(tm: &TermManager, t: TermId) -> Option<BitVec> {
    match tm.kind(t) {
        TermKind::BvConst(bv) => Some(bv.clone()),
        _ => None,
    }
}

/// Fold an operation whose operands are all constants, through the
/// concrete evaluator.
fn const_fold(tm: &mut TermManager, t: TermId) -> Result<Option<TermId>> {
    let kind = tm.kind(t).clone();
    let Some(op) = kind.canonical_op() else {
        return Ok(None);
    };
    let mut args: Vec<Value> = Vec::new();
    match &kind {
        TermKind::Extract { hi, lo, .. } => {
            args.push(Value::Uint(u64::from(*hi)));
            args.push(Value::Uint(u64::from(*lo)));
        }
        TermKind::SignExt { amount, .. } | TermKind::ZeroExt { amount, .. } => {
            args.push(Value::Uint(u64::from(*amount)));
        }
        _ => {}
    }
    for c in kind.children() {
        match tm.kind(c) {
            TermKind::BvConst(bv) => args.push(Value::BitVec(bv.clone())),
            TermKind::BoolConst(b) => args.push(Value::Bool(*b)),
            _ => return Ok(None),
        }
    }
    match ConcreteBackend::new().call(op, &args) {
        Ok(Value::BitVec(bv)) => Ok(Some(tm.mk_bv_const(bv))),
        Ok(Value::Bool(b)) => Ok(Some(tm.mk_bool(b))),
        Ok(Value::Uint(_)) | Err(_) => Ok(None),
    }
}

#[allow(clippy::too_many_lines)]
fn algebraic(tm: &mut TermManager, t: TermId) -> Result<TermId> {
    use TermKind::*;
    let kind = tm.kind(t).clone();
    let out = match &kind {
        And(xs) => {
            let mut seen = FxHashSet::default();
            let mut kept = Vec::new();
            let mut short_circuit = false;
            for &x in xs {
                match tm.kind(x) {
                    BoolConst(true) => continue,
                    BoolConst(false) => {
                        short_circuit = true;
                        break;
                    }
                    _ => {}
                }
                if seen.insert(x) {
                    kept.push(x);
                }
            }
            if short_circuit {
                tm.mk_bool(false)
            } else if kept.iter().any(|&x| {
                matches!(tm.kind(x), Not(y) if kept.contains(y))
            }) {
                tm.mk_bool(false)
            } else {
                tm.mk_and(kept)?
            }
        }
        Or(xs) => {
            let mut seen = FxHashSet::default();
            let mut kept = Vec::new();
            let mut short_circuit = false;
            for &x in xs {
                match tm.kind(x) {
                    BoolConst(false) => continue,
                    BoolConst(true) => {
                        short_circuit = true;
                        break;
                    }
                    _ => {}
                }
                if seen.insert(x) {
                    kept.push(x);
                }
            }
            if short_circuit {
                tm.mk_bool(true)
            } else if kept.iter().any(|&x| {
                matches!(tm.kind(x), Not(y) if kept.contains(y))
            }) {
                tm.mk_bool(true)
            } else {
                tm.mk_or(kept)?
            }
        }
        Not(x) => match tm.kind(*x) {
            Not(y) => *y,
            _ => t,
        },
        BvNot(x) => match tm.kind(*x) {
            BvNot(y) => *y,
            _ => t,
        },
        Add(a, b) => {
            let w = tm.width(t).unwrap_or(0);
            if as_bv_const(tm, *b) == Some(BitVec::zero(w)) {
                *a
            } else if as_bv_const(tm, *a) == Some(BitVec::zero(w)) {
                *b
            } else {
                t
            }
        }
        Sub(a, b) => {
            let w = tm.width(t).unwrap_or(0);
            if as_bv_const(tm, *b) == Some(BitVec::zero(w)) {
                *a
            } else if a == b {
                tm.mk_bv_const(BitVec::zero(w))
            } else {
                t
            }
        }
        Mul(a, b) => {
            let w = tm.width(t).unwrap_or(0);
            let (zero, one) = (BitVec::zero(w), BitVec::from_u64(1, w));
            if as_bv_const(tm, *a) == Some(zero.clone())
                || as_bv_const(tm, *b) == Some(zero.clone())
            {
                tm.mk_bv_const(zero)
            } else if as_bv_const(tm, *b) == Some(one.clone()) {
                *a
            } else if as_bv_const(tm, *a) == Some(one) {
                *b
            } else {
                t
            }
        }
        BvAnd(a, b) => {
            let w = tm.width(t).unwrap_or(0);
            let (zero, ones) = (BitVec::zero(w), BitVec::ones(w));
            if a == b {
                *a
            } else if as_bv_const(tm, *a) == Some(zero.clone())
                || as_bv_const(tm, *b) == Some(zero.clone())
            {
                tm.mk_bv_const(zero)
            } else if as_bv_const(tm, *b) == Some(ones.clone()) {
                *a
            } else if as_bv_const(tm, *a) == Some(ones) {
                *b
            } else {
                t
            }
        }
        BvOr(a, b) => {
            let w = tm.width(t).unwrap_or(0);
            let zero = BitVec::zero(w);
            if a == b {
                *a
            } else if as_bv_const(tm, *b) == Some(zero.clone()) {
                *a
            } else if as_bv_const(tm, *a) == Some(zero) {
                *b
            } else {
                t
            }
        }
        BvXor(a, b) => {
            let w = tm.width(t).unwrap_or(0);
            let zero = BitVec::zero(w);
            if a == b {
                tm.mk_bv_const(zero)
            } else if as_bv_const(tm, *b) == Some(zero.clone()) {
                *a
            } else if as_bv_const(tm, *a) == Some(zero) {
                *b
            } else {
                t
            }
        }
        Eq(a, b) => {
            if a == b {
                tm.mk_bool(true)
            } else {
                t
            }
        }
        Ne(a, b) | Ult(a, b) | Slt(a, b) => {
            if a == b {
                tm.mk_bool(false)
            } else {
                t
            }
        }
        Ule(a, b) | Sle(a, b) => {
            if a == b {
                tm.mk_bool(true)
            } else {
                t
            }
        }
        Ite(c, x, y) => {
            if x == y {
                *x
            } else {
                match tm.kind(*c) {
                    BoolConst(true) => *x,
                    BoolConst(false) => *y,
                    _ => t,
                }
            }
        }
        Extract { hi, lo, arg } => {
            if *lo == 0 && tm.width(*arg) == Some(*hi + 1) {
                *arg
            } else {
                t
            }
        }
        _ => t,
    };
    Ok(out)
}

/// Statistics for [`PropagateValuesTactic`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateStats {
    /// Conjuncts changed by substitution.
    pub substitutions: u64,
}

/// Substitutes `var = const` facts into sibling conjuncts.
#[derive(Debug, Default)]
pub struct PropagateValuesTactic {
    stats: PropagateStats,
}

impl PropagateValuesTactic {
    /// Create the tactic.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> PropagateStats {
        self.stats
    }
}

impl Tactic for PropagateValuesTactic {
    fn name(&self) -> &'static str {
        "propagate-values"
    }

    fn apply(&mut self, tm: &mut TermManager, term: TermId) -> Result<TermId> {
        let TermKind::And(children) = tm.kind(term).clone() else {
            return Ok(term);
        };
        let mut env: FxHashMap<TermId, TermId> = FxHashMap::default();
        for &c in &children {
            if let TermKind::Eq(a, b) = tm.kind(c) {
                match (tm.kind(*a), tm.kind(*b)) {
                    (TermKind::Var { .. }, TermKind::BvConst(_)) => {
                        env.insert(*a, *b);
                    }
                    (TermKind::BvConst(_), TermKind::Var { .. }) => {
                        env.insert(*b, *a);
                    }
                    _ => {}
                }
            }
        }
        if env.is_empty() {
            return Ok(term);
        }
        let mut out = Vec::with_capacity(children.len());
        for &c in &children {
            // The defining equalities themselves stay; substituting into
            // them would erase the constraint.
            if let TermKind::Eq(a, b) = tm.kind(c) {
                if env.get(a) == Some(b) || env.get(b) == Some(a) {
                    out.push(c);
                    continue;
                }
            }
            let mut memo = FxHashMap::default();
            let s = subst(tm, c, &env, &mut memo)?;
            if s != c {
                self.stats.substitutions += 1;
            }
            out.push(s);
        }
        tm.mk_and(out)
    }
}

fn subst(
    tm: &mut TermManager,
    t: TermId,
    env: &FxHashMap<TermId, TermId>,
    memo: &mut FxHashMap<TermId, TermId>,
) -> Result<TermId> {
    if let Some(&r) = memo.get(&t) {
        return Ok(r);
    }
    if let Some(&r) = env.get(&t) {
        memo.insert(t, r);
        return Ok(r);
    }
    let kind = tm.kind(t).clone();
    let children = kind.children();
    if children.is_empty() {
        return Ok(t);
    }
    let mut new_children = Vec::with_capacity(children.len());
    for c in children {
        new_children.push(subst(tm, c, env, memo)?);
    }
    let r = tm.rebuild(&kind, &new_children)?;
    memo.insert(t, r);
    Ok(r)
}

/// An ordered sequence of tactics applied in turn.
#[derive(Debug)]
pub struct Pipeline {
    tactics: Vec<Box<dyn Tactic>>,
}

impl Pipeline {
    /// Create from an explicit tactic list.
    #[must_use]
    pub fn new(tactics: Vec<Box<dyn Tactic>>) -> Self {
        Self { tactics }
    }

    /// The standard simplification pipeline: rewrite, propagate values,
    /// rewrite again to fold what propagation exposed.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(RewriteTactic::default()),
            Box::new(PropagateValuesTactic::new()),
            Box::new(RewriteTactic::default()),
        ])
    }

    /// Apply every tactic in order.
    pub fn apply(&mut self, tm: &mut TermManager, term: TermId) -> Result<TermId> {
        let mut t = term;
        for tactic in &mut self.tactics {
            let next = tactic.apply(tm, t)?;
            if next != t {
                trace!(tactic = tactic.name(), "tactic rewrote the goal");
            }
            t = next;
        }
        Ok(t)
    }
}
