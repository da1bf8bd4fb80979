//! The expression wrapper.
//!
//! An [`Expr`] wraps either an unresolved operation tree or a
//! backend-resolved concrete value, together with the set of free variable
//! names and a symbolic flag. The flag and the variable set are two views
//! of one fact: an expression is symbolic exactly when its variable set is
//! non-empty.
//!
//! Expressions have value semantics; operations return new expressions.
//! The one internal exception is the deferred-operation queue: an
//! expression created by [`Expr::deferred`] holds its base model plus a
//! queue of unary operations, and the first model read folds the queue
//! through the engine, replacing the state with the resolved result exactly
//! once. The state lives behind the only interior-mutable field of the
//! type, so the transition is invisible to callers.

use crate::ast::{Arg, Node};
use crate::engine::Engine;
use crate::error::{Result, SigilError};
use crate::ops::OpKind;
use crate::store::Identity;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::{FxHashSet, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// The underlying model of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    /// An unresolved operation tree.
    Tree(Arc<Node>),
    /// A backend-resolved concrete value.
    Value(Value),
}

impl Model {
    /// The concrete value, if resolved.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Model::Value(v) => Some(v),
            Model::Tree(_) => None,
        }
    }

    /// The operation tree, if unresolved.
    #[must_use]
    pub fn as_tree(&self) -> Option<&Arc<Node>> {
        match self {
            Model::Tree(n) => Some(n),
            Model::Value(_) => None,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Tree(n) => n.fmt(f),
            Model::Value(v) => v.fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub(crate) model: Model,
    pub(crate) variables: Arc<FxHashSet<String>>,
    pub(crate) symbolic: bool,
}

#[derive(Debug)]
enum ExprState {
    Resolved(Resolved),
    Pending { base: Resolved, queued: Vec<OpKind> },
}

struct ExprInner {
    engine: Engine,
    state: RwLock<ExprState>,
    identity: OnceLock<Identity>,
    simplified: AtomicBool,
    simplified_cache: OnceLock<Expr>,
}

/// A wrapped expression: the public value type of the engine.
///
/// Cloning is cheap (a reference-count bump) and expressions are safe to
/// share across threads.
#[derive(Clone)]
pub struct Expr {
    inner: Arc<ExprInner>,
}

impl Expr {
    pub(crate) fn new_resolved(engine: Engine, model: Model, variables: FxHashSet<String>) -> Self {
        let symbolic = !variables.is_empty();
        Self::from_parts(
            engine,
            ExprState::Resolved(Resolved {
                model,
                variables: Arc::new(variables),
                symbolic,
            }),
        )
    }

    fn from_parts(engine: Engine, state: ExprState) -> Self {
        Self {
            inner: Arc::new(ExprInner {
                engine,
                state: RwLock::new(state),
                identity: OnceLock::new(),
                simplified: AtomicBool::new(false),
                simplified_cache: OnceLock::new(),
            }),
        }
    }

    /// The engine this expression belongs to.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub(crate) fn arg(&self) -> Arg {
        Arg::Expr(self.clone())
    }

    /// Flush the deferred-operation queue, if any. Runs at most once per
    /// queue; afterwards the state is `Resolved` and stays that way.
    fn flush(&self) -> Result<()> {
        {
            let st = self.inner.state.read();
            if matches!(&*st, ExprState::Resolved(_)) {
                return Ok(());
            }
        }
        let mut st = self.inner.state.write();
        let (base, queued) = match &mut *st {
            ExprState::Resolved(_) => return Ok(()),
            ExprState::Pending { base, queued } => (base.clone(), std::mem::take(queued)),
        };
        let mut cur = Self::from_parts(
            self.inner.engine.clone(),
            ExprState::Resolved(base.clone()),
        );
        for (i, op) in queued.iter().enumerate() {
            match self.inner.engine.op(*op, vec![Arg::Expr(cur.clone())]) {
                Ok(next) => cur = next,
                Err(e) => {
                    // Leave the unapplied tail in place so the queue is
                    // not silently dropped on error.
                    *st = ExprState::Pending {
                        base,
                        queued: queued[i..].to_vec(),
                    };
                    return Err(e);
                }
            }
        }
        let resolved = cur.resolved_snapshot()?;
        *st = ExprState::Resolved(resolved);
        Ok(())
    }

    fn resolved_snapshot(&self) -> Result<Resolved> {
        self.flush()?;
        let st = self.inner.state.read();
        match &*st {
            ExprState::Resolved(r) => Ok(r.clone()),
            ExprState::Pending { .. } => Err(SigilError::Expression(
                "deferred operations survived a flush".into(),
            )),
        }
    }

    /// The resolved model, flushing any deferred operations first.
    pub fn model(&self) -> Result<Model> {
        Ok(self.resolved_snapshot()?.model)
    }

    /// The set of free variable names.
    pub fn variables(&self) -> Result<Arc<FxHashSet<String>>> {
        Ok(self.resolved_snapshot()?.variables)
    }

    /// True iff the expression depends on at least one free variable.
    /// Always equal to `!self.variables()?.is_empty()`.
    pub fn is_symbolic(&self) -> Result<bool> {
        Ok(self.resolved_snapshot()?.symbolic)
    }

    /// True iff the expression is fully concrete.
    pub fn is_concrete(&self) -> Result<bool> {
        Ok(!self.is_symbolic()?)
    }

    /// The concrete value, if the model is resolved to one.
    pub fn concrete_value(&self) -> Result<Option<Value>> {
        Ok(self.model()?.as_value().cloned())
    }

    /// The bit-width, or `None` for boolean-valued expressions.
    pub fn size(&self) -> Result<Option<u32>> {
        match self.model()? {
            Model::Tree(n) => n.size(self.inner.engine.model_backends()),
            Model::Value(v) => Ok(v.width()),
        }
    }

    /// Number of deferred operations still queued.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        match &*self.inner.state.read() {
            ExprState::Resolved(_) => 0,
            ExprState::Pending { queued, .. } => queued.len(),
        }
    }

    /// A copy of this expression with a unary operation queued for lazy
    /// application. The queue is folded into the model on first read.
    #[must_use]
    pub fn deferred(&self, op: OpKind) -> Expr {
        let st = self.inner.state.read();
        let (base, mut queued) = match &*st {
            ExprState::Resolved(r) => (r.clone(), Vec::new()),
            ExprState::Pending { base, queued } => (base.clone(), queued.clone()),
        };
        queued.push(op);
        Self::from_parts(
            self.inner.engine.clone(),
            ExprState::Pending { base, queued },
        )
    }

    // Operation sugar. Every method builds through the engine's single
    // construction path and returns a fresh expression.

    fn binop(&self, op: OpKind, other: &Expr) -> Result<Expr> {
        self.inner.engine.op(op, vec![self.arg(), other.arg()])
    }

    fn unop(&self, op: OpKind) -> Result<Expr> {
        self.inner.engine.op(op, vec![self.arg()])
    }

    /// Wrapping addition.
    pub fn add(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Add, other)
    }

    /// Wrapping subtraction.
    pub fn sub(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Sub, other)
    }

    /// Wrapping multiplication.
    pub fn mul(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Mul, other)
    }

    /// Signed division.
    pub fn sdiv(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::SDiv, other)
    }

    /// Signed remainder with the divisor's sign.
    pub fn smod(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::SMod, other)
    }

    /// Two's-complement negation.
    pub fn neg(&self) -> Result<Expr> {
        self.unop(OpKind::Neg)
    }

    /// Bitwise and.
    pub fn bvand(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::BvAnd, other)
    }

    /// Bitwise or.
    pub fn bvor(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::BvOr, other)
    }

    /// Bitwise xor.
    pub fn bvxor(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::BvXor, other)
    }

    /// Bitwise complement.
    pub fn bvnot(&self) -> Result<Expr> {
        self.unop(OpKind::BvNot)
    }

    /// Logical shift left by an expression amount.
    pub fn shl(&self, amount: &Expr) -> Result<Expr> {
        self.binop(OpKind::Shl, amount)
    }

    /// Logical shift right by an expression amount.
    pub fn lshr(&self, amount: &Expr) -> Result<Expr> {
        self.binop(OpKind::LShR, amount)
    }

    /// Arithmetic shift right by an expression amount.
    pub fn ashr(&self, amount: &Expr) -> Result<Expr> {
        self.binop(OpKind::AShR, amount)
    }

    /// Rotate left by an expression amount (modulo the width).
    pub fn rotate_left(&self, amount: &Expr) -> Result<Expr> {
        self.binop(OpKind::RotateLeft, amount)
    }

    /// Rotate right by an expression amount (modulo the width).
    pub fn rotate_right(&self, amount: &Expr) -> Result<Expr> {
        self.binop(OpKind::RotateRight, amount)
    }

    /// Byte-order reversal, applied eagerly.
    pub fn reverse(&self) -> Result<Expr> {
        self.unop(OpKind::Reverse)
    }

    /// Byte-order reversal, queued for lazy application.
    #[must_use]
    pub fn reversed_lazy(&self) -> Expr {
        self.deferred(OpKind::Reverse)
    }

    /// Concatenation; `self` supplies the high-order bits.
    pub fn concat(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Concat, other)
    }

    /// Extract bits `hi..=lo` (inclusive, LSB is bit 0).
    pub fn extract(&self, hi: u32, lo: u32) -> Result<Expr> {
        self.inner.engine.op(
            OpKind::Extract,
            vec![Arg::Uint(u64::from(hi)), Arg::Uint(u64::from(lo)), self.arg()],
        )
    }

    /// The single bit at position `i`, as a 1-bit expression.
    pub fn bit(&self, i: u32) -> Result<Expr> {
        self.extract(i, i)
    }

    /// Widen by `amount` zero bits.
    pub fn zero_extend(&self, amount: u32) -> Result<Expr> {
        self.inner
            .engine
            .op(OpKind::ZeroExt, vec![Arg::Uint(u64::from(amount)), self.arg()])
    }

    /// Widen by `amount` copies of the sign bit.
    pub fn sign_extend(&self, amount: u32) -> Result<Expr> {
        self.inner
            .engine
            .op(OpKind::SignExt, vec![Arg::Uint(u64::from(amount)), self.arg()])
    }

    /// Equality.
    pub fn eq_(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Eq, other)
    }

    /// Disequality.
    pub fn ne_(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Ne, other)
    }

    /// Unsigned less-than.
    pub fn ult(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Ult, other)
    }

    /// Unsigned less-or-equal.
    pub fn ule(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Ule, other)
    }

    /// Unsigned greater-than.
    pub fn ugt(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Ugt, other)
    }

    /// Unsigned greater-or-equal.
    pub fn uge(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Uge, other)
    }

    /// Signed less-than.
    pub fn slt(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Slt, other)
    }

    /// Signed less-or-equal.
    pub fn sle(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Sle, other)
    }

    /// Signed greater-than.
    pub fn sgt(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Sgt, other)
    }

    /// Signed greater-or-equal.
    pub fn sge(&self, other: &Expr) -> Result<Expr> {
        self.binop(OpKind::Sge, other)
    }

    /// Split into an ordered, most-significant-first sequence of
    /// `bits`-wide sub-expressions. The total width must be a multiple of
    /// `bits`.
    pub fn chop(&self, bits: u32) -> Result<Vec<Expr>> {
        if bits == 0 {
            return Err(SigilError::Operation("chop into zero-width pieces".into()));
        }
        let total = self.size()?.ok_or_else(|| {
            SigilError::Expression("chopping a value without a width".into())
        })?;
        if total % bits != 0 {
            return Err(SigilError::Operation(format!(
                "expression width ({total}) should be a multiple of {bits}"
            )));
        }
        if total == bits {
            return Ok(vec![self.clone()]);
        }
        (0..total / bits)
            .rev()
            .map(|n| self.extract((n + 1) * bits - 1, n * bits))
            .collect()
    }

    /// If the top-level operation is in `split_on` and every operand is
    /// already a wrapped expression, return those operands; otherwise
    /// return `[self]`.
    ///
    /// # Errors
    ///
    /// If the top-level operation is in `split_on` but the operands are
    /// raw trees, the expression was abstracted without that operator in
    /// the split-boundary set; this is a contract violation, not a silent
    /// no-op.
    pub fn split(&self, split_on: &[OpKind]) -> Result<Vec<Expr>> {
        let model = self.model()?;
        let node = match &model {
            Model::Value(_) => return Ok(vec![self.clone()]),
            Model::Tree(n) => n,
        };
        if !split_on.contains(&node.op()) {
            return Ok(vec![self.clone()]);
        }
        let mut parts = Vec::with_capacity(node.args().len());
        for a in node.args() {
            match a {
                Arg::Expr(e) => parts.push(e.clone()),
                _ => {
                    return Err(SigilError::Expression(format!(
                        "the abstraction of this expression was not done with {} in the split boundary set",
                        node.op()
                    )))
                }
            }
        }
        Ok(parts)
    }

    /// A simplified equivalent of this expression, via the backend
    /// dispatch chain. Memoized; if every backend refuses, the original
    /// expression is returned unchanged.
    pub fn simplify(&self) -> Result<Expr> {
        if self.inner.simplified.load(Ordering::Relaxed) {
            return Ok(self.clone());
        }
        if let Some(s) = self.inner.simplified_cache.get() {
            return Ok(s.clone());
        }
        let s = self.inner.engine.simplify_expr(self)?;
        if Arc::ptr_eq(&s.inner, &self.inner) {
            self.inner.simplified.store(true, Ordering::Relaxed);
        } else {
            s.inner.simplified.store(true, Ordering::Relaxed);
            let _ = self.inner.simplified_cache.set(s.clone());
        }
        Ok(s)
    }

    /// A hash of the resolved model. Expressions with equal models hash
    /// equal; this is also the basis of [`Expr::identity`].
    #[must_use]
    pub fn model_hash(&self) -> u64 {
        let mut h = FxHasher::default();
        match self.model() {
            Ok(m) => m.hash(&mut h),
            Err(_) => {
                // A failing flush still hashes deterministically over the
                // unflushed state.
                match &*self.inner.state.read() {
                    ExprState::Resolved(r) => r.model.hash(&mut h),
                    ExprState::Pending { base, queued } => {
                        base.model.hash(&mut h);
                        queued.hash(&mut h);
                    }
                }
            }
        }
        h.finish()
    }

    /// A stable identifier for deduplication and external storage.
    #[must_use]
    pub fn identity(&self) -> Identity {
        *self.inner.identity.get_or_init(|| {
            let mut h = FxHasher::default();
            h.write_u64(self.model_hash());
            if let Ok(vars) = self.variables() {
                let mut names: Vec<&String> = vars.iter().collect();
                names.sort();
                for n in names {
                    n.hash(&mut h);
                }
            }
            Identity(h.finish())
        })
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match (self.model(), other.model()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.model_hash());
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.state.read();
        let (resolved, queued): (&Resolved, &[OpKind]) = match &*st {
            ExprState::Resolved(r) => (r, &[]),
            ExprState::Pending { base, queued } => (base, queued),
        };
        let tag = if resolved.symbolic { "ES" } else { "E" };
        write!(f, "{tag}(")?;
        for op in queued.iter().rev() {
            write!(f, "{op}(")?;
        }
        write!(f, "{}", resolved.model)?;
        for _ in queued {
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
