//! The engine: leaf constructors, the single operation-construction path,
//! and the ordered backend dispatch protocol.
//!
//! Two backend lists are consulted: model backends (pure evaluators, tried
//! first) and solver backends (tried second), each in configuration order.
//! Construction folds concrete operations eagerly through the model
//! backends; a symbolic operand, or a refusal from every backend, leaves
//! the expression abstract. This fallthrough chain is the system's sole
//! polymorphism mechanism.

use crate::ast::{Arg, Node};
use crate::backend::Backend;
use crate::counters::Counters;
use crate::error::{Result, SigilError};
use crate::expr::{Expr, Model};
use crate::ops::OpKind;
use crate::value::{BitVec, Value};
use num_bigint::BigUint;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(PartialEq, Eq)]
enum ExprSort {
    BitVec,
    Bool,
    Unknown,
}

struct EngineInner {
    model_backends: Vec<Arc<dyn Backend>>,
    solver_backends: Vec<Arc<dyn Backend>>,
    counters: Arc<Counters>,
    unique_names: bool,
}

/// The expression engine.
///
/// Cloning is cheap; all clones share the same backends and counters.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |bs: &[Arc<dyn Backend>]| bs.iter().map(|b| b.name()).collect::<Vec<_>>();
        f.debug_struct("Engine")
            .field("model_backends", &names(&self.inner.model_backends))
            .field("solver_backends", &names(&self.inner.solver_backends))
            .field("unique_names", &self.inner.unique_names)
            .finish()
    }
}

impl Engine {
    /// Create an engine with the given backend lists, fresh counters, and
    /// unique leaf naming enabled.
    #[must_use]
    pub fn new(
        model_backends: Vec<Arc<dyn Backend>>,
        solver_backends: Vec<Arc<dyn Backend>>,
    ) -> Self {
        Self::with_parts(
            model_backends,
            solver_backends,
            Arc::new(Counters::new()),
            true,
        )
    }

    /// Create an engine with explicit counters and naming policy.
    #[must_use]
    pub fn with_parts(
        model_backends: Vec<Arc<dyn Backend>>,
        solver_backends: Vec<Arc<dyn Backend>>,
        counters: Arc<Counters>,
        unique_names: bool,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                model_backends,
                solver_backends,
                counters,
                unique_names,
            }),
        }
    }

    /// The shared counter service.
    #[must_use]
    pub fn counters(&self) -> &Arc<Counters> {
        &self.inner.counters
    }

    /// The ordered model backends.
    #[must_use]
    pub fn model_backends(&self) -> &[Arc<dyn Backend>] {
        &self.inner.model_backends
    }

    /// The ordered solver backends.
    #[must_use]
    pub fn solver_backends(&self) -> &[Arc<dyn Backend>] {
        &self.inner.solver_backends
    }

    // Leaf constructors.

    /// A named symbolic bitvector. Unless unique naming was disabled, the
    /// name gets a process-unique `_{id}_{width}` suffix so variable names
    /// never collide.
    pub fn bitvec(&self, name: &str, width: u32) -> Result<Expr> {
        let name = if self.inner.unique_names {
            format!("{name}_{}_{}", self.inner.counters.next_name_id(), width)
        } else {
            name.to_owned()
        };
        self.bitvec_explicit(&name, width)
    }

    /// A named symbolic bitvector with the name used verbatim.
    pub fn bitvec_explicit(&self, name: &str, width: u32) -> Result<Expr> {
        if width == 0 {
            return Err(SigilError::SizeInference(
                "zero-width symbolic bitvector".into(),
            ));
        }
        let node = Arc::new(Node::new(
            OpKind::BitVecSym,
            vec![Arg::Str(name.to_owned()), Arg::Uint(u64::from(width))],
        ));
        let mut variables = FxHashSet::default();
        variables.insert(name.to_owned());
        self.wrap_tree(node, variables)
    }

    /// A concrete bitvector literal.
    pub fn bitvec_val(&self, value: u64, width: u32) -> Result<Expr> {
        self.bitvec_val_big(BigUint::from(value), width)
    }

    /// A concrete bitvector literal from an arbitrary-width value.
    pub fn bitvec_val_big(&self, value: BigUint, width: u32) -> Result<Expr> {
        if width == 0 {
            return Err(SigilError::SizeInference(
                "zero-width bitvector literal".into(),
            ));
        }
        Ok(self.wrap_value(Value::BitVec(BitVec::new(value, width))))
    }

    /// A concrete boolean literal.
    #[must_use]
    pub fn bool_val(&self, value: bool) -> Expr {
        self.wrap_value(Value::Bool(value))
    }

    /// The true literal.
    #[must_use]
    pub fn true_(&self) -> Expr {
        self.bool_val(true)
    }

    /// The false literal.
    #[must_use]
    pub fn false_(&self) -> Expr {
        self.bool_val(false)
    }

    /// Wrap a backend-resolved value as a concrete expression.
    #[must_use]
    pub fn wrap_value(&self, value: Value) -> Expr {
        Expr::new_resolved(self.clone(), Model::Value(value), FxHashSet::default())
    }

    /// Wrap an operation tree with the given free-variable set. The tree's
    /// width is validated; the symbolic flag is derived from the variable
    /// set, keeping the two in lockstep.
    pub fn wrap_tree(&self, node: Arc<Node>, variables: FxHashSet<String>) -> Result<Expr> {
        node.size(self.model_backends())?;
        Ok(Expr::new_resolved(
            self.clone(),
            Model::Tree(node),
            variables,
        ))
    }

    /// The single construction path for every operation.
    ///
    /// Builds the tree node, unions operand metadata, validates the length
    /// policy (a fatal construction error on inconsistency), then folds
    /// the node through the model backends when no operand is symbolic.
    pub fn op(&self, op: OpKind, args: Vec<Arg>) -> Result<Expr> {
        let mut variables = FxHashSet::default();
        let mut symbolic = false;
        for a in &args {
            Self::collect_arg_metadata(a, &mut variables, &mut symbolic)?;
        }
        let node = Arc::new(Node::new(op, args));
        node.size(self.model_backends())?;
        if !symbolic {
            for b in self.model_backends() {
                match b.resolve(&node) {
                    Ok(v) => return Ok(self.wrap_value(v)),
                    Err(e) => {
                        trace!(backend = b.name(), error = %e, "backend refused, falling through");
                    }
                }
            }
        }
        Ok(Expr::new_resolved(
            self.clone(),
            Model::Tree(node),
            variables,
        ))
    }

    fn collect_arg_metadata(
        arg: &Arg,
        variables: &mut FxHashSet<String>,
        symbolic: &mut bool,
    ) -> Result<()> {
        match arg {
            Arg::Expr(e) => {
                variables.extend(e.variables()?.iter().cloned());
                *symbolic |= e.is_symbolic()?;
                Ok(())
            }
            Arg::Node(n) => n.collect_metadata(variables, symbolic),
            _ => Ok(()),
        }
    }

    // Boolean connectives and the conditional.

    /// Boolean conjunction.
    pub fn and_(&self, operands: &[Expr]) -> Result<Expr> {
        if operands.is_empty() {
            return Err(SigilError::Operation("conjunction of nothing".into()));
        }
        self.op(OpKind::And, operands.iter().map(|e| e.arg()).collect())
    }

    /// Boolean disjunction.
    pub fn or_(&self, operands: &[Expr]) -> Result<Expr> {
        if operands.is_empty() {
            return Err(SigilError::Operation("disjunction of nothing".into()));
        }
        self.op(OpKind::Or, operands.iter().map(|e| e.arg()).collect())
    }

    /// Boolean negation.
    pub fn not_(&self, operand: &Expr) -> Result<Expr> {
        self.op(OpKind::Not, vec![operand.arg()])
    }

    /// Conditional expression. Both branches must have the same sort (both
    /// boolean, or bitvectors of one width); mixing kinds is a
    /// construction error.
    pub fn if_(&self, cond: &Expr, then: &Expr, els: &Expr) -> Result<Expr> {
        if Self::sort_of(cond)? == ExprSort::BitVec {
            return Err(SigilError::Type("If condition must be boolean".into()));
        }
        let (tk, ek) = (Self::sort_of(then)?, Self::sort_of(els)?);
        if tk != ExprSort::Unknown && ek != ExprSort::Unknown && tk != ek {
            return Err(SigilError::Operation(
                "differently-typed branches passed to If".into(),
            ));
        }
        self.op(
            OpKind::If,
            vec![cond.arg(), then.arg(), els.arg()],
        )
    }

    fn sort_of(e: &Expr) -> Result<ExprSort> {
        match e.model()? {
            Model::Value(Value::BitVec(_)) => Ok(ExprSort::BitVec),
            Model::Value(Value::Bool(_)) => Ok(ExprSort::Bool),
            Model::Value(Value::Uint(_)) => Ok(ExprSort::Unknown),
            Model::Tree(_) => match e.size()? {
                Some(_) => Ok(ExprSort::BitVec),
                None => Ok(ExprSort::Bool),
            },
        }
    }

    /// Right-fold a list of `(condition, value)` cases into a nested
    /// conditional ending in `default`.
    pub fn ite_cases(&self, cases: &[(Expr, Expr)], default: &Expr) -> Result<Expr> {
        let mut sofar = default.clone();
        for (cond, value) in cases.iter().rev() {
            sofar = self.if_(cond, value, &sofar)?;
        }
        Ok(sofar)
    }

    /// A lookup table as a nested conditional: compares `key` against each
    /// entry's first component.
    pub fn ite_dict(&self, key: &Expr, table: &[(Expr, Expr)], default: &Expr) -> Result<Expr> {
        let cases: Vec<(Expr, Expr)> = table
            .iter()
            .map(|(k, v)| Ok((key.eq_(k)?, v.clone())))
            .collect::<Result<_>>()?;
        self.ite_cases(&cases, default)
    }

    /// Variadic concatenation; a single operand is returned unchanged.
    pub fn concat(&self, operands: &[Expr]) -> Result<Expr> {
        match operands.len() {
            0 => Err(SigilError::Operation("concatenation of nothing".into())),
            1 => Ok(operands[0].clone()),
            _ => self.op(OpKind::Concat, operands.iter().map(|e| e.arg()).collect()),
        }
    }

    // Dispatch operations.

    /// Simplify through the dispatch chain: model backends first, then
    /// solver backends. If every backend refuses, the original expression
    /// is returned unchanged.
    pub fn simplify_expr(&self, expr: &Expr) -> Result<Expr> {
        for b in self.model_backends() {
            match b.simplify(self, expr) {
                Ok(s) => return Ok(s),
                Err(e) => trace!(backend = b.name(), error = %e, "refused simplification"),
            }
        }
        debug!("simplifying via solver backend");
        for b in self.solver_backends() {
            match b.simplify(self, expr) {
                Ok(s) => return Ok(s),
                Err(e) => trace!(backend = b.name(), error = %e, "refused simplification"),
            }
        }
        debug!("unable to simplify expression");
        Ok(expr.clone())
    }

    /// Whether the expression is definitely true. Undecidable inputs
    /// report false.
    #[must_use]
    pub fn is_true(&self, expr: &Expr) -> bool {
        for b in self.model_backends() {
            if let Ok(v) = b.convert(&expr.arg()) {
                if let Ok(r) = b.is_true(&v) {
                    return r;
                }
            }
        }
        debug!("unable to tell the truth-value of this expression");
        false
    }

    /// Whether the expression is definitely false. Undecidable inputs
    /// report false.
    #[must_use]
    pub fn is_false(&self, expr: &Expr) -> bool {
        for b in self.model_backends() {
            if let Ok(v) = b.convert(&expr.arg()) {
                if let Ok(r) = b.is_false(&v) {
                    return r;
                }
            }
        }
        debug!("unable to tell the truth-value of this expression");
        false
    }

    /// Conservatively decide whether two expressions have identical
    /// models. `false` means "could not be shown identical".
    #[must_use]
    pub fn is_identical(&self, a: &Expr, b: &Expr) -> bool {
        if a == b {
            return true;
        }
        let mut answered = false;
        for backend in self.model_backends() {
            match backend.identical(a, b) {
                Ok(r) => {
                    answered = true;
                    if !r {
                        return false;
                    }
                }
                Err(_) => {}
            }
        }
        answered
    }

    /// Convert an expression to a backend-native value through the first
    /// model backend that accepts it.
    pub fn model_object(&self, expr: &Expr) -> Result<Value> {
        for b in self.model_backends() {
            if let Ok(v) = b.convert(&expr.arg()) {
                return Ok(v);
            }
        }
        Err(SigilError::NoBackend(
            "no model backend can convert this expression".into(),
        ))
    }
}
