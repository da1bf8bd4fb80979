//! Satisfying models extracted from the solver.
//!
//! A [`SolverModel`] maps variable names to concrete values and can
//! evaluate any term under that assignment. Variables absent from the
//! model evaluate to zero (model completion), so repeated evaluation calls
//! against one retained model always produce an answer.

use crate::term::{TermId, TermKind, TermManager};
use rustc_hash::FxHashMap;
use sigil_core::{Backend, BitVec, ConcreteBackend, Result, SigilError, Value};

/// A satisfying assignment, retained for further evaluation calls.
#[derive(Debug, Clone, Default)]
pub struct SolverModel {
    values: FxHashMap<String, Value>,
}

impl SolverModel {
    /// An empty model; every variable completes to zero.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    /// The value of a named variable, if the model constrains it.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The full name-to-value assignment.
    #[must_use]
    pub fn assignment(&self) -> &FxHashMap<String, Value> {
        &self.values
    }

    /// Evaluate a term under this model, completing absent variables
    /// with zero.
    pub fn eval_term(&self, tm: &TermManager, term: TermId) -> Result<Value> {
        let mut memo: FxHashMap<TermId, Value> = FxHashMap::default();
        self.eval_rec(tm, term, &mut memo)
    }

    fn eval_rec(
        &self,
        tm: &TermManager,
        term: TermId,
        memo: &mut FxHashMap<TermId, Value>,
    ) -> Result<Value> {
        if let Some(v) = memo.get(&term) {
            return Ok(v.clone());
        }
        let kind = tm.kind(term).clone();
        let value = match &kind {
            TermKind::BoolConst(b) => Value::Bool(*b),
            TermKind::BvConst(bv) => Value::BitVec(bv.clone()),
            TermKind::Var { name, width } => self
                .values
                .get(tm.resolve_name(*name))
                .cloned()
                .unwrap_or_else(|| Value::BitVec(BitVec::zero(*width))),
            other => {
                let op = other.canonical_op().ok_or_else(|| {
                    SigilError::Type("term has no canonical operation".into())
                })?;
                let mut args: Vec<Value> = Vec::new();
                match other {
                    TermKind::Extract { hi, lo, .. } => {
                        args.push(Value::Uint(u64::from(*hi)));
                        args.push(Value::Uint(u64::from(*lo)));
                    }
                    TermKind::SignExt { amount, .. } | TermKind::ZeroExt { amount, .. } => {
                        args.push(Value::Uint(u64::from(*amount)));
                    }
                    _ => {}
                }
                for c in other.children() {
                    args.push(self.eval_rec(tm, c, memo)?);
                }
                ConcreteBackend::new().call(op, &args)?
            }
        };
        memo.insert(term, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_defaults_absent_variables_to_zero() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let one = tm.mk_bv_const(BitVec::from_u64(1, 8));
        let sum = tm.mk_add(x, one).unwrap();
        let m = SolverModel::empty();
        let v = m.eval_term(&tm, sum).unwrap();
        assert_eq!(v.as_bitvec().unwrap().as_u64(), Some(1));
    }

    #[test]
    fn assigned_variables_take_their_model_value() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let two = tm.mk_bv_const(BitVec::from_u64(2, 8));
        let prod = tm.mk_mul(x, two).unwrap();
        let mut m = SolverModel::empty();
        m.insert("x".into(), Value::BitVec(BitVec::from_u64(21, 8)));
        let v = m.eval_term(&tm, prod).unwrap();
        assert_eq!(v.as_bitvec().unwrap().as_u64(), Some(42));
    }

    #[test]
    fn boolean_terms_evaluate() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let three = tm.mk_bv_const(BitVec::from_u64(3, 8));
        let lt = tm.mk_ult(x, three).unwrap();
        let mut m = SolverModel::empty();
        m.insert("x".into(), Value::BitVec(BitVec::from_u64(2, 8)));
        assert_eq!(m.eval_term(&tm, lt).unwrap(), Value::Bool(true));
    }
}
