//! The concrete evaluator backend.
//!
//! A pure model backend: converts raw leaves and concrete expressions into
//! [`Value`]s and applies every canonical operation over them. Symbolic
//! input is refused, which makes this the first link of the dispatch chain
//! rather than a universal evaluator.

use crate::ast::Arg;
use crate::backend::Backend;
use crate::engine::Engine;
use crate::error::{BackendError, BackendResult};
use crate::expr::{Expr, Model};
use crate::ops::OpKind;
use crate::value::{BitVec, Value};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// The pure concrete-value backend.
#[derive(Debug, Default)]
pub struct ConcreteBackend;

impl ConcreteBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn bv(value: &Value) -> BackendResult<&BitVec> {
        value
            .as_bitvec()
            .ok_or_else(|| BackendError::UnexpectedType("expected a bitvector".into()))
    }

    fn boolean(value: &Value) -> BackendResult<bool> {
        value
            .as_bool()
            .ok_or_else(|| BackendError::UnexpectedType("expected a boolean".into()))
    }

    fn uint(value: &Value) -> BackendResult<u64> {
        match value {
            Value::Uint(n) => Ok(*n),
            _ => Err(BackendError::UnexpectedType("expected an integer".into())),
        }
    }

    fn bv_pair<'a>(args: &'a [Value]) -> BackendResult<(&'a BitVec, &'a BitVec)> {
        match args {
            [a, b] => {
                let (a, b) = (Self::bv(a)?, Self::bv(b)?);
                if a.width() != b.width() {
                    return Err(BackendError::UnexpectedType(
                        "operands of mismatched widths".into(),
                    ));
                }
                Ok((a, b))
            }
            _ => Err(BackendError::UnexpectedType(
                "expected exactly two operands".into(),
            )),
        }
    }

    fn bv_one<'a>(args: &'a [Value]) -> BackendResult<&'a BitVec> {
        match args {
            [a] => Self::bv(a),
            _ => Err(BackendError::UnexpectedType(
                "expected exactly one operand".into(),
            )),
        }
    }

    /// The shift amount as a machine integer; values past any width
    /// saturate, which matches the shift semantics.
    fn shift_amount(bv: &BitVec) -> u64 {
        bv.as_u64().unwrap_or(u64::MAX)
    }

    fn rotate_amount(bv: &BitVec, width: u32) -> u64 {
        (bv.value() % BigUint::from(width)).to_u64().unwrap_or(0)
    }
}

impl Backend for ConcreteBackend {
    fn name(&self) -> &'static str {
        "concrete"
    }

    fn convert(&self, arg: &Arg) -> BackendResult<Value> {
        match arg {
            Arg::BitVec(bv) => Ok(Value::BitVec(bv.clone())),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            Arg::Uint(n) => Ok(Value::Uint(*n)),
            Arg::Str(_) => Err(BackendError::UnexpectedType(
                "string argument outside a symbolic leaf".into(),
            )),
            Arg::Node(n) => self.resolve(n),
            Arg::Expr(e) => {
                let model = e
                    .model()
                    .map_err(|err| BackendError::UnexpectedType(err.to_string()))?;
                match model {
                    Model::Value(v) => Ok(v),
                    Model::Tree(n) => self.resolve(&n),
                }
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn call(&self, op: OpKind, args: &[Value]) -> BackendResult<Value> {
        use OpKind::*;
        match op {
            Add => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.add(b))),
            Sub => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.sub(b))),
            Mul => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.mul(b))),
            SDiv => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.sdiv(b))),
            SMod => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.smod(b))),
            Neg => Self::bv_one(args).map(|a| Value::BitVec(a.neg())),
            BvAnd => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.and(b))),
            BvOr => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.or(b))),
            BvXor => Self::bv_pair(args).map(|(a, b)| Value::BitVec(a.xor(b))),
            BvNot => Self::bv_one(args).map(|a| Value::BitVec(a.not())),
            Shl => Self::bv_pair(args)
                .map(|(a, b)| Value::BitVec(a.shl(Self::shift_amount(b)))),
            LShR => Self::bv_pair(args)
                .map(|(a, b)| Value::BitVec(a.lshr(Self::shift_amount(b)))),
            AShR => Self::bv_pair(args)
                .map(|(a, b)| Value::BitVec(a.ashr(Self::shift_amount(b)))),
            RotateLeft => Self::bv_pair(args)
                .map(|(a, b)| Value::BitVec(a.rotate_left(Self::rotate_amount(b, a.width())))),
            RotateRight => Self::bv_pair(args)
                .map(|(a, b)| Value::BitVec(a.rotate_right(Self::rotate_amount(b, a.width())))),
            Reverse => {
                let a = Self::bv_one(args)?;
                if a.width() % 8 != 0 {
                    return Err(BackendError::UnexpectedType(
                        "byte reverse on a non-byte-sized value".into(),
                    ));
                }
                Ok(Value::BitVec(a.reverse_bytes()))
            }
            Concat => {
                let mut it = args.iter();
                let first = it
                    .next()
                    .ok_or_else(|| BackendError::UnexpectedType("empty concatenation".into()))?;
                let mut acc = Self::bv(first)?.clone();
                for v in it {
                    acc = acc.concat(Self::bv(v)?);
                }
                Ok(Value::BitVec(acc))
            }
            Extract => match args {
                [hi, lo, x] => {
                    let (hi, lo) = (Self::uint(hi)?, Self::uint(lo)?);
                    let x = Self::bv(x)?;
                    if lo > hi || hi >= u64::from(x.width()) {
                        return Err(BackendError::UnexpectedType(format!(
                            "extract range [{hi}:{lo}] out of bounds for width {}",
                            x.width()
                        )));
                    }
                    let (hi, lo) = (
                        u32::try_from(hi).map_err(|_| {
                            BackendError::UnexpectedType("extract bound out of range".into())
                        })?,
                        u32::try_from(lo).map_err(|_| {
                            BackendError::UnexpectedType("extract bound out of range".into())
                        })?,
                    );
                    Ok(Value::BitVec(x.extract(hi, lo)))
                }
                _ => Err(BackendError::UnexpectedType(
                    "Extract expects (hi, lo, value)".into(),
                )),
            },
            SignExt | ZeroExt => match args {
                [n, x] => {
                    let n = u32::try_from(Self::uint(n)?).map_err(|_| {
                        BackendError::UnexpectedType("extension amount out of range".into())
                    })?;
                    let x = Self::bv(x)?;
                    Ok(Value::BitVec(if op == SignExt {
                        x.sign_extend(n)
                    } else {
                        x.zero_extend(n)
                    }))
                }
                _ => Err(BackendError::UnexpectedType(
                    "extension expects (amount, value)".into(),
                )),
            },
            Eq | Ne => match args {
                [Value::Bool(a), Value::Bool(b)] => Ok(Value::Bool((a == b) == (op == Eq))),
                _ => {
                    let (a, b) = Self::bv_pair(args)?;
                    Ok(Value::Bool((a == b) == (op == Eq)))
                }
            },
            Ult => Self::bv_pair(args).map(|(a, b)| Value::Bool(a.ult(b))),
            Ule => Self::bv_pair(args).map(|(a, b)| Value::Bool(a.ule(b))),
            Ugt => Self::bv_pair(args).map(|(a, b)| Value::Bool(b.ult(a))),
            Uge => Self::bv_pair(args).map(|(a, b)| Value::Bool(b.ule(a))),
            Slt => Self::bv_pair(args).map(|(a, b)| Value::Bool(a.slt(b))),
            Sle => Self::bv_pair(args).map(|(a, b)| Value::Bool(a.sle(b))),
            Sgt => Self::bv_pair(args).map(|(a, b)| Value::Bool(b.slt(a))),
            Sge => Self::bv_pair(args).map(|(a, b)| Value::Bool(b.sle(a))),
            And | Or => {
                if args.is_empty() {
                    return Err(BackendError::UnexpectedType(
                        "boolean connective over nothing".into(),
                    ));
                }
                let mut acc = op == And;
                for v in args {
                    let b = Self::boolean(v)?;
                    acc = if op == And { acc && b } else { acc || b };
                }
                Ok(Value::Bool(acc))
            }
            Not => match args {
                [v] => Ok(Value::Bool(!Self::boolean(v)?)),
                _ => Err(BackendError::UnexpectedType(
                    "Not expects one operand".into(),
                )),
            },
            If => match args {
                [c, t, e] => {
                    if Self::boolean(c)? {
                        Ok(t.clone())
                    } else {
                        Ok(e.clone())
                    }
                }
                _ => Err(BackendError::UnexpectedType(
                    "If expects (condition, then, else)".into(),
                )),
            },
            BitVecVal => match args.first() {
                Some(Value::BitVec(bv)) => Ok(Value::BitVec(bv.clone())),
                _ => Err(BackendError::UnexpectedType(
                    "bitvector literal without a value".into(),
                )),
            },
            BoolVal => match args.first() {
                Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
                _ => Err(BackendError::UnexpectedType(
                    "boolean literal without a value".into(),
                )),
            },
            BitVecSym => Err(BackendError::Unsupported("symbolic leaf")),
        }
    }

    fn identical(&self, a: &Expr, b: &Expr) -> BackendResult<bool> {
        let va = self.convert(&Arg::Expr(a.clone()))?;
        let vb = self.convert(&Arg::Expr(b.clone()))?;
        Ok(va == vb)
    }

    fn simplify(&self, engine: &Engine, expr: &Expr) -> BackendResult<Expr> {
        let symbolic = expr
            .is_symbolic()
            .map_err(|e| BackendError::UnexpectedType(e.to_string()))?;
        if symbolic {
            return Err(BackendError::Unsupported("symbolic expression"));
        }
        let model = expr
            .model()
            .map_err(|e| BackendError::UnexpectedType(e.to_string()))?;
        match model {
            Model::Value(_) => Ok(expr.clone()),
            Model::Tree(n) => Ok(engine.wrap_value(self.resolve(&n)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(vec![Arc::new(ConcreteBackend::new())], vec![])
    }

    #[test]
    fn concrete_operations_fold_to_values() {
        let eng = engine();
        let a = eng.bitvec_val(40, 32).unwrap();
        let b = eng.bitvec_val(2, 32).unwrap();
        let sum = a.add(&b).unwrap();
        assert!(sum.is_concrete().unwrap());
        let v = sum.concrete_value().unwrap().unwrap();
        assert_eq!(v.as_bitvec().unwrap().as_u64(), Some(42));
    }

    #[test]
    fn comparisons_fold_to_booleans() {
        let eng = engine();
        let a = eng.bitvec_val(1, 8).unwrap();
        let b = eng.bitvec_val(2, 8).unwrap();
        let lt = a.ult(&b).unwrap();
        assert!(eng.is_true(&lt));
        assert!(!eng.is_false(&lt));
        assert_eq!(lt.size().unwrap(), None);
    }

    #[test]
    fn conditional_folds_on_concrete_condition() {
        let eng = engine();
        let c = eng.true_();
        let t = eng.bitvec_val(1, 8).unwrap();
        let e = eng.bitvec_val(2, 8).unwrap();
        let ite = eng.if_(&c, &t, &e).unwrap();
        assert_eq!(
            ite.concrete_value()
                .unwrap()
                .unwrap()
                .as_bitvec()
                .unwrap()
                .as_u64(),
            Some(1)
        );
    }

    #[test]
    fn symbolic_operand_stays_abstract() {
        let eng = engine();
        let x = eng.bitvec("x", 8).unwrap();
        let b = eng.bitvec_val(2, 8).unwrap();
        let sum = x.add(&b).unwrap();
        assert!(sum.is_symbolic().unwrap());
        assert!(sum.model().unwrap().as_tree().is_some());
        assert_eq!(sum.size().unwrap(), Some(8));
    }

    #[test]
    fn identical_answers_on_concrete_inputs_only() {
        let eng = engine();
        let a = eng.bitvec_val(5, 8).unwrap();
        let b = eng.bitvec_val(5, 8).unwrap();
        let x = eng.bitvec("x", 8).unwrap();
        assert!(eng.is_identical(&a, &b));
        assert!(!eng.is_identical(&a, &x));
    }
}
