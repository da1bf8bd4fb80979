//! Lowering: canonical operation trees into solver-native terms.
//!
//! This is the solver side of the `convert` capability. Arguments recurse
//! through nested trees and wrapped expressions; raw operand types the
//! solver does not model refuse with the typed backend signal.

use crate::term::{TermId, TermManager};
use sigil_core::{Arg, BackendError, Expr, Model, Node, OpKind, Result, SigilError};

/// Lower an expression's resolved model into the arena.
pub fn lower_expr(tm: &mut TermManager, expr: &Expr) -> Result<TermId> {
    match expr.model()? {
        Model::Value(v) => lower_value(tm, &v),
        Model::Tree(n) => lower_node(tm, &n),
    }
}

fn lower_value(tm: &mut TermManager, value: &sigil_core::Value) -> Result<TermId> {
    match value {
        sigil_core::Value::BitVec(bv) => Ok(tm.mk_bv_const(bv.clone())),
        sigil_core::Value::Bool(b) => Ok(tm.mk_bool(*b)),
        sigil_core::Value::Uint(_) => Err(BackendError::UnexpectedType(
            "bare integer outside an operator position".into(),
        )
        .into()),
    }
}

fn lower_arg(tm: &mut TermManager, arg: &Arg) -> Result<TermId> {
    match arg {
        Arg::Expr(e) => lower_expr(tm, e),
        Arg::Node(n) => lower_node(tm, n),
        Arg::BitVec(bv) => Ok(tm.mk_bv_const(bv.clone())),
        Arg::Bool(b) => Ok(tm.mk_bool(*b)),
        Arg::Uint(_) | Arg::Str(_) => Err(BackendError::UnexpectedType(
            "raw argument outside an operator position".into(),
        )
        .into()),
    }
}

fn uint_arg(node: &Node, index: usize) -> Result<u64> {
    match node.args().get(index) {
        Some(Arg::Uint(n)) => Ok(*n),
        _ => Err(SigilError::Operation(format!(
            "operation {} expects an integer argument at position {index}",
            node.op()
        ))),
    }
}

fn str_arg(node: &Node, index: usize) -> Result<&str> {
    match node.args().get(index) {
        Some(Arg::Str(s)) => Ok(s),
        _ => Err(SigilError::Operation(format!(
            "operation {} expects a name argument at position {index}",
            node.op()
        ))),
    }
}

fn small_u32(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| SigilError::SizeInference(format!("parameter {value} is out of range")))
}

/// Lower an operation tree node into the arena.
pub fn lower_node(tm: &mut TermManager, node: &Node) -> Result<TermId> {
    use OpKind::*;
    let bin = |tm: &mut TermManager, node: &Node| -> Result<(TermId, TermId)> {
        match node.args() {
            [a, b] => Ok((lower_arg(tm, a)?, lower_arg(tm, b)?)),
            _ => Err(SigilError::Operation(format!(
                "operation {} expects two operands",
                node.op()
            ))),
        }
    };
    let un = |tm: &mut TermManager, node: &Node| -> Result<TermId> {
        match node.args() {
            [a] => lower_arg(tm, a),
            _ => Err(SigilError::Operation(format!(
                "operation {} expects one operand",
                node.op()
            ))),
        }
    };
    match node.op() {
        BitVecSym => {
            let width = small_u32(uint_arg(node, 1)?)?;
            let name = str_arg(node, 0)?.to_owned();
            tm.mk_var(&name, width)
        }
        BitVecVal => match node.args().first() {
            Some(Arg::BitVec(bv)) => Ok(tm.mk_bv_const(bv.clone())),
            _ => Err(SigilError::Operation(
                "bitvector literal without a value".into(),
            )),
        },
        BoolVal => match node.args().first() {
            Some(Arg::Bool(b)) => Ok(tm.mk_bool(*b)),
            _ => Err(SigilError::Operation(
                "boolean literal without a value".into(),
            )),
        },
        Add => bin(tm, node).and_then(|(a, b)| tm.mk_add(a, b)),
        Sub => bin(tm, node).and_then(|(a, b)| tm.mk_sub(a, b)),
        Mul => bin(tm, node).and_then(|(a, b)| tm.mk_mul(a, b)),
        SDiv => bin(tm, node).and_then(|(a, b)| tm.mk_sdiv(a, b)),
        SMod => bin(tm, node).and_then(|(a, b)| tm.mk_smod(a, b)),
        Neg => un(tm, node).and_then(|a| tm.mk_neg(a)),
        BvAnd => bin(tm, node).and_then(|(a, b)| tm.mk_bvand(a, b)),
        BvOr => bin(tm, node).and_then(|(a, b)| tm.mk_bvor(a, b)),
        BvXor => bin(tm, node).and_then(|(a, b)| tm.mk_bvxor(a, b)),
        BvNot => un(tm, node).and_then(|a| tm.mk_bvnot(a)),
        Shl => bin(tm, node).and_then(|(a, b)| tm.mk_shl(a, b)),
        LShR => bin(tm, node).and_then(|(a, b)| tm.mk_lshr(a, b)),
        AShR => bin(tm, node).and_then(|(a, b)| tm.mk_ashr(a, b)),
        RotateLeft => bin(tm, node).and_then(|(a, b)| tm.mk_rotate_left(a, b)),
        RotateRight => bin(tm, node).and_then(|(a, b)| tm.mk_rotate_right(a, b)),
        Reverse => un(tm, node).and_then(|a| tm.mk_reverse(a)),
        Concat => {
            let parts = node
                .args()
                .iter()
                .map(|a| lower_arg(tm, a))
                .collect::<Result<Vec<_>>>()?;
            tm.mk_concat(parts)
        }
        Extract => {
            let hi = small_u32(uint_arg(node, 0)?)?;
            let lo = small_u32(uint_arg(node, 1)?)?;
            let arg = node.args().get(2).ok_or_else(|| {
                SigilError::Operation("Extract expects three arguments".into())
            })?;
            let a = lower_arg(tm, arg)?;
            tm.mk_extract(hi, lo, a)
        }
        SignExt | ZeroExt => {
            let amount = small_u32(uint_arg(node, 0)?)?;
            let arg = node.args().get(1).ok_or_else(|| {
                SigilError::Operation("extension expects two arguments".into())
            })?;
            let a = lower_arg(tm, arg)?;
            if node.op() == SignExt {
                tm.mk_sign_ext(amount, a)
            } else {
                tm.mk_zero_ext(amount, a)
            }
        }
        Eq => bin(tm, node).and_then(|(a, b)| tm.mk_eq(a, b)),
        Ne => bin(tm, node).and_then(|(a, b)| tm.mk_ne(a, b)),
        Ult => bin(tm, node).and_then(|(a, b)| tm.mk_ult(a, b)),
        Ule => bin(tm, node).and_then(|(a, b)| tm.mk_ule(a, b)),
        Ugt => bin(tm, node).and_then(|(a, b)| tm.mk_ugt(a, b)),
        Uge => bin(tm, node).and_then(|(a, b)| tm.mk_uge(a, b)),
        Slt => bin(tm, node).and_then(|(a, b)| tm.mk_slt(a, b)),
        Sle => bin(tm, node).and_then(|(a, b)| tm.mk_sle(a, b)),
        Sgt => bin(tm, node).and_then(|(a, b)| tm.mk_sgt(a, b)),
        Sge => bin(tm, node).and_then(|(a, b)| tm.mk_sge(a, b)),
        And => {
            let parts = node
                .args()
                .iter()
                .map(|a| lower_arg(tm, a))
                .collect::<Result<Vec<_>>>()?;
            tm.mk_and(parts)
        }
        Or => {
            let parts = node
                .args()
                .iter()
                .map(|a| lower_arg(tm, a))
                .collect::<Result<Vec<_>>>()?;
            tm.mk_or(parts)
        }
        Not => un(tm, node).and_then(|a| tm.mk_not(a)),
        If => match node.args() {
            [c, t, e] => {
                let c = lower_arg(tm, c)?;
                let t = lower_arg(tm, t)?;
                let e = lower_arg(tm, e)?;
                tm.mk_ite(c, t, e)
            }
            _ => Err(SigilError::Operation(
                "If expects (condition, then, else)".into(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermKind;
    use sigil_core::{ConcreteBackend, Engine};
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(vec![Arc::new(ConcreteBackend::new())], vec![])
    }

    #[test]
    fn lowering_shares_subterms() {
        let eng = engine();
        let x = eng.bitvec_explicit("x", 8).unwrap();
        let three = eng.bitvec_val(3, 8).unwrap();
        let lt = x.ult(&three).unwrap();
        let ne = x.ne_(&three).unwrap();

        let mut tm = TermManager::new();
        let t1 = lower_expr(&mut tm, &lt).unwrap();
        let t2 = lower_expr(&mut tm, &ne).unwrap();
        let x1 = lower_expr(&mut tm, &x).unwrap();

        // Both constraints reference the same interned variable term.
        match (tm.kind(t1), tm.kind(t2)) {
            (TermKind::Ult(a, _), TermKind::Ne(b, _)) => {
                assert_eq!(a, b);
                assert_eq!(*a, x1);
            }
            other => panic!("unexpected kinds: {other:?}"),
        }
    }

    #[test]
    fn greater_than_normalizes_to_swapped_less_than() {
        let eng = engine();
        let x = eng.bitvec_explicit("x", 8).unwrap();
        let y = eng.bitvec_explicit("y", 8).unwrap();
        let gt = x.ugt(&y).unwrap();
        let mut tm = TermManager::new();
        let t = lower_expr(&mut tm, &gt).unwrap();
        let (xt, yt) = (
            lower_expr(&mut tm, &x).unwrap(),
            lower_expr(&mut tm, &y).unwrap(),
        );
        assert_eq!(tm.kind(t), &TermKind::Ult(yt, xt));
    }
}
