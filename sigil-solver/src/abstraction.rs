//! Abstraction: solver-native terms back into operation trees.
//!
//! The inverse of lowering. Children are reconstructed recursively, leaf
//! terms become named symbolic leaves or literals, and non-leaf operators
//! map through the typed native-to-canonical table. Range parameters for
//! extraction and extension are re-emitted from the term kind's structural
//! fields.
//!
//! A configurable split-boundary operator set (default `{And, Or}`)
//! controls whether children under those operators come back as full
//! expressions, so a later `split` over the same set succeeds. The
//! boundary propagates only through nested boundary operators; below any
//! other operator children stay raw trees.

use crate::term::{TermId, TermKind, TermManager};
use rustc_hash::FxHashSet;
use sigil_core::{Arg, Engine, Expr, Node, OpKind, Result, SigilError};
use std::sync::Arc;

/// Reconstruct an expression from a native term, recovering variable
/// names and symbolic-ness.
pub fn abstract_term(
    engine: &Engine,
    tm: &TermManager,
    term: TermId,
    split_on: &FxHashSet<OpKind>,
) -> Result<Expr> {
    let (node, vars) = abstract_node(engine, tm, term, split_on)?;
    engine.wrap_tree(node, vars)
}

fn abstract_node(
    engine: &Engine,
    tm: &TermManager,
    term: TermId,
    split_on: &FxHashSet<OpKind>,
) -> Result<(Arc<Node>, FxHashSet<String>)> {
    let kind = tm.kind(term).clone();
    match &kind {
        TermKind::Var { name, width } => {
            let name = tm.resolve_name(*name).to_owned();
            let node = Arc::new(Node::new(
                OpKind::BitVecSym,
                vec![Arg::Str(name.clone()), Arg::Uint(u64::from(*width))],
            ));
            let mut vars = FxHashSet::default();
            vars.insert(name);
            Ok((node, vars))
        }
        TermKind::BvConst(bv) => {
            let node = Arc::new(Node::new(
                OpKind::BitVecVal,
                vec![
                    Arg::BitVec(bv.clone()),
                    Arg::Uint(u64::from(bv.width())),
                ],
            ));
            Ok((node, FxHashSet::default()))
        }
        TermKind::BoolConst(b) => {
            let node = Arc::new(Node::new(OpKind::BoolVal, vec![Arg::Bool(*b)]));
            Ok((node, FxHashSet::default()))
        }
        other => {
            let op = other.canonical_op().ok_or_else(|| {
                SigilError::Type("native term without a canonical operation".into())
            })?;
            let in_split = split_on.contains(&op);
            let empty = FxHashSet::default();
            let child_split = if in_split { split_on } else { &empty };

            let mut args: Vec<Arg> = Vec::new();
            match other {
                TermKind::Extract { hi, lo, .. } => {
                    args.push(Arg::Uint(u64::from(*hi)));
                    args.push(Arg::Uint(u64::from(*lo)));
                }
                TermKind::SignExt { amount, .. } | TermKind::ZeroExt { amount, .. } => {
                    args.push(Arg::Uint(u64::from(*amount)));
                }
                _ => {}
            }

            let mut vars = FxHashSet::default();
            for c in other.children() {
                let (child_node, child_vars) = abstract_node(engine, tm, c, child_split)?;
                if in_split {
                    let e = engine.wrap_tree(child_node, child_vars.clone())?;
                    args.push(Arg::Expr(e));
                } else {
                    args.push(Arg::Node(child_node));
                }
                vars.extend(child_vars);
            }
            Ok((Arc::new(Node::new(op, args)), vars))
        }
    }
}
