//! Behavioral tests for the expression wrapper and dispatch protocol.

use sigil_core::{Arg, ConcreteBackend, Engine, Node, OpKind, SigilError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

fn engine() -> Engine {
    Engine::new(vec![Arc::new(ConcreteBackend::new())], vec![])
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut h = DefaultHasher::new();
    value.hash(&mut h);
    h.finish()
}

#[test]
fn symbolic_iff_variables_nonempty() {
    let eng = engine();
    let x = eng.bitvec("x", 32).unwrap();
    assert!(x.is_symbolic().unwrap());
    assert_eq!(x.variables().unwrap().len(), 1);

    let v = eng.bitvec_val(4, 32).unwrap();
    assert!(!v.is_symbolic().unwrap());
    assert!(v.variables().unwrap().is_empty());

    let sum = x.add(&v).unwrap();
    assert!(sum.is_symbolic().unwrap());
    assert_eq!(sum.variables().unwrap().len(), 1);

    let b = eng.bool_val(true);
    assert!(!b.is_symbolic().unwrap());
}

#[test]
fn unique_names_never_collide() {
    let eng = engine();
    let a = eng.bitvec("x", 8).unwrap();
    let b = eng.bitvec("x", 8).unwrap();
    let va = a.variables().unwrap();
    let vb = b.variables().unwrap();
    let na = va.iter().next().unwrap();
    let nb = vb.iter().next().unwrap();
    assert_ne!(na, nb);
    assert!(na.starts_with("x_"));
    assert!(na.ends_with("_8"));
}

#[test]
fn explicit_names_are_used_verbatim() {
    let eng = engine();
    let a = eng.bitvec_explicit("exact", 8).unwrap();
    assert!(a.variables().unwrap().contains("exact"));
}

#[test]
fn equal_trees_compare_and_hash_equal() {
    let eng = engine();
    let a1 = eng
        .bitvec_explicit("x", 32)
        .unwrap()
        .add(&eng.bitvec_val(4, 32).unwrap())
        .unwrap();
    let a2 = eng
        .bitvec_explicit("x", 32)
        .unwrap()
        .add(&eng.bitvec_val(4, 32).unwrap())
        .unwrap();
    assert_eq!(a1, a2);
    assert_eq!(hash_of(&a1), hash_of(&a2));
    assert_eq!(a1.identity(), a2.identity());

    let b = eng
        .bitvec_explicit("y", 32)
        .unwrap()
        .add(&eng.bitvec_val(4, 32).unwrap())
        .unwrap();
    assert_ne!(a1, b);
}

#[test]
fn chop_is_most_significant_first() {
    let eng = engine();
    let v = eng.bitvec_val(0xabcd, 16).unwrap();
    let pieces = v.chop(8).unwrap();
    assert_eq!(pieces.len(), 2);
    let high = pieces[0].concrete_value().unwrap().unwrap();
    let low = pieces[1].concrete_value().unwrap().unwrap();
    assert_eq!(high.as_bitvec().unwrap().as_u64(), Some(0xab));
    assert_eq!(low.as_bitvec().unwrap().as_u64(), Some(0xcd));
}

#[test]
fn chop_rejects_non_multiples() {
    let eng = engine();
    let v = eng.bitvec_val(0xabcd, 16).unwrap();
    assert!(matches!(v.chop(3), Err(SigilError::Operation(_))));
    // Chopping into exactly one piece returns the expression itself.
    let whole = v.chop(16).unwrap();
    assert_eq!(whole.len(), 1);
    assert_eq!(whole[0], v);
}

#[test]
fn bit_indexing_maps_onto_extract() {
    let eng = engine();
    let v = eng.bitvec_val(0b100, 8).unwrap();
    let bit2 = v.bit(2).unwrap();
    assert_eq!(bit2.size().unwrap(), Some(1));
    assert_eq!(
        bit2.concrete_value().unwrap().unwrap().as_bitvec().unwrap().as_u64(),
        Some(1)
    );
}

#[test]
fn split_returns_self_when_op_not_in_boundary() {
    let eng = engine();
    let x = eng.bitvec("x", 8).unwrap();
    let y = eng.bitvec("y", 8).unwrap();
    let sum = x.add(&y).unwrap();
    let parts = sum.split(&[OpKind::And, OpKind::Or]).unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0], sum);
}

#[test]
fn split_on_expression_operands_returns_them() {
    let eng = engine();
    let x = eng.bitvec("x", 8).unwrap();
    let c1 = x.ult(&eng.bitvec_val(3, 8).unwrap()).unwrap();
    let c2 = x.ne_(&eng.bitvec_val(1, 8).unwrap()).unwrap();
    let conj = eng.and_(&[c1.clone(), c2.clone()]).unwrap();
    let parts = conj.split(&[OpKind::And]).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], c1);
    assert_eq!(parts[1], c2);
}

#[test]
fn split_without_matching_abstraction_is_a_contract_error() {
    let eng = engine();
    // A conjunction whose operands are raw trees, as an abstraction that
    // did not track And as a split boundary would produce.
    let left = Arc::new(Node::new(
        OpKind::Ult,
        vec![
            Arg::Node(Arc::new(Node::new(
                OpKind::BitVecSym,
                vec![Arg::Str("x".into()), Arg::Uint(8)],
            ))),
            Arg::BitVec(sigil_core::BitVec::from_u64(3, 8)),
        ],
    ));
    let right = Arc::new(Node::new(
        OpKind::Ult,
        vec![
            Arg::Node(Arc::new(Node::new(
                OpKind::BitVecSym,
                vec![Arg::Str("y".into()), Arg::Uint(8)],
            ))),
            Arg::BitVec(sigil_core::BitVec::from_u64(5, 8)),
        ],
    ));
    let conj = Arc::new(Node::new(
        OpKind::And,
        vec![Arg::Node(left), Arg::Node(right)],
    ));
    let mut vars = rustc_hash::FxHashSet::default();
    vars.insert("x".to_owned());
    vars.insert("y".to_owned());
    let e = eng.wrap_tree(conj, vars).unwrap();
    assert!(matches!(
        e.split(&[OpKind::And]),
        Err(SigilError::Expression(_))
    ));
}

#[test]
fn deferred_operations_flush_once_on_read() {
    let eng = engine();
    let v = eng.bitvec_val(0xabcd, 16).unwrap();
    let lazy = v.reversed_lazy();
    assert_eq!(lazy.pending_operations(), 1);
    // The original is untouched.
    assert_eq!(v.pending_operations(), 0);

    let m = lazy.model().unwrap();
    assert_eq!(
        m.as_value().unwrap().as_bitvec().unwrap().as_u64(),
        Some(0xcdab)
    );
    assert_eq!(lazy.pending_operations(), 0);

    // Reading again returns the same resolved model without re-flushing.
    let m2 = lazy.model().unwrap();
    assert_eq!(m, m2);
}

#[test]
fn deferred_operations_stack() {
    let eng = engine();
    let v = eng.bitvec_val(0xab_cd_ef_01, 32).unwrap();
    let twice = v.reversed_lazy().reversed_lazy();
    assert_eq!(twice.pending_operations(), 2);
    let m = twice.model().unwrap();
    assert_eq!(
        m.as_value().unwrap().as_bitvec().unwrap().as_u64(),
        Some(0xab_cd_ef_01)
    );
}

#[test]
fn if_rejects_mismatched_branch_kinds() {
    let eng = engine();
    let c = eng.bool_val(true);
    let bv = eng.bitvec_val(1, 8).unwrap();
    let b = eng.bool_val(false);
    assert!(matches!(
        eng.if_(&c, &bv, &b),
        Err(SigilError::Operation(_))
    ));
    assert!(matches!(eng.if_(&bv, &b, &b), Err(SigilError::Type(_))));
}

#[test]
fn if_rejects_mismatched_branch_widths() {
    let eng = engine();
    let c = eng.bitvec("c", 8).unwrap().ult(&eng.bitvec_val(1, 8).unwrap()).unwrap();
    let a = eng.bitvec("a", 8).unwrap();
    let b = eng.bitvec("b", 16).unwrap();
    assert!(matches!(
        eng.if_(&c, &a, &b),
        Err(SigilError::SizeInference(_))
    ));
}

#[test]
fn ite_cases_folds_concretely() {
    let eng = engine();
    let key = eng.bitvec_val(2, 8).unwrap();
    let table = vec![
        (eng.bitvec_val(1, 8).unwrap(), eng.bitvec_val(10, 8).unwrap()),
        (eng.bitvec_val(2, 8).unwrap(), eng.bitvec_val(20, 8).unwrap()),
    ];
    let def = eng.bitvec_val(0, 8).unwrap();
    let out = eng.ite_dict(&key, &table, &def).unwrap();
    assert_eq!(
        out.concrete_value().unwrap().unwrap().as_bitvec().unwrap().as_u64(),
        Some(20)
    );
}

#[test]
fn model_object_requires_a_capable_backend() {
    let eng = engine();
    let v = eng.bitvec_val(7, 8).unwrap();
    assert!(eng.model_object(&v).is_ok());

    let x = eng.bitvec("x", 8).unwrap();
    assert!(matches!(
        eng.model_object(&x),
        Err(SigilError::NoBackend(_))
    ));
}

#[test]
fn simplify_falls_back_to_the_original() {
    let eng = engine();
    let x = eng.bitvec("x", 8).unwrap();
    let e = x.add(&eng.bitvec_val(0, 8).unwrap()).unwrap();
    // No solver backend is configured, and the concrete backend refuses
    // symbolic input, so simplification returns the expression unchanged.
    let s = e.simplify().unwrap();
    assert_eq!(s, e);
    // And is memoized.
    let s2 = e.simplify().unwrap();
    assert_eq!(s, s2);
}

#[test]
fn extraction_out_of_range_fails_at_construction() {
    let eng = engine();
    let x = eng.bitvec("x", 8).unwrap();
    assert!(matches!(
        x.extract(8, 0),
        Err(SigilError::SizeInference(_))
    ));
    assert!(matches!(
        x.extract(2, 5),
        Err(SigilError::SizeInference(_))
    ));
}

#[test]
fn mismatched_widths_fail_at_construction() {
    let eng = engine();
    let x = eng.bitvec("x", 8).unwrap();
    let y = eng.bitvec("y", 16).unwrap();
    assert!(matches!(x.add(&y), Err(SigilError::SizeInference(_))));
}
