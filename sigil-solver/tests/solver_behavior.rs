//! End-to-end behavior of the solver backend: scoped checking, bounded
//! enumeration, optimization, simplification, and abstraction.

use sigil_core::{BitVec, OpKind, SigilError, Value};
use sigil_solver::{standard_engine, SessionState, SolverConfig};
use std::collections::BTreeSet;

fn values_as_u64(values: &[Value]) -> BTreeSet<u64> {
    values
        .iter()
        .map(|v| v.as_bitvec().expect("bitvector value").as_u64().unwrap())
        .collect()
}

#[test]
fn check_reports_satisfiability() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    assert_eq!(s.state(), SessionState::Empty);

    s.add(&x.ult(&engine.bitvec_val(3, 8).unwrap()).unwrap()).unwrap();
    assert!(solver.check(&mut s, &[]).unwrap());
    assert_eq!(s.state(), SessionState::CheckedSat);

    // x == 5 is inconsistent with x < 3, but only inside the scoped call.
    let five = engine.bitvec_val(5, 8).unwrap();
    let conflicting = x.eq_(&five).unwrap();
    assert!(!solver.check(&mut s, &[conflicting]).unwrap());
    assert_eq!(s.state(), SessionState::CheckedUnsat);
    assert_eq!(s.depth(), 0);

    // The scoped constraint is gone.
    assert!(solver.check(&mut s, &[]).unwrap());
}

#[test]
fn contradictory_equalities_are_unsat_and_eval_signals() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.eq_(&engine.bitvec_val(5, 8).unwrap()).unwrap()).unwrap();
    s.add(&x.eq_(&engine.bitvec_val(6, 8).unwrap()).unwrap()).unwrap();

    assert!(!solver.check(&mut s, &[]).unwrap());
    match solver.eval(&mut s, &x, 1, &[]) {
        Err(SigilError::Unsat) => {}
        other => panic!("expected the unsatisfiable-constraints signal, got {other:?}"),
    }
}

#[test]
fn eval_is_exhaustive_below_the_bound() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ult(&engine.bitvec_val(3, 8).unwrap()).unwrap()).unwrap();

    let values = solver.eval(&mut s, &x, 10, &[]).unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(values_as_u64(&values), [0u64, 1, 2].into_iter().collect());

    // The enumeration disequalities were scoped to the call.
    assert_eq!(s.num_assertions(), 1);
    let again = solver.eval(&mut s, &x, 10, &[]).unwrap();
    assert_eq!(again.len(), 3);
}

#[test]
fn eval_respects_the_bound() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    let values = solver.eval(&mut s, &x, 4, &[]).unwrap();
    assert_eq!(values.len(), 4);
    // All distinct.
    assert_eq!(values_as_u64(&values).len(), 4);
}

#[test]
fn eval_with_extra_constraints_scopes_them() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ult(&engine.bitvec_val(10, 8).unwrap()).unwrap()).unwrap();

    let extra = x.uge(&engine.bitvec_val(8, 8).unwrap()).unwrap();
    let values = solver.eval(&mut s, &x, 10, &[extra]).unwrap();
    assert_eq!(values_as_u64(&values), [8u64, 9].into_iter().collect());

    // Without the extras the full range is back.
    let all = solver.eval(&mut s, &x, 20, &[]).unwrap();
    assert_eq!(all.len(), 10);
}

#[test]
fn min_and_max_bound_the_satisfying_values() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.uge(&engine.bitvec_val(10, 8).unwrap()).unwrap()).unwrap();
    s.add(&x.ule(&engine.bitvec_val(200, 8).unwrap()).unwrap()).unwrap();

    let min = solver.min(&mut s, &x, &[]).unwrap();
    let max = solver.max(&mut s, &x, &[]).unwrap();
    assert_eq!(min.as_u64(), Some(10));
    assert_eq!(max.as_u64(), Some(200));

    // Both extremes are themselves satisfying values.
    let min_e = engine.bitvec_val(10, 8).unwrap();
    assert!(solver.check(&mut s, &[x.eq_(&min_e).unwrap()]).unwrap());
    let max_e = engine.bitvec_val(200, 8).unwrap();
    assert!(solver.check(&mut s, &[x.eq_(&max_e).unwrap()]).unwrap());

    // Probe frames were discarded either way.
    assert_eq!(s.depth(), 0);
    assert_eq!(s.num_assertions(), 2);
}

#[test]
fn min_max_with_extra_constraints() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ule(&engine.bitvec_val(100, 8).unwrap()).unwrap()).unwrap();

    let lower = x.uge(&engine.bitvec_val(42, 8).unwrap()).unwrap();
    assert_eq!(solver.min(&mut s, &x, &[lower]).unwrap().as_u64(), Some(42));
    // The extra bound does not persist.
    assert_eq!(solver.min(&mut s, &x, &[]).unwrap().as_u64(), Some(0));
    assert_eq!(solver.max(&mut s, &x, &[]).unwrap().as_u64(), Some(100));
}

#[test]
fn min_on_unsatisfiable_constraints_signals() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.eq_(&engine.bitvec_val(5, 8).unwrap()).unwrap()).unwrap();
    s.add(&x.eq_(&engine.bitvec_val(6, 8).unwrap()).unwrap()).unwrap();
    assert!(matches!(solver.min(&mut s, &x, &[]), Err(SigilError::Unsat)));
}

#[test]
fn a_pinned_value_optimizes_to_itself() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.eq_(&engine.bitvec_val(77, 8).unwrap()).unwrap()).unwrap();
    assert_eq!(solver.min(&mut s, &x, &[]).unwrap().as_u64(), Some(77));
    assert_eq!(solver.max(&mut s, &x, &[]).unwrap().as_u64(), Some(77));
}

#[test]
fn optimization_over_a_derived_expression() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let sum = x.add(&engine.bitvec_val(1, 8).unwrap()).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ule(&engine.bitvec_val(5, 8).unwrap()).unwrap()).unwrap();
    // x + 1 with x in [0, 5] ranges over [1, 6].
    assert_eq!(solver.min(&mut s, &sum, &[]).unwrap().as_u64(), Some(1));
    assert_eq!(solver.max(&mut s, &sum, &[]).unwrap().as_u64(), Some(6));
}

#[test]
fn results_populate_the_assignment() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec_explicit("addr", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.eq_(&engine.bitvec_val(42, 8).unwrap()).unwrap()).unwrap();

    let r = solver.results(&mut s, &[]).unwrap();
    assert!(r.satisfiable);
    assert_eq!(
        r.assignment.get("addr"),
        Some(&Value::BitVec(BitVec::from_u64(42, 8)))
    );

    // The retained native model answers repeated evaluation calls.
    let model = r.native_model.expect("model retained");
    assert_eq!(
        model.value_of("addr"),
        Some(&Value::BitVec(BitVec::from_u64(42, 8)))
    );
    let term = sigil_solver::lower::lower_expr(s.term_manager_mut(), &x).unwrap();
    let v = model.eval_term(s.term_manager(), term).unwrap();
    assert_eq!(v, Value::BitVec(BitVec::from_u64(42, 8)));
}

#[test]
fn solve_counter_tracks_checks() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ult(&engine.bitvec_val(3, 8).unwrap()).unwrap()).unwrap();

    let before = engine.counters().solve_count();
    solver.check(&mut s, &[]).unwrap();
    solver.check(&mut s, &[]).unwrap();
    assert_eq!(engine.counters().solve_count(), before + 2);
}

#[test]
fn timeout_reports_unknown_not_unsat() {
    let (engine, solver) = standard_engine(SolverConfig::new().with_timeout_ms(0));
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ult(&engine.bitvec_val(3, 8).unwrap()).unwrap()).unwrap();
    match solver.check(&mut s, &[]) {
        Err(SigilError::Unknown(_)) => {}
        other => panic!("expected the unknown/timeout signal, got {other:?}"),
    }
}

#[test]
fn simplification_discovers_concreteness() {
    let (engine, _solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let zero = engine.bitvec_val(0, 8).unwrap();
    let prod = x.mul(&zero).unwrap();
    assert!(prod.is_symbolic().unwrap());

    let simplified = prod.simplify().unwrap();
    assert!(!simplified.is_symbolic().unwrap());
    assert!(simplified.variables().unwrap().is_empty());
    assert_eq!(
        simplified.concrete_value().unwrap(),
        Some(Value::BitVec(BitVec::zero(8)))
    );
}

#[test]
fn simplification_is_idempotent() {
    let (engine, _solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let zero = engine.bitvec_val(0, 8).unwrap();
    let e = x.add(&zero).unwrap();

    let s1 = e.simplify().unwrap();
    let s2 = s1.simplify().unwrap();
    assert_eq!(s1.model().unwrap(), s2.model().unwrap());
    // And the simplified form dropped the identity.
    assert!(engine.is_identical(&s1, &x));
}

#[test]
fn abstraction_round_trip_through_simplify() {
    let (engine, _solver) = standard_engine(SolverConfig::new());
    let a = engine.bitvec_explicit("a", 32).unwrap();
    let four = engine.bitvec_val(4, 32).unwrap();
    let sum = a.add(&four).unwrap();

    // Simplification lowers to a native term and abstracts it back; the
    // reconstructed tree keeps the operation, the named leaf, and the
    // literal.
    let back = sum.simplify().unwrap();
    assert!(back.is_symbolic().unwrap());
    assert!(back.variables().unwrap().contains("a"));
    assert_eq!(back.size().unwrap(), Some(32));
    let model = back.model().unwrap();
    let tree = model.as_tree().expect("still abstract");
    assert_eq!(tree.op(), OpKind::Add);
}

#[test]
fn split_round_trip_after_abstraction() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let c1 = x.ult(&engine.bitvec_val(3, 8).unwrap()).unwrap();
    let c2 = x.ne_(&engine.bitvec_val(1, 8).unwrap()).unwrap();
    let conj = engine.and_(&[c1, c2]).unwrap();

    // Lower and abstract with the default split boundary.
    let mut tm = sigil_solver::TermManager::new();
    let t = sigil_solver::lower::lower_expr(&mut tm, &conj).unwrap();
    let back = solver.abstract_term(&engine, &tm, t).unwrap();

    let parts = back.split(&[OpKind::And]).unwrap();
    assert_eq!(parts.len(), 2);

    // Re-conjoining the parts is equivalent to the original: same
    // satisfiable set.
    let rejoined = engine.and_(&parts).unwrap();
    let mut s1 = solver.new_session();
    s1.add(&conj).unwrap();
    let v1 = solver.eval(&mut s1, &x, 10, &[]).unwrap();
    let mut s2 = solver.new_session();
    s2.add(&rejoined).unwrap();
    let v2 = solver.eval(&mut s2, &x, 10, &[]).unwrap();
    assert_eq!(values_as_u64(&v1), values_as_u64(&v2));
}

#[test]
fn push_pop_scopes_nested_constraints() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x.ult(&engine.bitvec_val(100, 8).unwrap()).unwrap()).unwrap();

    s.push();
    s.add(&x.eq_(&engine.bitvec_val(5, 8).unwrap()).unwrap()).unwrap();
    s.push();
    s.add(&x.eq_(&engine.bitvec_val(6, 8).unwrap()).unwrap()).unwrap();
    assert!(!solver.check(&mut s, &[]).unwrap());
    s.pop().unwrap();
    // The outer frame's x == 5 still holds.
    assert!(solver.check(&mut s, &[]).unwrap());
    let v = solver.eval(&mut s, &x, 2, &[]).unwrap();
    assert_eq!(values_as_u64(&v), [5u64].into_iter().collect());
    s.pop().unwrap();
    assert!(solver.check(&mut s, &[]).unwrap());
}

#[test]
fn solving_over_arithmetic_circuits() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    let x = engine.bitvec("x", 8).unwrap();
    let y = engine.bitvec("y", 8).unwrap();
    let sum = x.add(&y).unwrap();
    let mut s = solver.new_session();
    s.add(&sum.eq_(&engine.bitvec_val(10, 8).unwrap()).unwrap()).unwrap();
    s.add(&x.eq_(&engine.bitvec_val(4, 8).unwrap()).unwrap()).unwrap();

    let v = solver.eval(&mut s, &y, 2, &[]).unwrap();
    assert_eq!(values_as_u64(&v), [6u64].into_iter().collect());
}

#[test]
fn unique_names_keep_variables_independent() {
    let (engine, solver) = standard_engine(SolverConfig::new());
    // Two leaves with the same base name are distinct variables.
    let x1 = engine.bitvec("x", 8).unwrap();
    let x2 = engine.bitvec("x", 8).unwrap();
    let mut s = solver.new_session();
    s.add(&x1.eq_(&engine.bitvec_val(1, 8).unwrap()).unwrap()).unwrap();
    s.add(&x2.eq_(&engine.bitvec_val(2, 8).unwrap()).unwrap()).unwrap();
    assert!(solver.check(&mut s, &[]).unwrap());
}
