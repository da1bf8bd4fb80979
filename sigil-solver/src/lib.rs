//! Sigil Solver - the SMT-style solver backend.
//!
//! This crate resolves Sigil expressions against a self-contained
//! bit-blasting decision procedure:
//! - A hash-consed native term arena with structural range parameters
//!   ([`term`])
//! - Lowering from operation trees to native terms ([`lower`]) and
//!   abstraction back ([`abstraction`])
//! - CNF bit-blasting over the `sigil-sat` core ([`blast`])
//! - Scoped, stateful solving sessions ([`session`]) with bounded model
//!   enumeration, binary-search optimization, and retained models
//!   ([`backend`], [`model`])
//! - A tactic pipeline for native-term simplification ([`tactic`])
//!
//! # Examples
//!
//! ```
//! use sigil_solver::{standard_engine, SolverConfig};
//!
//! let (engine, solver) = standard_engine(SolverConfig::new());
//! let x = engine.bitvec("x", 8)?;
//! let three = engine.bitvec_val(3, 8)?;
//!
//! let mut session = solver.new_session();
//! session.add(&x.ult(&three)?)?;
//!
//! assert!(solver.check(&mut session, &[])?);
//! let values = solver.eval(&mut session, &x, 10, &[])?;
//! assert_eq!(values.len(), 3); // exactly 0, 1, and 2
//! # Ok::<(), sigil_core::SigilError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod abstraction;
pub mod backend;
pub mod blast;
pub mod config;
pub mod lower;
pub mod model;
pub mod session;
pub mod tactic;
pub mod term;

pub use backend::{SmtBackend, SolveResult};
pub use config::SolverConfig;
pub use model::SolverModel;
pub use session::{Session, SessionState};
pub use term::{Sort, Term, TermId, TermKind, TermManager};

use sigil_core::{Backend, ConcreteBackend, Counters, Engine};
use std::sync::Arc;

/// Wire up the standard stack: a concrete model backend tried first, this
/// solver backend behind it, one shared counter service.
#[must_use]
pub fn standard_engine(config: SolverConfig) -> (Engine, Arc<SmtBackend>) {
    let counters = Arc::new(Counters::new());
    let solver = Arc::new(SmtBackend::with_parts(config, Arc::clone(&counters)));
    let model_backends: Vec<Arc<dyn Backend>> = vec![Arc::new(ConcreteBackend::new())];
    let solver_backends: Vec<Arc<dyn Backend>> = vec![solver.clone()];
    let engine = Engine::with_parts(model_backends, solver_backends, counters, true);
    (engine, solver)
}
