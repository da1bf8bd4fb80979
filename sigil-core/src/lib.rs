//! Sigil Core - Operation Trees, Expressions, and Backend Dispatch
//!
//! This crate provides the expression substrate of the Sigil engine:
//! - Immutable operation trees with cached structural hashing and lazy,
//!   memoized bit-width inference ([`ast`])
//! - The [`Expr`] wrapper tracking free variables, symbolic status, and a
//!   deferred-operation queue ([`expr`])
//! - Operation metadata tables: length policies and the canonical/native
//!   name mapping ([`ops`])
//! - The ordered backend dispatch protocol with typed refusals
//!   ([`backend`], [`engine`])
//! - A pure concrete evaluator backend ([`concrete`])
//!
//! # Examples
//!
//! ## Building expressions
//!
//! ```
//! use sigil_core::{ConcreteBackend, Engine};
//! use std::sync::Arc;
//!
//! let engine = Engine::new(vec![Arc::new(ConcreteBackend::new())], vec![]);
//!
//! // Concrete operations fold immediately.
//! let a = engine.bitvec_val(40, 32)?;
//! let b = engine.bitvec_val(2, 32)?;
//! let sum = a.add(&b)?;
//! assert!(sum.is_concrete()?);
//!
//! // A symbolic operand keeps the tree abstract.
//! let x = engine.bitvec("x", 32)?;
//! let y = x.add(&sum)?;
//! assert!(y.is_symbolic()?);
//! assert_eq!(y.size()?, Some(32));
//! # Ok::<(), sigil_core::SigilError>(())
//! ```
//!
//! ## Width inference
//!
//! ```
//! use sigil_core::{ConcreteBackend, Engine};
//! use std::sync::Arc;
//!
//! let engine = Engine::new(vec![Arc::new(ConcreteBackend::new())], vec![]);
//! let x = engine.bitvec("x", 24)?;
//! let y = engine.bitvec("y", 8)?;
//! assert_eq!(x.concat(&y)?.size()?, Some(32));
//! assert_eq!(x.extract(15, 8)?.size()?, Some(8));
//! # Ok::<(), sigil_core::SigilError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod backend;
pub mod concrete;
pub mod counters;
pub mod engine;
pub mod error;
pub mod expr;
pub mod ops;
pub mod store;
pub mod value;

pub use ast::{Arg, Node};
pub use backend::Backend;
pub use concrete::ConcreteBackend;
pub use counters::Counters;
pub use engine::Engine;
pub use error::{BackendError, BackendResult, Result, SigilError};
pub use expr::{Expr, Model};
pub use ops::{LengthPolicy, OpKind};
pub use store::{ExprStore, Identity};
pub use value::{BitVec, Value};
