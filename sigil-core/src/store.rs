//! The persistence-collaborator interface.
//!
//! The engine does not persist anything itself; an external store keeps
//! expressions by [`Identity`]. Expressions compute their identity lazily
//! from the resolved model and variable set, so structurally equal
//! expressions share one identity.

use crate::error::Result;
use crate::expr::Expr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable identifier for an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An external expression store.
pub trait ExprStore: Send + Sync {
    /// Persist an expression, returning its identity.
    fn store(&self, expr: &Expr) -> Result<Identity>;

    /// Load a previously stored expression.
    fn load(&self, id: Identity) -> Result<Expr>;
}
