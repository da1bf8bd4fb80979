//! The backend capability protocol.
//!
//! A backend converts canonical arguments into its native values, applies
//! canonical operations over them, and answers size/truth/identity queries.
//! Backends are tried in the order the engine was configured with; a
//! [`BackendError`] refusal falls through to the next backend, and only the
//! dispatch loops catch it. There is no universal evaluator anywhere else.

use crate::ast::{Arg, Node};
use crate::engine::Engine;
use crate::error::{BackendError, BackendResult};
use crate::expr::Expr;
use crate::ops::OpKind;
use crate::value::Value;
use std::fmt;
use tracing::trace;

/// A pluggable evaluation backend.
///
/// Implementors must be stateless with respect to expressions; any solving
/// state lives in a separate session object owned by the caller.
pub trait Backend: fmt::Debug + Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Convert a canonical argument into a backend-native value.
    fn convert(&self, arg: &Arg) -> BackendResult<Value>;

    /// Apply a canonical operation over backend-native values.
    fn call(&self, op: OpKind, args: &[Value]) -> BackendResult<Value>;

    /// The bit-width of a native value.
    fn size_of(&self, value: &Value) -> BackendResult<u32> {
        value
            .width()
            .ok_or(BackendError::Unsupported("value has no width"))
    }

    /// Whether a native value is definitely true.
    fn is_true(&self, value: &Value) -> BackendResult<bool> {
        value
            .as_bool()
            .ok_or(BackendError::Unsupported("not a truth value"))
    }

    /// Whether a native value is definitely false.
    fn is_false(&self, value: &Value) -> BackendResult<bool> {
        match value.as_bool() {
            Some(b) => Ok(!b),
            None => Err(BackendError::Unsupported("not a truth value")),
        }
    }

    /// Whether two expressions have identical underlying models.
    fn identical(&self, _a: &Expr, _b: &Expr) -> BackendResult<bool> {
        Err(BackendError::Unsupported("identity checking"))
    }

    /// Fold an operation tree into a native value by recursively
    /// converting the operands and applying the operation.
    fn resolve(&self, node: &Node) -> BackendResult<Value> {
        let mut values = Vec::with_capacity(node.args().len());
        for a in node.args() {
            match a {
                Arg::Node(n) => values.push(self.resolve(n)?),
                other => values.push(self.convert(other)?),
            }
        }
        trace!(backend = self.name(), op = %node.op(), "trying evaluation");
        self.call(node.op(), &values)
    }

    /// Produce a simplified equivalent of an expression.
    fn simplify(&self, _engine: &Engine, _expr: &Expr) -> BackendResult<Expr> {
        Err(BackendError::Unsupported("simplification"))
    }
}
