//! The operation tree: immutable nodes with cached hashing and lazy,
//! memoized length inference.
//!
//! A [`Node`] is an operation name plus an ordered argument list. Arguments
//! may be nested nodes, wrapped expressions, or raw leaf values. Nodes are
//! never mutated after construction; the cached hash and width are filled
//! in on first use and are a pure function of the structure.

use crate::backend::Backend;
use crate::error::{Result, SigilError};
use crate::expr::Expr;
use crate::ops::{LengthPolicy, OpKind};
use crate::value::BitVec;
use rustc_hash::{FxHashSet, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// An operand of an operation tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arg {
    /// A nested operation tree.
    Node(Arc<Node>),
    /// A wrapped expression.
    Expr(Expr),
    /// A raw concrete bitvector.
    BitVec(BitVec),
    /// A raw boolean.
    Bool(bool),
    /// A plain integer (extract bounds, extension amounts, widths).
    Uint(u64),
    /// A name (symbolic leaf labels).
    Str(String),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Node(n) => n.fmt(f),
            Arg::Expr(e) => e.fmt(f),
            Arg::BitVec(bv) => bv.fmt(f),
            Arg::Bool(b) => b.fmt(f),
            Arg::Uint(n) => n.fmt(f),
            Arg::Str(s) => s.fmt(f),
        }
    }
}

/// An immutable operation tree node.
#[derive(Debug)]
pub struct Node {
    op: OpKind,
    args: Vec<Arg>,
    hash: OnceLock<u64>,
    length: OnceLock<Option<u32>>,
}

impl Node {
    /// Create a node. No validation happens here; width consistency is
    /// checked by [`Node::size`], which every construction path calls.
    #[must_use]
    pub fn new(op: OpKind, args: Vec<Arg>) -> Self {
        Self {
            op,
            args,
            hash: OnceLock::new(),
            length: OnceLock::new(),
        }
    }

    /// The operation.
    #[must_use]
    pub fn op(&self) -> OpKind {
        self.op
    }

    /// The ordered operands.
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// The structural hash over `(op, args)`, cached after the first
    /// computation. Structurally equal nodes hash equal.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        *self.hash.get_or_init(|| {
            let mut h = FxHasher::default();
            self.op.hash(&mut h);
            for a in &self.args {
                a.hash(&mut h);
            }
            h.finish()
        })
    }

    /// The bit-width of an operand, resolved per the rules of the length
    /// policies: expressions report their own size, nested nodes recurse,
    /// and raw values are sized by the first backend that can.
    fn arg_size(backends: &[Arc<dyn Backend>], arg: &Arg) -> Result<Option<u32>> {
        match arg {
            Arg::Expr(e) => e.size(),
            Arg::Node(n) => n.size(backends),
            Arg::BitVec(bv) => Ok(Some(bv.width())),
            other => {
                for b in backends {
                    if let Ok(v) = b.convert(other) {
                        if let Ok(w) = b.size_of(&v) {
                            return Ok(Some(w));
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    /// The bit-width of this tree, or `None` for boolean-valued trees.
    ///
    /// Computed lazily from the operation's [`LengthPolicy`] and memoized;
    /// inconsistent or unknown operand widths are an error, never a silent
    /// default.
    pub fn size(&self, backends: &[Arc<dyn Backend>]) -> Result<Option<u32>> {
        if let Some(len) = self.length.get() {
            return Ok(*len);
        }
        let len = self.calculate_length(backends)?;
        Ok(*self.length.get_or_init(|| len))
    }

    fn uint_arg(&self, index: usize) -> Result<u64> {
        match self.args.get(index) {
            Some(Arg::Uint(n)) => Ok(*n),
            _ => Err(SigilError::Operation(format!(
                "operation {} expects an integer argument at position {index}",
                self.op
            ))),
        }
    }

    fn calculate_length(&self, backends: &[Arc<dyn Backend>]) -> Result<Option<u32>> {
        match self.op.length_policy() {
            LengthPolicy::NoLength => Ok(None),
            LengthPolicy::SameLength => {
                // For If only the branches are compared; the condition is
                // boolean and excluded.
                let args = if self.op == OpKind::If {
                    self.args.get(1..).unwrap_or(&[])
                } else {
                    &self.args[..]
                };
                let mut widths: FxHashSet<Option<u32>> = FxHashSet::default();
                for a in args {
                    widths.insert(Self::arg_size(backends, a)?);
                }
                if widths.len() != 1 {
                    return Err(SigilError::SizeInference(format!(
                        "invalid length combination for operation {}",
                        self.op
                    )));
                }
                let mut it = widths.into_iter();
                match it.next() {
                    Some(w) => Ok(w),
                    None => Err(SigilError::SizeInference(format!(
                        "operation {} has no operands to size",
                        self.op
                    ))),
                }
            }
            LengthPolicy::LengthChange => self.calculate_changed_length(backends),
            LengthPolicy::LengthNew => {
                let w = self.uint_arg(1)?;
                let w = u32::try_from(w).map_err(|_| {
                    SigilError::SizeInference(format!("declared width {w} is out of range"))
                })?;
                Ok(Some(w))
            }
        }
    }

    fn calculate_changed_length(&self, backends: &[Arc<dyn Backend>]) -> Result<Option<u32>> {
        match self.op {
            OpKind::SignExt | OpKind::ZeroExt => {
                let amount = self.uint_arg(0)?;
                let amount = u32::try_from(amount).map_err(|_| {
                    SigilError::SizeInference(format!("extension amount {amount} is out of range"))
                })?;
                let arg = self.args.get(1).ok_or_else(|| {
                    SigilError::Operation(format!("{} expects two arguments", self.op))
                })?;
                let width = Self::arg_size(backends, arg)?.ok_or_else(|| {
                    SigilError::Type("extending a value without a width".into())
                })?;
                Ok(Some(width + amount))
            }
            OpKind::Concat => {
                if self.args.is_empty() {
                    return Err(SigilError::Operation("concatenation of nothing".into()));
                }
                let mut total = 0u32;
                for a in &self.args {
                    let w = Self::arg_size(backends, a)?.ok_or_else(|| {
                        SigilError::Type("concatenating a value without a width".into())
                    })?;
                    total += w;
                }
                Ok(Some(total))
            }
            OpKind::Extract => {
                let hi = self.uint_arg(0)?;
                let lo = self.uint_arg(1)?;
                if lo > hi {
                    return Err(SigilError::SizeInference(format!(
                        "extract bounds are inverted: [{hi}:{lo}]"
                    )));
                }
                let arg = self.args.get(2).ok_or_else(|| {
                    SigilError::Operation("Extract expects three arguments".into())
                })?;
                let width = Self::arg_size(backends, arg)?.ok_or_else(|| {
                    SigilError::Type("extracting from a value without a width".into())
                })?;
                if hi >= u64::from(width) {
                    return Err(SigilError::SizeInference(format!(
                        "extract range [{hi}:{lo}] exceeds operand width {width}"
                    )));
                }
                let w = u32::try_from(hi - lo + 1).map_err(|_| {
                    SigilError::SizeInference(format!("extract width {} out of range", hi - lo + 1))
                })?;
                Ok(Some(w))
            }
            op => Err(SigilError::Operation(format!(
                "unknown length-changing operation {op}"
            ))),
        }
    }

    /// Union the free-variable names and symbolic flags of every operand
    /// into `vars`/`symbolic`. A named symbolic leaf contributes its name.
    pub fn collect_metadata(&self, vars: &mut FxHashSet<String>, symbolic: &mut bool) -> Result<()> {
        if self.op == OpKind::BitVecSym {
            if let Some(Arg::Str(name)) = self.args.first() {
                vars.insert(name.clone());
                *symbolic = true;
            } else {
                return Err(SigilError::Operation(
                    "symbolic leaf without a name".into(),
                ));
            }
        }
        for a in &self.args {
            match a {
                Arg::Node(n) => n.collect_metadata(vars, symbolic)?,
                Arg::Expr(e) => {
                    let v = e.variables()?;
                    vars.extend(v.iter().cloned());
                    *symbolic |= e.is_symbolic()?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op
            && self.structural_hash() == other.structural_hash()
            && self.args == other.args
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.structural_hash());
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            a.fmt(f)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_backends() -> Vec<Arc<dyn Backend>> {
        Vec::new()
    }

    fn sym(name: &str, width: u32) -> Arc<Node> {
        Arc::new(Node::new(
            OpKind::BitVecSym,
            vec![Arg::Str(name.into()), Arg::Uint(u64::from(width))],
        ))
    }

    #[test]
    fn structurally_equal_nodes_hash_equal() {
        let a = Node::new(
            OpKind::Add,
            vec![Arg::Node(sym("x", 32)), Arg::BitVec(BitVec::from_u64(4, 32))],
        );
        let b = Node::new(
            OpKind::Add,
            vec![Arg::Node(sym("x", 32)), Arg::BitVec(BitVec::from_u64(4, 32))],
        );
        assert_eq!(a, b);
        assert_eq!(a.structural_hash(), b.structural_hash());

        let c = Node::new(
            OpKind::Add,
            vec![Arg::Node(sym("y", 32)), Arg::BitVec(BitVec::from_u64(4, 32))],
        );
        assert_ne!(a, c);
    }

    #[test]
    fn same_length_rejects_mismatched_widths() {
        let n = Node::new(
            OpKind::Add,
            vec![Arg::Node(sym("x", 32)), Arg::Node(sym("y", 16))],
        );
        assert!(matches!(
            n.size(&no_backends()),
            Err(SigilError::SizeInference(_))
        ));
    }

    #[test]
    fn concat_sums_and_extract_subtracts() {
        let n = Node::new(
            OpKind::Concat,
            vec![Arg::Node(sym("x", 24)), Arg::Node(sym("y", 8))],
        );
        assert_eq!(n.size(&no_backends()).unwrap(), Some(32));

        let e = Node::new(
            OpKind::Extract,
            vec![Arg::Uint(15), Arg::Uint(8), Arg::Node(sym("x", 32))],
        );
        assert_eq!(e.size(&no_backends()).unwrap(), Some(8));
    }

    #[test]
    fn extract_out_of_range_is_a_construction_error() {
        let e = Node::new(
            OpKind::Extract,
            vec![Arg::Uint(32), Arg::Uint(0), Arg::Node(sym("x", 32))],
        );
        assert!(matches!(
            e.size(&no_backends()),
            Err(SigilError::SizeInference(_))
        ));
    }

    #[test]
    fn extensions_add_to_operand_width() {
        let e = Node::new(
            OpKind::ZeroExt,
            vec![Arg::Uint(32), Arg::Node(sym("x", 32))],
        );
        assert_eq!(e.size(&no_backends()).unwrap(), Some(64));
    }

    #[test]
    fn comparisons_have_no_length() {
        let n = Node::new(
            OpKind::Ult,
            vec![Arg::Node(sym("x", 32)), Arg::Node(sym("y", 32))],
        );
        assert_eq!(n.size(&no_backends()).unwrap(), None);
    }

    #[test]
    fn size_is_memoized() {
        let n = Node::new(
            OpKind::Concat,
            vec![Arg::Node(sym("x", 8)), Arg::Node(sym("y", 8))],
        );
        assert_eq!(n.size(&no_backends()).unwrap(), Some(16));
        // Second call hits the cache.
        assert_eq!(n.size(&no_backends()).unwrap(), Some(16));
    }

    #[test]
    fn metadata_collects_nested_names() {
        let n = Node::new(
            OpKind::Add,
            vec![Arg::Node(sym("x", 8)), Arg::Node(sym("y", 8))],
        );
        let mut vars = FxHashSet::default();
        let mut symbolic = false;
        n.collect_metadata(&mut vars, &mut symbolic).unwrap();
        assert!(symbolic);
        assert_eq!(vars.len(), 2);
        assert!(vars.contains("x") && vars.contains("y"));
    }
}
