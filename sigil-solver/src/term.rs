//! The solver-native term representation.
//!
//! Terms live in a hash-consed arena: structurally equal terms share one
//! [`TermId`], so equality is pointer equality and traversals can memoize
//! by id. Every constructor sort-checks its operands; range parameters for
//! extraction, extension, and rotation are carried structurally on the
//! term kind, so they can be recovered exactly without any string
//! round-tripping.

use lasso::{Rodeo, Spur};
use rustc_hash::FxHashMap;
use sigil_core::{BitVec, OpKind, Result, SigilError};
use smallvec::SmallVec;
use std::fmt;

/// An interned term reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    /// The term's index into the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The sort of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Boolean.
    Bool,
    /// A bitvector of the given width.
    BitVec(u32),
}

impl Sort {
    /// The bit-width, if this is a bitvector sort.
    #[must_use]
    pub fn width(self) -> Option<u32> {
        match self {
            Sort::Bool => None,
            Sort::BitVec(w) => Some(w),
        }
    }

    /// True for the boolean sort.
    #[must_use]
    pub fn is_bool(self) -> bool {
        self == Sort::Bool
    }
}

/// A native term operator with its operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// Boolean constant.
    BoolConst(bool),
    /// Bitvector constant.
    BvConst(BitVec),
    /// Uninterpreted bitvector constant (a free variable).
    Var {
        /// Interned variable name.
        name: Spur,
        /// Width in bits.
        width: u32,
    },

    /// Boolean negation.
    Not(TermId),
    /// N-ary conjunction.
    And(Vec<TermId>),
    /// N-ary disjunction.
    Or(Vec<TermId>),
    /// Equality (boolean or bitvector operands).
    Eq(TermId, TermId),
    /// Disequality.
    Ne(TermId, TermId),
    /// Unsigned less-than.
    Ult(TermId, TermId),
    /// Unsigned less-or-equal.
    Ule(TermId, TermId),
    /// Signed less-than.
    Slt(TermId, TermId),
    /// Signed less-or-equal.
    Sle(TermId, TermId),
    /// Conditional.
    Ite(TermId, TermId, TermId),

    /// Wrapping addition.
    Add(TermId, TermId),
    /// Wrapping subtraction.
    Sub(TermId, TermId),
    /// Wrapping multiplication.
    Mul(TermId, TermId),
    /// Signed division.
    Sdiv(TermId, TermId),
    /// Signed remainder with the divisor's sign.
    Smod(TermId, TermId),
    /// Two's-complement negation.
    Neg(TermId),
    /// Bitwise complement.
    BvNot(TermId),
    /// Bitwise and.
    BvAnd(TermId, TermId),
    /// Bitwise or.
    BvOr(TermId, TermId),
    /// Bitwise xor.
    BvXor(TermId, TermId),
    /// Logical shift left.
    Shl(TermId, TermId),
    /// Logical shift right.
    Lshr(TermId, TermId),
    /// Arithmetic shift right.
    Ashr(TermId, TermId),
    /// Rotate left by an expression amount.
    RotateLeft(TermId, TermId),
    /// Rotate right by an expression amount.
    RotateRight(TermId, TermId),
    /// Concatenation, high-order operand first.
    Concat(Vec<TermId>),
    /// Bit extraction with structural bounds.
    Extract {
        /// High bit, inclusive.
        hi: u32,
        /// Low bit, inclusive.
        lo: u32,
        /// Operand.
        arg: TermId,
    },
    /// Sign extension with a structural amount.
    SignExt {
        /// Number of bits added.
        amount: u32,
        /// Operand.
        arg: TermId,
    },
    /// Zero extension with a structural amount.
    ZeroExt {
        /// Number of bits added.
        amount: u32,
        /// Operand.
        arg: TermId,
    },
    /// Byte-order reversal.
    Reverse(TermId),
}

impl TermKind {
    /// The canonical operation this native operator maps to, or `None`
    /// for leaves. This is the native-to-canonical direction of the name
    /// table; abstraction is built on it.
    #[must_use]
    pub fn canonical_op(&self) -> Option<OpKind> {
        use TermKind::*;
        Some(match self {
            BoolConst(_) | BvConst(_) | Var { .. } => return None,
            Not(_) => OpKind::Not,
            And(_) => OpKind::And,
            Or(_) => OpKind::Or,
            Eq(..) => OpKind::Eq,
            Ne(..) => OpKind::Ne,
            Ult(..) => OpKind::Ult,
            Ule(..) => OpKind::Ule,
            Slt(..) => OpKind::Slt,
            Sle(..) => OpKind::Sle,
            Ite(..) => OpKind::If,
            Add(..) => OpKind::Add,
            Sub(..) => OpKind::Sub,
            Mul(..) => OpKind::Mul,
            Sdiv(..) => OpKind::SDiv,
            Smod(..) => OpKind::SMod,
            Neg(_) => OpKind::Neg,
            BvNot(_) => OpKind::BvNot,
            BvAnd(..) => OpKind::BvAnd,
            BvOr(..) => OpKind::BvOr,
            BvXor(..) => OpKind::BvXor,
            Shl(..) => OpKind::Shl,
            Lshr(..) => OpKind::LShR,
            Ashr(..) => OpKind::AShR,
            RotateLeft(..) => OpKind::RotateLeft,
            RotateRight(..) => OpKind::RotateRight,
            Concat(_) => OpKind::Concat,
            Extract { .. } => OpKind::Extract,
            SignExt { .. } => OpKind::SignExt,
            ZeroExt { .. } => OpKind::ZeroExt,
            Reverse(_) => OpKind::Reverse,
        })
    }

    /// The operand terms, in order.
    #[must_use]
    pub fn children(&self) -> SmallVec<[TermId; 3]> {
        use TermKind::*;
        match self {
            BoolConst(_) | BvConst(_) | Var { .. } => SmallVec::new(),
            Not(a) | Neg(a) | BvNot(a) | Reverse(a) => SmallVec::from_slice(&[*a]),
            Extract { arg, .. } | SignExt { arg, .. } | ZeroExt { arg, .. } => {
                SmallVec::from_slice(&[*arg])
            }
            Eq(a, b) | Ne(a, b) | Ult(a, b) | Ule(a, b) | Slt(a, b) | Sle(a, b) | Add(a, b)
            | Sub(a, b) | Mul(a, b) | Sdiv(a, b) | Smod(a, b) | BvAnd(a, b) | BvOr(a, b)
            | BvXor(a, b) | Shl(a, b) | Lshr(a, b) | Ashr(a, b) | RotateLeft(a, b)
            | RotateRight(a, b) => SmallVec::from_slice(&[*a, *b]),
            Ite(c, t, e) => SmallVec::from_slice(&[*c, *t, *e]),
            And(xs) | Or(xs) | Concat(xs) => xs.iter().copied().collect(),
        }
    }
}

/// A term: an operator plus its computed sort.
#[derive(Debug, Clone)]
pub struct Term {
    kind: TermKind,
    sort: Sort,
}

impl Term {
    /// The operator.
    #[must_use]
    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    /// The sort.
    #[must_use]
    pub fn sort(&self) -> Sort {
        self.sort
    }
}

/// The hash-consing term arena.
#[derive(Debug, Default)]
pub struct TermManager {
    terms: Vec<Term>,
    dedup: FxHashMap<TermKind, TermId>,
    names: Rodeo,
}

impl TermManager {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if no terms have been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Look up a term.
    #[must_use]
    pub fn get(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    /// The operator of a term.
    #[must_use]
    pub fn kind(&self, id: TermId) -> &TermKind {
        &self.terms[id.index()].kind
    }

    /// The sort of a term.
    #[must_use]
    pub fn sort(&self, id: TermId) -> Sort {
        self.terms[id.index()].sort
    }

    /// The bit-width of a term, if it is a bitvector.
    #[must_use]
    pub fn width(&self, id: TermId) -> Option<u32> {
        self.sort(id).width()
    }

    /// Resolve an interned variable name.
    #[must_use]
    pub fn resolve_name(&self, name: Spur) -> &str {
        self.names.resolve(&name)
    }

    fn intern(&mut self, kind: TermKind, sort: Sort) -> TermId {
        if let Some(&id) = self.dedup.get(&kind) {
            return id;
        }
        let id = TermId(u32::try_from(self.terms.len()).unwrap_or(u32::MAX));
        self.dedup.insert(kind.clone(), id);
        self.terms.push(Term { kind, sort });
        id
    }

    fn expect_bool(&self, id: TermId) -> Result<()> {
        if self.sort(id).is_bool() {
            Ok(())
        } else {
            Err(SigilError::Type("expected a boolean term".into()))
        }
    }

    fn expect_bv(&self, id: TermId) -> Result<u32> {
        self.width(id)
            .ok_or_else(|| SigilError::Type("expected a bitvector term".into()))
    }

    fn expect_same_bv(&self, a: TermId, b: TermId) -> Result<u32> {
        let (wa, wb) = (self.expect_bv(a)?, self.expect_bv(b)?);
        if wa != wb {
            return Err(SigilError::Type(format!(
                "operand widths differ: {wa} vs {wb}"
            )));
        }
        Ok(wa)
    }

    /// Boolean constant.
    pub fn mk_bool(&mut self, value: bool) -> TermId {
        self.intern(TermKind::BoolConst(value), Sort::Bool)
    }

    /// Bitvector constant.
    pub fn mk_bv_const(&mut self, value: BitVec) -> TermId {
        let w = value.width();
        self.intern(TermKind::BvConst(value), Sort::BitVec(w))
    }

    /// Uninterpreted bitvector constant.
    pub fn mk_var(&mut self, name: &str, width: u32) -> Result<TermId> {
        if width == 0 {
            return Err(SigilError::SizeInference("zero-width variable".into()));
        }
        let name = self.names.get_or_intern(name);
        Ok(self.intern(TermKind::Var { name, width }, Sort::BitVec(width)))
    }

    /// Boolean negation.
    pub fn mk_not(&mut self, a: TermId) -> Result<TermId> {
        self.expect_bool(a)?;
        Ok(self.intern(TermKind::Not(a), Sort::Bool))
    }

    /// N-ary conjunction. Empty is true, a singleton is the operand.
    pub fn mk_and(&mut self, operands: Vec<TermId>) -> Result<TermId> {
        for &o in &operands {
            self.expect_bool(o)?;
        }
        match operands.len() {
            0 => Ok(self.mk_bool(true)),
            1 => Ok(operands[0]),
            _ => Ok(self.intern(TermKind::And(operands), Sort::Bool)),
        }
    }

    /// N-ary disjunction. Empty is false, a singleton is the operand.
    pub fn mk_or(&mut self, operands: Vec<TermId>) -> Result<TermId> {
        for &o in &operands {
            self.expect_bool(o)?;
        }
        match operands.len() {
            0 => Ok(self.mk_bool(false)),
            1 => Ok(operands[0]),
            _ => Ok(self.intern(TermKind::Or(operands), Sort::Bool)),
        }
    }

    /// Equality over two terms of one sort.
    pub fn mk_eq(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        if self.sort(a) != self.sort(b) {
            return Err(SigilError::Type("equality over mismatched sorts".into()));
        }
        Ok(self.intern(TermKind::Eq(a, b), Sort::Bool))
    }

    /// Disequality over two terms of one sort.
    pub fn mk_ne(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        if self.sort(a) != self.sort(b) {
            return Err(SigilError::Type("disequality over mismatched sorts".into()));
        }
        Ok(self.intern(TermKind::Ne(a, b), Sort::Bool))
    }

    /// Unsigned less-than.
    pub fn mk_ult(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.expect_same_bv(a, b)?;
        Ok(self.intern(TermKind::Ult(a, b), Sort::Bool))
    }

    /// Unsigned less-or-equal.
    pub fn mk_ule(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.expect_same_bv(a, b)?;
        Ok(self.intern(TermKind::Ule(a, b), Sort::Bool))
    }

    /// Unsigned greater-than, normalized to a swapped less-than.
    pub fn mk_ugt(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.mk_ult(b, a)
    }

    /// Unsigned greater-or-equal, normalized to a swapped less-or-equal.
    pub fn mk_uge(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.mk_ule(b, a)
    }

    /// Signed less-than.
    pub fn mk_slt(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.expect_same_bv(a, b)?;
        Ok(self.intern(TermKind::Slt(a, b), Sort::Bool))
    }

    /// Signed less-or-equal.
    pub fn mk_sle(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.expect_same_bv(a, b)?;
        Ok(self.intern(TermKind::Sle(a, b), Sort::Bool))
    }

    /// Signed greater-than, normalized to a swapped less-than.
    pub fn mk_sgt(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.mk_slt(b, a)
    }

    /// Signed greater-or-equal, normalized to a swapped less-or-equal.
    pub fn mk_sge(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.mk_sle(b, a)
    }

    /// Conditional over same-sorted branches.
    pub fn mk_ite(&mut self, cond: TermId, then: TermId, els: TermId) -> Result<TermId> {
        self.expect_bool(cond)?;
        let sort = self.sort(then);
        if sort != self.sort(els) {
            return Err(SigilError::Type(
                "conditional branches have mismatched sorts".into(),
            ));
        }
        Ok(self.intern(TermKind::Ite(cond, then, els), sort))
    }

    fn bv_binary(
        &mut self,
        a: TermId,
        b: TermId,
        make: fn(TermId, TermId) -> TermKind,
    ) -> Result<TermId> {
        let w = self.expect_same_bv(a, b)?;
        Ok(self.intern(make(a, b), Sort::BitVec(w)))
    }

    /// Wrapping addition.
    pub fn mk_add(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Add)
    }

    /// Wrapping subtraction.
    pub fn mk_sub(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Sub)
    }

    /// Wrapping multiplication.
    pub fn mk_mul(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Mul)
    }

    /// Signed division.
    pub fn mk_sdiv(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Sdiv)
    }

    /// Signed remainder with the divisor's sign.
    pub fn mk_smod(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Smod)
    }

    /// Two's-complement negation.
    pub fn mk_neg(&mut self, a: TermId) -> Result<TermId> {
        let w = self.expect_bv(a)?;
        Ok(self.intern(TermKind::Neg(a), Sort::BitVec(w)))
    }

    /// Bitwise complement.
    pub fn mk_bvnot(&mut self, a: TermId) -> Result<TermId> {
        let w = self.expect_bv(a)?;
        Ok(self.intern(TermKind::BvNot(a), Sort::BitVec(w)))
    }

    /// Bitwise and.
    pub fn mk_bvand(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::BvAnd)
    }

    /// Bitwise or.
    pub fn mk_bvor(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::BvOr)
    }

    /// Bitwise xor.
    pub fn mk_bvxor(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::BvXor)
    }

    /// Logical shift left.
    pub fn mk_shl(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Shl)
    }

    /// Logical shift right.
    pub fn mk_lshr(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Lshr)
    }

    /// Arithmetic shift right.
    pub fn mk_ashr(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::Ashr)
    }

    /// Rotate left by an expression amount.
    pub fn mk_rotate_left(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::RotateLeft)
    }

    /// Rotate right by an expression amount.
    pub fn mk_rotate_right(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        self.bv_binary(a, b, TermKind::RotateRight)
    }

    /// Concatenation, high-order operand first. A singleton is the
    /// operand itself.
    pub fn mk_concat(&mut self, operands: Vec<TermId>) -> Result<TermId> {
        if operands.is_empty() {
            return Err(SigilError::Operation("concatenation of nothing".into()));
        }
        let mut total = 0u32;
        for &o in &operands {
            total += self.expect_bv(o)?;
        }
        if operands.len() == 1 {
            return Ok(operands[0]);
        }
        Ok(self.intern(TermKind::Concat(operands), Sort::BitVec(total)))
    }

    /// Bit extraction.
    pub fn mk_extract(&mut self, hi: u32, lo: u32, arg: TermId) -> Result<TermId> {
        let w = self.expect_bv(arg)?;
        if lo > hi || hi >= w {
            return Err(SigilError::SizeInference(format!(
                "extract range [{hi}:{lo}] out of bounds for width {w}"
            )));
        }
        Ok(self.intern(
            TermKind::Extract { hi, lo, arg },
            Sort::BitVec(hi - lo + 1),
        ))
    }

    /// Sign extension. A zero amount is the operand itself.
    pub fn mk_sign_ext(&mut self, amount: u32, arg: TermId) -> Result<TermId> {
        let w = self.expect_bv(arg)?;
        if amount == 0 {
            return Ok(arg);
        }
        Ok(self.intern(TermKind::SignExt { amount, arg }, Sort::BitVec(w + amount)))
    }

    /// Zero extension. A zero amount is the operand itself.
    pub fn mk_zero_ext(&mut self, amount: u32, arg: TermId) -> Result<TermId> {
        let w = self.expect_bv(arg)?;
        if amount == 0 {
            return Ok(arg);
        }
        Ok(self.intern(TermKind::ZeroExt { amount, arg }, Sort::BitVec(w + amount)))
    }

    /// Byte-order reversal; the width must be a multiple of 8.
    pub fn mk_reverse(&mut self, arg: TermId) -> Result<TermId> {
        let w = self.expect_bv(arg)?;
        if w % 8 != 0 {
            return Err(SigilError::Type(
                "byte reverse on a non-byte-sized term".into(),
            ));
        }
        Ok(self.intern(TermKind::Reverse(arg), Sort::BitVec(w)))
    }

    /// Rebuild a term kind over replacement children, re-checking sorts
    /// and re-interning. The replacement list must match
    /// [`TermKind::children`] in length and order.
    pub fn rebuild(&mut self, kind: &TermKind, children: &[TermId]) -> Result<TermId> {
        use TermKind::*;
        let child = |i: usize| -> Result<TermId> {
            children.get(i).copied().ok_or_else(|| {
                SigilError::Operation("rebuild with too few children".into())
            })
        };
        match kind {
            BoolConst(b) => Ok(self.mk_bool(*b)),
            BvConst(bv) => Ok(self.mk_bv_const(bv.clone())),
            Var { name, width } => {
                Ok(self.intern(
                    Var {
                        name: *name,
                        width: *width,
                    },
                    Sort::BitVec(*width),
                ))
            }
            Not(_) => {
                let a = child(0)?;
                self.mk_not(a)
            }
            And(_) => self.mk_and(children.to_vec()),
            Or(_) => self.mk_or(children.to_vec()),
            Eq(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_eq(a, b)
            }
            Ne(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_ne(a, b)
            }
            Ult(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_ult(a, b)
            }
            Ule(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_ule(a, b)
            }
            Slt(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_slt(a, b)
            }
            Sle(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_sle(a, b)
            }
            Ite(..) => {
                let (c, t, e) = (child(0)?, child(1)?, child(2)?);
                self.mk_ite(c, t, e)
            }
            Add(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_add(a, b)
            }
            Sub(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_sub(a, b)
            }
            Mul(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_mul(a, b)
            }
            Sdiv(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_sdiv(a, b)
            }
            Smod(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_smod(a, b)
            }
            Neg(_) => {
                let a = child(0)?;
                self.mk_neg(a)
            }
            BvNot(_) => {
                let a = child(0)?;
                self.mk_bvnot(a)
            }
            BvAnd(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_bvand(a, b)
            }
            BvOr(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_bvor(a, b)
            }
            BvXor(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_bvxor(a, b)
            }
            Shl(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_shl(a, b)
            }
            Lshr(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_lshr(a, b)
            }
            Ashr(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_ashr(a, b)
            }
            RotateLeft(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_rotate_left(a, b)
            }
            RotateRight(..) => {
                let (a, b) = (child(0)?, child(1)?);
                self.mk_rotate_right(a, b)
            }
            Concat(_) => self.mk_concat(children.to_vec()),
            Extract { hi, lo, .. } => {
                let a = child(0)?;
                self.mk_extract(*hi, *lo, a)
            }
            SignExt { amount, .. } => {
                let a = child(0)?;
                self.mk_sign_ext(*amount, a)
            }
            ZeroExt { amount, .. } => {
                let a = child(0)?;
                self.mk_zero_ext(*amount, a)
            }
            Reverse(_) => {
                let a = child(0)?;
                self.mk_reverse(a)
            }
        }
    }

    /// An SMT-style printer for a term.
    #[must_use]
    pub fn display(&self, id: TermId) -> TermDisplay<'_> {
        TermDisplay { tm: self, id }
    }
}

/// Displays a term as an s-expression with native operator names.
pub struct TermDisplay<'a> {
    tm: &'a TermManager,
    id: TermId,
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_term(self.tm, self.id, f)
    }
}

fn fmt_term(tm: &TermManager, id: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match tm.kind(id) {
        TermKind::BoolConst(b) => write!(f, "{b}"),
        TermKind::BvConst(bv) => write!(f, "{bv}"),
        TermKind::Var { name, .. } => write!(f, "{}", tm.resolve_name(*name)),
        TermKind::Extract { hi, lo, arg } => {
            write!(f, "((_ extract {hi} {lo}) ")?;
            fmt_term(tm, *arg, f)?;
            write!(f, ")")
        }
        TermKind::SignExt { amount, arg } => {
            write!(f, "((_ sign_extend {amount}) ")?;
            fmt_term(tm, *arg, f)?;
            write!(f, ")")
        }
        TermKind::ZeroExt { amount, arg } => {
            write!(f, "((_ zero_extend {amount}) ")?;
            fmt_term(tm, *arg, f)?;
            write!(f, ")")
        }
        kind => {
            let name = kind
                .canonical_op()
                .map_or("?", sigil_core::OpKind::native_name);
            write!(f, "({name}")?;
            for c in kind.children() {
                write!(f, " ")?;
                fmt_term(tm, c, f)?;
            }
            write!(f, ")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_consing_dedupes_structurally_equal_terms() {
        let mut tm = TermManager::new();
        let x1 = tm.mk_var("x", 8).unwrap();
        let x2 = tm.mk_var("x", 8).unwrap();
        assert_eq!(x1, x2);

        let c = tm.mk_bv_const(BitVec::from_u64(1, 8));
        let a1 = tm.mk_add(x1, c).unwrap();
        let a2 = tm.mk_add(x2, c).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn constructors_check_sorts() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let y = tm.mk_var("y", 16).unwrap();
        let t = tm.mk_bool(true);
        assert!(tm.mk_add(x, y).is_err());
        assert!(tm.mk_eq(x, t).is_err());
        assert!(tm.mk_not(x).is_err());
        assert!(tm.mk_extract(8, 0, x).is_err());
    }

    #[test]
    fn sorts_follow_the_operation() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let y = tm.mk_var("y", 8).unwrap();
        let add = tm.mk_add(x, y).unwrap();
        assert_eq!(tm.sort(add), Sort::BitVec(8));
        let ult = tm.mk_ult(x, y).unwrap();
        assert_eq!(tm.sort(ult), Sort::Bool);
        let cat = tm.mk_concat(vec![x, y]).unwrap();
        assert_eq!(tm.width(cat), Some(16));
        let ex = tm.mk_extract(3, 0, x).unwrap();
        assert_eq!(tm.width(ex), Some(4));
        let se = tm.mk_sign_ext(8, x).unwrap();
        assert_eq!(tm.width(se), Some(16));
    }

    #[test]
    fn display_uses_native_names() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let c = tm.mk_bv_const(BitVec::from_u64(4, 8));
        let add = tm.mk_add(x, c).unwrap();
        assert_eq!(format!("{}", tm.display(add)), "(bvadd x 0x4[8])");
        let ex = tm.mk_extract(3, 0, x).unwrap();
        assert_eq!(format!("{}", tm.display(ex)), "((_ extract 3 0) x)");
    }
}
