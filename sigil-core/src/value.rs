//! Concrete backend values: fixed-width bitvectors and booleans.
//!
//! [`BitVec`] is an unsigned value masked to its width. Arithmetic wraps
//! modulo `2^width`; division and remainder follow the SMT-LIB bitvector
//! semantics (`x udiv 0 = all-ones`, `x urem 0 = x`, and the sign rules of
//! `bvsdiv`/`bvsmod`), so the concrete evaluator and the solver backend
//! agree on every input.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete bitvector value of a fixed width.
///
/// The stored value is always `< 2^width`; constructors mask.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVec {
    value: BigUint,
    width: u32,
}

impl BitVec {
    /// Create a bitvector, masking `value` to `width` bits.
    #[must_use]
    pub fn new(value: BigUint, width: u32) -> Self {
        assert!(width > 0, "zero-width bitvector");
        Self {
            value: value & Self::mask(width),
            width,
        }
    }

    /// Create from a machine integer.
    #[must_use]
    pub fn from_u64(value: u64, width: u32) -> Self {
        Self::new(BigUint::from(value), width)
    }

    /// The all-zeros value of the given width.
    #[must_use]
    pub fn zero(width: u32) -> Self {
        Self::new(BigUint::zero(), width)
    }

    /// The all-ones value of the given width.
    #[must_use]
    pub fn ones(width: u32) -> Self {
        Self::new(Self::mask(width), width)
    }

    /// `2^width`.
    #[must_use]
    pub fn modulus(width: u32) -> BigUint {
        BigUint::one() << width
    }

    /// `2^width - 1`.
    #[must_use]
    pub fn mask(width: u32) -> BigUint {
        (BigUint::one() << width) - BigUint::one()
    }

    /// Width in bits.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The unsigned value.
    #[must_use]
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// The value as a `u64`, if it fits.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    /// True if the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Bit `i` (LSB is bit 0).
    #[must_use]
    pub fn bit(&self, i: u32) -> bool {
        self.value.bit(u64::from(i))
    }

    /// Two's-complement interpretation.
    #[must_use]
    pub fn to_signed(&self) -> BigInt {
        if self.bit(self.width - 1) {
            BigInt::from(self.value.clone()) - BigInt::from(Self::modulus(self.width))
        } else {
            BigInt::from(self.value.clone())
        }
    }

    /// Build from a signed value, wrapping modulo `2^width`.
    #[must_use]
    pub fn from_signed(value: &BigInt, width: u32) -> Self {
        let m = BigInt::from(Self::modulus(width));
        let mut v = value % &m;
        if v.sign() == Sign::Minus {
            v += &m;
        }
        let (_, mag) = v.into_parts();
        Self::new(mag, width)
    }

    // Wrapping arithmetic. Binary operations require equal widths; the
    // length-inference rules reject mismatches before evaluation.

    /// Wrapping addition.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        Self::new(&self.value + &other.value, self.width)
    }

    /// Wrapping subtraction.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        Self::new(
            &self.value + Self::modulus(self.width) - &other.value,
            self.width,
        )
    }

    /// Wrapping multiplication.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        Self::new(&self.value * &other.value, self.width)
    }

    /// Two's-complement negation.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self::zero(self.width).sub(self)
    }

    /// Unsigned division; `x udiv 0 = all-ones`.
    #[must_use]
    pub fn udiv(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        if other.is_zero() {
            Self::ones(self.width)
        } else {
            Self::new(&self.value / &other.value, self.width)
        }
    }

    /// Unsigned remainder; `x urem 0 = x`.
    #[must_use]
    pub fn urem(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        if other.is_zero() {
            self.clone()
        } else {
            Self::new(&self.value % &other.value, self.width)
        }
    }

    /// Signed division, truncating toward zero (`bvsdiv`).
    #[must_use]
    pub fn sdiv(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        let (a, b) = (self.to_signed(), other.to_signed());
        if b.is_zero() {
            // bvsdiv s 0 = ite(s < 0, 1, all-ones)
            if a.sign() == Sign::Minus {
                Self::from_u64(1, self.width)
            } else {
                Self::ones(self.width)
            }
        } else {
            Self::from_signed(&(a / b), self.width)
        }
    }

    /// Signed remainder with the sign of the divisor (`bvsmod`).
    #[must_use]
    pub fn smod(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        let (a, b) = (self.to_signed(), other.to_signed());
        let abs_a = a.magnitude().clone();
        let abs_b = b.magnitude().clone();
        let u = if abs_b.is_zero() { abs_a } else { abs_a % abs_b };
        let u = BigInt::from(u);
        let neg_a = a.sign() == Sign::Minus;
        let neg_b = b.sign() == Sign::Minus;
        let r = if u.is_zero() {
            u
        } else if !neg_a && !neg_b {
            u
        } else if neg_a && !neg_b {
            -u + b
        } else if !neg_a && neg_b {
            u + b
        } else {
            -u
        };
        Self::from_signed(&r, self.width)
    }

    /// Bitwise and.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        Self::new(&self.value & &other.value, self.width)
    }

    /// Bitwise or.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        Self::new(&self.value | &other.value, self.width)
    }

    /// Bitwise xor.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        assert_eq!(self.width, other.width);
        Self::new(&self.value ^ &other.value, self.width)
    }

    /// Bitwise complement.
    #[must_use]
    pub fn not(&self) -> Self {
        Self::new(Self::mask(self.width) ^ &self.value, self.width)
    }

    /// Logical shift left; shifts of `width` or more produce zero.
    #[must_use]
    pub fn shl(&self, shift: u64) -> Self {
        if shift >= u64::from(self.width) {
            Self::zero(self.width)
        } else {
            Self::new(&self.value << shift, self.width)
        }
    }

    /// Logical shift right; shifts of `width` or more produce zero.
    #[must_use]
    pub fn lshr(&self, shift: u64) -> Self {
        if shift >= u64::from(self.width) {
            Self::zero(self.width)
        } else {
            Self::new(&self.value >> shift, self.width)
        }
    }

    /// Arithmetic shift right; the sign bit fills vacated positions.
    #[must_use]
    pub fn ashr(&self, shift: u64) -> Self {
        let sign = self.bit(self.width - 1);
        if shift >= u64::from(self.width) {
            if sign {
                Self::ones(self.width)
            } else {
                Self::zero(self.width)
            }
        } else if sign {
            let fill = Self::mask(self.width) ^ (Self::mask(self.width) >> shift);
            Self::new((&self.value >> shift) | fill, self.width)
        } else {
            Self::new(&self.value >> shift, self.width)
        }
    }

    /// Rotate left by `amount` (taken modulo the width).
    #[must_use]
    pub fn rotate_left(&self, amount: u64) -> Self {
        let n = amount % u64::from(self.width);
        if n == 0 {
            self.clone()
        } else {
            self.shl(n).or(&self.lshr(u64::from(self.width) - n))
        }
    }

    /// Rotate right by `amount` (taken modulo the width).
    #[must_use]
    pub fn rotate_right(&self, amount: u64) -> Self {
        let n = amount % u64::from(self.width);
        self.rotate_left(u64::from(self.width) - n)
    }

    /// Reverse the byte order. The width must be a multiple of 8.
    #[must_use]
    pub fn reverse_bytes(&self) -> Self {
        assert_eq!(self.width % 8, 0, "byte reverse on a non-byte-sized value");
        let nbytes = self.width / 8;
        let mut out = BigUint::zero();
        for i in 0..nbytes {
            let byte = (&self.value >> (8 * i)) & BigUint::from(0xffu32);
            out |= byte << (8 * (nbytes - 1 - i));
        }
        Self::new(out, self.width)
    }

    /// Concatenate; `self` supplies the high-order bits.
    #[must_use]
    pub fn concat(&self, low: &Self) -> Self {
        Self::new(
            (&self.value << low.width) | &low.value,
            self.width + low.width,
        )
    }

    /// Extract bits `hi..=lo` (inclusive, LSB is bit 0).
    #[must_use]
    pub fn extract(&self, hi: u32, lo: u32) -> Self {
        assert!(lo <= hi && hi < self.width, "extract range out of bounds");
        Self::new(&self.value >> lo, hi - lo + 1)
    }

    /// Widen by `amount` zero bits.
    #[must_use]
    pub fn zero_extend(&self, amount: u32) -> Self {
        Self::new(self.value.clone(), self.width + amount)
    }

    /// Widen by `amount` copies of the sign bit.
    #[must_use]
    pub fn sign_extend(&self, amount: u32) -> Self {
        let width = self.width + amount;
        if self.bit(self.width - 1) {
            let fill = Self::mask(width) ^ Self::mask(self.width);
            Self::new(&self.value | fill, width)
        } else {
            Self::new(self.value.clone(), width)
        }
    }

    /// Unsigned less-than.
    #[must_use]
    pub fn ult(&self, other: &Self) -> bool {
        self.value < other.value
    }

    /// Unsigned less-or-equal.
    #[must_use]
    pub fn ule(&self, other: &Self) -> bool {
        self.value <= other.value
    }

    /// Signed less-than.
    #[must_use]
    pub fn slt(&self, other: &Self) -> bool {
        self.to_signed() < other.to_signed()
    }

    /// Signed less-or-equal.
    #[must_use]
    pub fn sle(&self, other: &Self) -> bool {
        self.to_signed() <= other.to_signed()
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}[{}]", self.value, self.width)
    }
}

/// A backend-native concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// A fixed-width bitvector.
    BitVec(BitVec),
    /// A boolean.
    Bool(bool),
    /// A plain integer argument (extract bounds, extension amounts).
    Uint(u64),
}

impl Value {
    /// Bit-width, if the value is a bitvector.
    #[must_use]
    pub fn width(&self) -> Option<u32> {
        match self {
            Value::BitVec(bv) => Some(bv.width()),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The bitvector, if this is one.
    #[must_use]
    pub fn as_bitvec(&self) -> Option<&BitVec> {
        match self {
            Value::BitVec(bv) => Some(bv),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::BitVec(bv) => bv.fmt(f),
            Value::Bool(b) => b.fmt(f),
            Value::Uint(n) => n.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_masks_to_width() {
        let bv = BitVec::from_u64(0x1ff, 8);
        assert_eq!(bv.as_u64(), Some(0xff));
        assert_eq!(bv.width(), 8);
    }

    #[test]
    fn arithmetic_wraps() {
        let a = BitVec::from_u64(0xff, 8);
        let b = BitVec::from_u64(2, 8);
        assert_eq!(a.add(&b).as_u64(), Some(1));
        assert_eq!(b.sub(&a).as_u64(), Some(3));
        assert_eq!(a.mul(&b).as_u64(), Some(0xfe));
        assert_eq!(b.neg().as_u64(), Some(0xfe));
    }

    #[test]
    fn division_by_zero_follows_smtlib() {
        let a = BitVec::from_u64(17, 8);
        let z = BitVec::zero(8);
        assert_eq!(a.udiv(&z).as_u64(), Some(0xff));
        assert_eq!(a.urem(&z).as_u64(), Some(17));
        // -3 sdiv 0 = 1, 3 sdiv 0 = -1
        let m3 = BitVec::from_u64(0xfd, 8);
        assert_eq!(m3.sdiv(&z).as_u64(), Some(1));
        assert_eq!(a.sdiv(&z).as_u64(), Some(0xff));
        assert_eq!(m3.smod(&z).as_u64(), Some(0xfd));
    }

    #[test]
    fn signed_division_truncates() {
        // -7 sdiv 2 = -3
        let a = BitVec::from_signed(&BigInt::from(-7), 8);
        let b = BitVec::from_u64(2, 8);
        assert_eq!(a.sdiv(&b).to_signed(), BigInt::from(-3));
        // bvsmod takes the divisor's sign: -7 smod 2 = 1
        assert_eq!(a.smod(&b).to_signed(), BigInt::from(1));
        // 7 smod -2 = -1
        let c = BitVec::from_u64(7, 8);
        let d = BitVec::from_signed(&BigInt::from(-2), 8);
        assert_eq!(c.smod(&d).to_signed(), BigInt::from(-1));
    }

    #[test]
    fn shifts_saturate_at_width() {
        let a = BitVec::from_u64(0x81, 8);
        assert_eq!(a.shl(1).as_u64(), Some(0x02));
        assert_eq!(a.lshr(1).as_u64(), Some(0x40));
        assert_eq!(a.ashr(1).as_u64(), Some(0xc0));
        assert_eq!(a.shl(8).as_u64(), Some(0));
        assert_eq!(a.lshr(200).as_u64(), Some(0));
        assert_eq!(a.ashr(200).as_u64(), Some(0xff));
    }

    #[test]
    fn rotates_wrap_modulo_width() {
        let a = BitVec::from_u64(0b1000_0001, 8);
        assert_eq!(a.rotate_left(1).as_u64(), Some(0b0000_0011));
        assert_eq!(a.rotate_right(1).as_u64(), Some(0b1100_0000));
        assert_eq!(a.rotate_left(8).as_u64(), a.as_u64());
        assert_eq!(a.rotate_left(9).as_u64(), Some(0b0000_0011));
    }

    #[test]
    fn structural_ops() {
        let hi = BitVec::from_u64(0xab, 8);
        let lo = BitVec::from_u64(0xcd, 8);
        let cat = hi.concat(&lo);
        assert_eq!(cat.width(), 16);
        assert_eq!(cat.as_u64(), Some(0xabcd));
        assert_eq!(cat.extract(15, 8).as_u64(), Some(0xab));
        assert_eq!(cat.extract(7, 0).as_u64(), Some(0xcd));
        assert_eq!(cat.reverse_bytes().as_u64(), Some(0xcdab));
        assert_eq!(hi.zero_extend(8).as_u64(), Some(0xab));
        assert_eq!(hi.sign_extend(8).as_u64(), Some(0xffab));
    }

    #[test]
    fn signed_comparisons_use_twos_complement() {
        let minus_one = BitVec::from_u64(0xff, 8);
        let one = BitVec::from_u64(1, 8);
        assert!(minus_one.slt(&one));
        assert!(one.ult(&minus_one));
        assert!(minus_one.sle(&minus_one));
    }
}
