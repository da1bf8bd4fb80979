//! Bit-blasting: native terms down to CNF.
//!
//! Every bitvector term becomes a vector of literals (LSB first) and every
//! boolean term a single literal, with Tseitin-encoded gates in between:
//! ripple-carry adders, shift-add multiplication, barrel shifters for
//! symbolic shift amounts, and restoring long division (which yields the
//! SMT-LIB division-by-zero results without special cases). Terms are
//! blasted once and cached by id; hash-consing upstream makes the cache
//! effective.

use crate::term::{TermId, TermKind, TermManager};
use rustc_hash::FxHashMap;
use sigil_core::{BitVec, Result, SigilError};
use sigil_sat::{LBool, Lit, Solver};
use smallvec::SmallVec;

/// The literals of one bitvector term, LSB first.
pub type Bits = SmallVec<[Lit; 32]>;

/// Reads the unsigned value of a literal vector under a SAT model.
#[must_use]
pub fn bits_value(model: &[LBool], bits: &[Lit]) -> BitVec {
    let mut value = num_bigint::BigUint::default();
    for (i, l) in bits.iter().enumerate() {
        let assigned = model[l.var().index()];
        let truth = if l.is_positive() {
            assigned.is_true()
        } else {
            assigned.is_false()
        };
        if truth {
            value.set_bit(i as u64, true);
        }
    }
    BitVec::new(value, u32::try_from(bits.len()).unwrap_or(u32::MAX))
}

/// Blasts terms from one arena into one SAT instance.
pub struct BitBlaster<'a> {
    tm: &'a TermManager,
    sat: &'a mut Solver,
    bv_cache: FxHashMap<TermId, Bits>,
    bool_cache: FxHashMap<TermId, Lit>,
    true_lit: Lit,
}

impl<'a> BitBlaster<'a> {
    /// Create a blaster over the given arena and SAT instance. Allocates
    /// one variable pinned true to represent constants.
    pub fn new(tm: &'a TermManager, sat: &'a mut Solver) -> Self {
        let t = sat.new_var();
        sat.add_clause([Lit::pos(t)]);
        Self {
            tm,
            sat,
            bv_cache: FxHashMap::default(),
            bool_cache: FxHashMap::default(),
            true_lit: Lit::pos(t),
        }
    }

    /// Assert a boolean term as a constraint.
    pub fn assert_term(&mut self, t: TermId) -> Result<()> {
        let l = self.bool_term(t)?;
        self.sat.add_clause([l]);
        Ok(())
    }

    /// The blasted variables, for model read-back.
    #[must_use]
    pub fn variable_bits(&self) -> Vec<(TermId, Bits)> {
        self.bv_cache
            .iter()
            .filter(|(t, _)| matches!(self.tm.kind(**t), TermKind::Var { .. }))
            .map(|(t, bits)| (*t, bits.clone()))
            .collect()
    }

    fn lit_const(&self, b: bool) -> Lit {
        if b {
            self.true_lit
        } else {
            self.true_lit.negate()
        }
    }

    fn fresh(&mut self) -> Lit {
        Lit::pos(self.sat.new_var())
    }

    // Tseitin gates, with shortcuts for the pinned constant literal.

    fn and2(&mut self, a: Lit, b: Lit) -> Lit {
        let (t, f) = (self.true_lit, self.true_lit.negate());
        if a == t {
            return b;
        }
        if b == t {
            return a;
        }
        if a == f || b == f || a == b.negate() {
            return f;
        }
        if a == b {
            return a;
        }
        let o = self.fresh();
        self.sat.add_clause([o.negate(), a]);
        self.sat.add_clause([o.negate(), b]);
        self.sat.add_clause([o, a.negate(), b.negate()]);
        o
    }

    fn or2(&mut self, a: Lit, b: Lit) -> Lit {
        self.and2(a.negate(), b.negate()).negate()
    }

    fn xor2(&mut self, a: Lit, b: Lit) -> Lit {
        let (t, f) = (self.true_lit, self.true_lit.negate());
        if a == t {
            return b.negate();
        }
        if a == f {
            return b;
        }
        if b == t {
            return a.negate();
        }
        if b == f {
            return a;
        }
        if a == b {
            return f;
        }
        if a == b.negate() {
            return t;
        }
        let o = self.fresh();
        self.sat.add_clause([o.negate(), a.negate(), b.negate()]);
        self.sat.add_clause([o.negate(), a, b]);
        self.sat.add_clause([o, a.negate(), b]);
        self.sat.add_clause([o, a, b.negate()]);
        o
    }

    /// `sel ? then : els`.
    fn mux(&mut self, sel: Lit, then: Lit, els: Lit) -> Lit {
        let (t, f) = (self.true_lit, self.true_lit.negate());
        if sel == t {
            return then;
        }
        if sel == f {
            return els;
        }
        if then == els {
            return then;
        }
        let o = self.fresh();
        self.sat.add_clause([sel.negate(), then.negate(), o]);
        self.sat.add_clause([sel.negate(), then, o.negate()]);
        self.sat.add_clause([sel, els.negate(), o]);
        self.sat.add_clause([sel, els, o.negate()]);
        o
    }

    fn and_many(&mut self, lits: &[Lit]) -> Lit {
        let mut acc = self.true_lit;
        for &l in lits {
            acc = self.and2(acc, l);
        }
        acc
    }

    fn or_many(&mut self, lits: &[Lit]) -> Lit {
        let mut acc = self.true_lit.negate();
        for &l in lits {
            acc = self.or2(acc, l);
        }
        acc
    }

    // Word-level circuits over literal vectors.

    fn const_bits(&self, bv: &BitVec) -> Bits {
        (0..bv.width()).map(|i| self.lit_const(bv.bit(i))).collect()
    }

    fn adder(&mut self, a: &[Lit], b: &[Lit], mut carry: Lit) -> (Bits, Lit) {
        let mut out = Bits::new();
        for i in 0..a.len() {
            let axb = self.xor2(a[i], b[i]);
            out.push(self.xor2(axb, carry));
            let c1 = self.and2(a[i], b[i]);
            let c2 = self.and2(axb, carry);
            carry = self.or2(c1, c2);
        }
        (out, carry)
    }

    fn sub_bits(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let nb: Bits = b.iter().map(|l| l.negate()).collect();
        self.adder(a, &nb, self.true_lit).0
    }

    fn negate_bits(&mut self, a: &[Lit]) -> Bits {
        let zero: Bits = a.iter().map(|_| self.lit_const(false)).collect();
        self.sub_bits(&zero, a)
    }

    /// `a < b` unsigned: no carry out of `a + !b + 1`.
    fn ult_bits(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let nb: Bits = b.iter().map(|l| l.negate()).collect();
        let (_, carry) = self.adder(a, &nb, self.true_lit);
        carry.negate()
    }

    fn ule_bits(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        self.ult_bits(b, a).negate()
    }

    /// Signed comparison by flipping the sign bits.
    fn flip_sign(bits: &[Lit]) -> Bits {
        let mut out: Bits = bits.iter().copied().collect();
        if let Some(last) = out.last_mut() {
            *last = last.negate();
        }
        out
    }

    fn slt_bits(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let (fa, fb) = (Self::flip_sign(a), Self::flip_sign(b));
        self.ult_bits(&fa, &fb)
    }

    fn sle_bits(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        self.slt_bits(b, a).negate()
    }

    fn eq_bits(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let diffs: Vec<Lit> = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| self.xor2(x, y))
            .collect();
        self.or_many(&diffs).negate()
    }

    fn mux_bits(&mut self, sel: Lit, then: &[Lit], els: &[Lit]) -> Bits {
        then.iter()
            .zip(els.iter())
            .map(|(&t, &e)| self.mux(sel, t, e))
            .collect()
    }

    fn mul_bits(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let w = a.len();
        let mut acc: Bits = (0..w).map(|_| self.lit_const(false)).collect();
        for i in 0..w {
            let addend: Bits = (0..w)
                .map(|k| {
                    if k < i {
                        self.lit_const(false)
                    } else {
                        self.and2(a[k - i], b[i])
                    }
                })
                .collect();
            acc = self.adder(&acc, &addend, self.lit_const(false)).0;
        }
        acc
    }

    /// Restoring long division over `width + 1`-bit registers. With a zero
    /// divisor the compare always succeeds, producing an all-ones quotient
    /// and the dividend as remainder, exactly the SMT-LIB results.
    fn udivrem_bits(&mut self, a: &[Lit], b: &[Lit]) -> (Bits, Bits) {
        let w = a.len();
        let f = self.lit_const(false);
        let mut rem: Vec<Lit> = vec![f; w + 1];
        let mut bext: Vec<Lit> = b.to_vec();
        bext.push(f);
        let mut quot: Vec<Lit> = vec![f; w];
        for i in (0..w).rev() {
            // rem = (rem << 1) | a[i]; the shifted-out top bit is always
            // zero because rem < b <= 2^w - 1 after each step.
            let mut shifted: Vec<Lit> = Vec::with_capacity(w + 1);
            shifted.push(a[i]);
            shifted.extend_from_slice(&rem[..w]);
            let ge = self.ule_bits(&bext, &shifted);
            let diff = self.sub_bits(&shifted, &bext);
            rem = self.mux_bits(ge, &diff, &shifted).to_vec();
            quot[i] = ge;
        }
        (quot.into_iter().collect(), rem[..w].iter().copied().collect())
    }

    fn sdiv_bits(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let w = a.len();
        let (sa, sb) = (a[w - 1], b[w - 1]);
        let na = self.negate_bits(a);
        let abs_a = self.mux_bits(sa, &na, a);
        let nb = self.negate_bits(b);
        let abs_b = self.mux_bits(sb, &nb, b);
        let (q, _) = self.udivrem_bits(&abs_a, &abs_b);
        let nq = self.negate_bits(&q);
        let flip = self.xor2(sa, sb);
        self.mux_bits(flip, &nq, &q)
    }

    fn smod_bits(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let w = a.len();
        let (sa, sb) = (a[w - 1], b[w - 1]);
        let na = self.negate_bits(a);
        let abs_a = self.mux_bits(sa, &na, a);
        let nb = self.negate_bits(b);
        let abs_b = self.mux_bits(sb, &nb, b);
        let (_, u) = self.udivrem_bits(&abs_a, &abs_b);
        let u_zero = {
            let u_vec: Vec<Lit> = u.iter().copied().collect();
            self.or_many(&u_vec).negate()
        };
        let nu = self.negate_bits(&u);
        // Sign cases of bvsmod: u, -u + b, u + b, -u.
        let f = self.lit_const(false);
        let v2 = self.adder(&nu, b, f).0;
        let v3 = self.adder(&u, b, f).0;
        let neg_branch = self.mux_bits(sb, &nu, &v2);
        let pos_branch = self.mux_bits(sb, &v3, &u);
        let nonzero = self.mux_bits(sa, &neg_branch, &pos_branch);
        self.mux_bits(u_zero, &u, &nonzero)
    }

    fn shift_bits(&mut self, a: &[Lit], amount: &[Lit], kind: ShiftKind) -> Bits {
        let w = a.len();
        let fill = match kind {
            ShiftKind::Shl | ShiftKind::Lshr => self.lit_const(false),
            ShiftKind::Ashr => a[w - 1],
        };
        let mut stages = 0usize;
        while (1usize << stages) < w {
            stages += 1;
        }
        let mut cur: Bits = a.iter().copied().collect();
        for s in 0..stages.min(amount.len()) {
            let k = 1usize << s;
            let shifted: Bits = (0..w)
                .map(|j| match kind {
                    ShiftKind::Shl => {
                        if j >= k {
                            cur[j - k]
                        } else {
                            fill
                        }
                    }
                    ShiftKind::Lshr | ShiftKind::Ashr => {
                        if j + k < w {
                            cur[j + k]
                        } else {
                            fill
                        }
                    }
                })
                .collect();
            cur = self.mux_bits(amount[s], &shifted, &cur);
        }
        // Any amount bit beyond the barrel stages shifts everything out.
        let high = &amount[stages.min(amount.len())..];
        if !high.is_empty() {
            let over = self.or_many(high);
            let full: Bits = (0..w).map(|_| fill).collect();
            cur = self.mux_bits(over, &full, &cur);
        }
        cur
    }

    fn rotate_bits(&mut self, a: &[Lit], amount: &[Lit], left: bool) -> Result<Bits> {
        let w = a.len();
        let w32 = u32::try_from(w)
            .map_err(|_| SigilError::SizeInference("rotation width out of range".into()))?;
        // Rotation amount modulo the width.
        let wconst = self.const_bits(&BitVec::from_u64(w as u64, w32));
        let (_, m) = self.udivrem_bits(amount, &wconst);
        let mut per_bit: Vec<Vec<Lit>> = vec![Vec::with_capacity(w); w];
        for k in 0..w {
            let kconst = self.const_bits(&BitVec::from_u64(k as u64, w32));
            let is_k = self.eq_bits(&m, &kconst);
            for (j, slots) in per_bit.iter_mut().enumerate() {
                let src = if left { (j + w - k) % w } else { (j + k) % w };
                let picked = self.and2(is_k, a[src]);
                slots.push(picked);
            }
        }
        Ok(per_bit.iter().map(|slots| self.or_many(slots)).collect())
    }

    /// The literal of a boolean term.
    pub fn bool_term(&mut self, t: TermId) -> Result<Lit> {
        if let Some(&l) = self.bool_cache.get(&t) {
            return Ok(l);
        }
        let kind = self.tm.kind(t).clone();
        let l = match kind {
            TermKind::BoolConst(b) => self.lit_const(b),
            TermKind::Not(x) => self.bool_term(x)?.negate(),
            TermKind::And(xs) => {
                let ls = xs
                    .iter()
                    .map(|&x| self.bool_term(x))
                    .collect::<Result<Vec<_>>>()?;
                self.and_many(&ls)
            }
            TermKind::Or(xs) => {
                let ls = xs
                    .iter()
                    .map(|&x| self.bool_term(x))
                    .collect::<Result<Vec<_>>>()?;
                self.or_many(&ls)
            }
            TermKind::Eq(a, b) | TermKind::Ne(a, b) => {
                let eq = if self.tm.sort(a).is_bool() {
                    let (la, lb) = (self.bool_term(a)?, self.bool_term(b)?);
                    self.xor2(la, lb).negate()
                } else {
                    let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                    self.eq_bits(&ba, &bb)
                };
                if matches!(self.tm.kind(t), TermKind::Eq(..)) {
                    eq
                } else {
                    eq.negate()
                }
            }
            TermKind::Ult(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.ult_bits(&ba, &bb)
            }
            TermKind::Ule(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.ule_bits(&ba, &bb)
            }
            TermKind::Slt(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.slt_bits(&ba, &bb)
            }
            TermKind::Sle(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.sle_bits(&ba, &bb)
            }
            TermKind::Ite(c, x, y) => {
                let lc = self.bool_term(c)?;
                let (lx, ly) = (self.bool_term(x)?, self.bool_term(y)?);
                self.mux(lc, lx, ly)
            }
            _ => return Err(SigilError::Type("expected a boolean term".into())),
        };
        self.bool_cache.insert(t, l);
        Ok(l)
    }

    /// The literal vector of a bitvector term.
    pub fn bv_term(&mut self, t: TermId) -> Result<Bits> {
        if let Some(bits) = self.bv_cache.get(&t) {
            return Ok(bits.clone());
        }
        let kind = self.tm.kind(t).clone();
        let bits: Bits = match kind {
            TermKind::BvConst(bv) => self.const_bits(&bv),
            TermKind::Var { width, .. } => (0..width).map(|_| self.fresh()).collect(),
            TermKind::Add(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                let f = self.lit_const(false);
                self.adder(&ba, &bb, f).0
            }
            TermKind::Sub(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.sub_bits(&ba, &bb)
            }
            TermKind::Mul(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.mul_bits(&ba, &bb)
            }
            TermKind::Sdiv(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.sdiv_bits(&ba, &bb)
            }
            TermKind::Smod(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.smod_bits(&ba, &bb)
            }
            TermKind::Neg(a) => {
                let ba = self.bv_term(a)?;
                self.negate_bits(&ba)
            }
            TermKind::BvNot(a) => {
                let ba = self.bv_term(a)?;
                ba.iter().map(|l| l.negate()).collect()
            }
            TermKind::BvAnd(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                ba.iter()
                    .zip(bb.iter())
                    .map(|(&x, &y)| self.and2(x, y))
                    .collect()
            }
            TermKind::BvOr(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                ba.iter()
                    .zip(bb.iter())
                    .map(|(&x, &y)| self.or2(x, y))
                    .collect()
            }
            TermKind::BvXor(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                ba.iter()
                    .zip(bb.iter())
                    .map(|(&x, &y)| self.xor2(x, y))
                    .collect()
            }
            TermKind::Shl(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.shift_bits(&ba, &bb, ShiftKind::Shl)
            }
            TermKind::Lshr(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.shift_bits(&ba, &bb, ShiftKind::Lshr)
            }
            TermKind::Ashr(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.shift_bits(&ba, &bb, ShiftKind::Ashr)
            }
            TermKind::RotateLeft(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.rotate_bits(&ba, &bb, true)?
            }
            TermKind::RotateRight(a, b) => {
                let (ba, bb) = (self.bv_term(a)?, self.bv_term(b)?);
                self.rotate_bits(&ba, &bb, false)?
            }
            TermKind::Concat(xs) => {
                // High-order operand first; LSB-first storage puts the
                // last operand's bits lowest.
                let mut bits = Bits::new();
                for &x in xs.iter().rev() {
                    let bx = self.bv_term(x)?;
                    bits.extend(bx);
                }
                bits
            }
            TermKind::Extract { hi, lo, arg } => {
                let ba = self.bv_term(arg)?;
                ba[lo as usize..=hi as usize].iter().copied().collect()
            }
            TermKind::SignExt { amount, arg } => {
                let ba = self.bv_term(arg)?;
                let sign = ba[ba.len() - 1];
                let mut bits = ba;
                bits.extend((0..amount).map(|_| sign));
                bits
            }
            TermKind::ZeroExt { amount, arg } => {
                let mut bits = self.bv_term(arg)?;
                let f = self.lit_const(false);
                bits.extend((0..amount).map(|_| f));
                bits
            }
            TermKind::Reverse(arg) => {
                let ba = self.bv_term(arg)?;
                let nbytes = ba.len() / 8;
                let mut bits = Bits::new();
                for byte in (0..nbytes).rev() {
                    bits.extend(ba[byte * 8..byte * 8 + 8].iter().copied());
                }
                bits
            }
            TermKind::Ite(c, x, y) => {
                let lc = self.bool_term(c)?;
                let (bx, by) = (self.bv_term(x)?, self.bv_term(y)?);
                self.mux_bits(lc, &bx, &by)
            }
            _ => return Err(SigilError::Type("expected a bitvector term".into())),
        };
        self.bv_cache.insert(t, bits.clone());
        Ok(bits)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ShiftKind {
    Shl,
    Lshr,
    Ashr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_sat::SolverResult;

    /// Constrain `term == expected` and check satisfiability; then flip to
    /// a wrong value and expect unsat. Exercises the circuit both ways.
    fn assert_circuit(tm: &mut TermManager, term: TermId, expected: &BitVec) {
        let good = tm.mk_bv_const(expected.clone());
        let eq = tm.mk_eq(term, good).unwrap();
        let mut sat = Solver::new();
        let mut bl = BitBlaster::new(tm, &mut sat);
        bl.assert_term(eq).unwrap();
        drop(bl);
        assert_eq!(sat.solve(), SolverResult::Sat, "expected value rejected");

        let wrong = BitVec::new(expected.value() ^ num_bigint::BigUint::from(1u32), expected.width());
        let bad = tm.mk_bv_const(wrong);
        let ne = tm.mk_eq(term, bad).unwrap();
        let mut sat = Solver::new();
        let mut bl = BitBlaster::new(tm, &mut sat);
        bl.assert_term(ne).unwrap();
        drop(bl);
        assert_eq!(sat.solve(), SolverResult::Unsat, "wrong value accepted");
    }

    fn const8(tm: &mut TermManager, v: u64) -> TermId {
        tm.mk_bv_const(BitVec::from_u64(v, 8))
    }

    #[test]
    fn adder_circuit_matches_concrete_addition() {
        let mut tm = TermManager::new();
        let a = const8(&mut tm, 200);
        let b = const8(&mut tm, 100);
        let sum = tm.mk_add(a, b).unwrap();
        assert_circuit(&mut tm, sum, &BitVec::from_u64(44, 8));
    }

    #[test]
    fn multiplier_circuit_wraps() {
        let mut tm = TermManager::new();
        let a = const8(&mut tm, 20);
        let b = const8(&mut tm, 13);
        let prod = tm.mk_mul(a, b).unwrap();
        assert_circuit(&mut tm, prod, &BitVec::from_u64(4, 8));
    }

    #[test]
    fn division_circuit_handles_zero_divisor() {
        let mut tm = TermManager::new();
        let a = const8(&mut tm, 17);
        let z = const8(&mut tm, 0);
        // 17 sdiv 0 = all-ones; 17 smod 0 = 17.
        let q = tm.mk_sdiv(a, z).unwrap();
        assert_circuit(&mut tm, q, &BitVec::from_u64(0xff, 8));
        let r = tm.mk_smod(a, z).unwrap();
        assert_circuit(&mut tm, r, &BitVec::from_u64(17, 8));
    }

    #[test]
    fn signed_division_circuit_truncates() {
        let mut tm = TermManager::new();
        let a = const8(&mut tm, 0xf9); // -7
        let b = const8(&mut tm, 2);
        let q = tm.mk_sdiv(a, b).unwrap();
        assert_circuit(&mut tm, q, &BitVec::from_u64(0xfd, 8)); // -3
        let r = tm.mk_smod(a, b).unwrap();
        assert_circuit(&mut tm, r, &BitVec::from_u64(1, 8));
    }

    #[test]
    fn shift_circuits_saturate() {
        let mut tm = TermManager::new();
        let a = const8(&mut tm, 0x81);
        let one = const8(&mut tm, 1);
        let nine = const8(&mut tm, 9);
        let shl = tm.mk_shl(a, one).unwrap();
        assert_circuit(&mut tm, shl, &BitVec::from_u64(0x02, 8));
        let lshr = tm.mk_lshr(a, one).unwrap();
        assert_circuit(&mut tm, lshr, &BitVec::from_u64(0x40, 8));
        let ashr = tm.mk_ashr(a, one).unwrap();
        assert_circuit(&mut tm, ashr, &BitVec::from_u64(0xc0, 8));
        let gone = tm.mk_lshr(a, nine).unwrap();
        assert_circuit(&mut tm, gone, &BitVec::from_u64(0, 8));
        let sign_fill = tm.mk_ashr(a, nine).unwrap();
        assert_circuit(&mut tm, sign_fill, &BitVec::from_u64(0xff, 8));
    }

    #[test]
    fn rotate_circuit_wraps_modulo_width() {
        let mut tm = TermManager::new();
        let a = const8(&mut tm, 0b1000_0001);
        let nine = const8(&mut tm, 9);
        let rot = tm.mk_rotate_left(a, nine).unwrap();
        assert_circuit(&mut tm, rot, &BitVec::from_u64(0b0000_0011, 8));
    }

    #[test]
    fn structural_circuits() {
        let mut tm = TermManager::new();
        let hi = const8(&mut tm, 0xab);
        let lo = const8(&mut tm, 0xcd);
        let cat = tm.mk_concat(vec![hi, lo]).unwrap();
        assert_circuit(&mut tm, cat, &BitVec::from_u64(0xabcd, 16));
        let ex = tm.mk_extract(15, 8, cat).unwrap();
        assert_circuit(&mut tm, ex, &BitVec::from_u64(0xab, 8));
        let rev = tm.mk_reverse(cat).unwrap();
        assert_circuit(&mut tm, rev, &BitVec::from_u64(0xcdab, 16));
        let se = tm.mk_sign_ext(8, hi).unwrap();
        assert_circuit(&mut tm, se, &BitVec::from_u64(0xffab, 16));
    }

    #[test]
    fn signed_comparison_circuit() {
        let mut tm = TermManager::new();
        let minus_one = const8(&mut tm, 0xff);
        let one = const8(&mut tm, 1);
        let lt = tm.mk_slt(minus_one, one).unwrap();
        let mut sat = Solver::new();
        let mut bl = BitBlaster::new(&tm, &mut sat);
        bl.assert_term(lt).unwrap();
        drop(bl);
        assert_eq!(sat.solve(), SolverResult::Sat);

        let gt = tm.mk_slt(one, minus_one).unwrap();
        let mut sat = Solver::new();
        let mut bl = BitBlaster::new(&tm, &mut sat);
        bl.assert_term(gt).unwrap();
        drop(bl);
        assert_eq!(sat.solve(), SolverResult::Unsat);
    }

    #[test]
    fn variable_bits_are_read_back() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", 8).unwrap();
        let c = const8(&mut tm, 42);
        let eq = tm.mk_eq(x, c).unwrap();
        let mut sat = Solver::new();
        let mut bl = BitBlaster::new(&tm, &mut sat);
        bl.assert_term(eq).unwrap();
        let vars = bl.variable_bits();
        drop(bl);
        assert_eq!(sat.solve(), SolverResult::Sat);
        assert_eq!(vars.len(), 1);
        let (vt, bits) = &vars[0];
        assert_eq!(*vt, x);
        assert_eq!(bits_value(sat.model(), bits).as_u64(), Some(42));
    }
}
