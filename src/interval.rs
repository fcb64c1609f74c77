//! Closed intervals over extended integers.
//!
//! An [`Interval`] is a pair `[lo, hi]` of [`Abst`] bounds. It is empty iff
//! either bound is [`Abst::Undefined`]; the canonical empty interval has both
//! bounds undefined and prints as `[empty set]`.
//!
//! Arithmetic is the usual interval arithmetic, evaluated at the corners and
//! clamped through the [`Bounds`] passed to every operation. Comparison
//! transfers ([`Interval::compare`]) refine both operands under the assumption
//! that a [`Relation`] holds. This is what lets the interval analysis split
//! its state along the two edges of a conditional branch.
//!
//! # Example
//!
//! ```
//! use dataflow_rs::abst::Bounds;
//! use dataflow_rs::interval::{Interval, Relation};
//!
//! let bounds = Bounds::unbounded();
//! let x = Interval::range(5, 10, &bounds);
//! let y = Interval::range(8, 12, &bounds);
//!
//! let (x_eq, y_eq) = Interval::compare(Relation::Eq, &x, &y, &bounds);
//! assert_eq!(x_eq, Interval::range(8, 10, &bounds));
//! assert_eq!(y_eq, Interval::range(8, 10, &bounds));
//!
//! assert_eq!(x.union_with(&y).to_string(), "[5, 12]");
//! ```

use std::fmt;

use log::warn;

use crate::abst::{Abst, Bounds};

/// Closed interval `[lo, hi]`, or empty.
///
/// # Invariants
///
/// - A non-empty interval has both bounds defined and `lo <= hi`.
/// - An empty interval has both bounds [`Abst::Undefined`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Interval {
    lo: Abst,
    hi: Abst,
}

impl Interval {
    /// Creates `[lo, hi]`.
    ///
    /// An undefined bound yields the empty interval. `lo > hi` is a malformed
    /// construction: it is reported as a warning and also yields the empty interval.
    pub fn new(lo: Abst, hi: Abst) -> Self {
        if lo.is_undef() || hi.is_undef() {
            return Interval::empty();
        }
        if lo > hi {
            warn!("malformed interval: lo ({}) > hi ({}), using the empty set", lo, hi);
            return Interval::empty();
        }
        Interval { lo, hi }
    }

    pub const fn empty() -> Self {
        Interval {
            lo: Abst::Undefined,
            hi: Abst::Undefined,
        }
    }

    /// `[-inf, +inf]`.
    pub const fn top() -> Self {
        Interval {
            lo: Abst::NegInf,
            hi: Abst::PosInf,
        }
    }

    pub fn singleton(value: Abst) -> Self {
        Interval::new(value, value)
    }

    /// Singleton of a literal, clamped into `bounds`.
    pub fn constant(value: i64, bounds: &Bounds) -> Self {
        Interval::singleton(bounds.clamp(value as i128))
    }

    /// `[lo, hi]` from literals, clamped into `bounds`.
    pub fn range(lo: i64, hi: i64, bounds: &Bounds) -> Self {
        Interval::new(bounds.clamp(lo as i128), bounds.clamp(hi as i128))
    }

    pub fn lo(&self) -> Abst {
        self.lo
    }

    pub fn hi(&self) -> Abst {
        self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.lo.is_undef() || self.hi.is_undef()
    }

    pub fn is_singleton(&self) -> bool {
        !self.is_empty() && self.lo == self.hi
    }

    /// Over-approximating union: the hull of both intervals.
    ///
    /// This is the join of the forward interval analysis.
    pub fn union_with(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Interval::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if lo > hi {
            return Interval::empty();
        }
        Interval::new(lo, hi)
    }

    /// Upper bound on the distance between any value of `self` and any value of `other`:
    /// `max(|self.hi - other.lo|, |other.hi - self.lo|)`.
    pub fn sep(&self, other: &Interval, bounds: &Bounds) -> Abst {
        let a = bounds.abs(bounds.sub(self.hi, other.lo));
        let b = bounds.abs(bounds.sub(other.hi, self.lo));
        a.max(b)
    }

    pub fn neg(&self, bounds: &Bounds) -> Interval {
        if self.is_empty() {
            return Interval::empty();
        }
        Interval::new(bounds.neg(self.hi), bounds.neg(self.lo))
    }

    pub fn add(&self, other: &Interval, bounds: &Bounds) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        Interval::new(bounds.add(self.lo, other.lo), bounds.add(self.hi, other.hi))
    }

    pub fn sub(&self, other: &Interval, bounds: &Bounds) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        Interval::new(bounds.sub(self.lo, other.hi), bounds.sub(self.hi, other.lo))
    }

    pub fn mul(&self, other: &Interval, bounds: &Bounds) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        let corners = [
            bounds.mul(self.lo, other.lo),
            bounds.mul(self.lo, other.hi),
            bounds.mul(self.hi, other.lo),
            bounds.mul(self.hi, other.hi),
        ];
        Interval::new(Abst::min_of(corners), Abst::max_of(corners))
    }

    /// Interval division, split on the sign of the divisor.
    ///
    /// A divisor of exactly `{0}` yields the empty interval. A zero endpoint is
    /// excluded and the remaining side is divided; a divisor straddling zero is
    /// split into its negative and positive parts and the results are joined.
    pub fn div(&self, other: &Interval, bounds: &Bounds) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        let (lo, hi) = (other.lo, other.hi);
        if lo == Abst::ZERO && hi == Abst::ZERO {
            return Interval::empty();
        }
        if lo > Abst::ZERO {
            return self.div_positive(other, bounds);
        }
        if hi < Abst::ZERO {
            return self.neg(bounds).div_positive(&other.neg(bounds), bounds);
        }
        let negative = Interval::new(lo, bounds.clamp(-1));
        let positive = Interval::new(bounds.clamp(1), hi);
        if lo == Abst::ZERO {
            return self.div(&positive, bounds);
        }
        if hi == Abst::ZERO {
            return self.div(&negative, bounds);
        }
        self.div(&negative, bounds).union_with(&self.div(&positive, bounds))
    }

    /// Division by a strictly positive divisor.
    fn div_positive(&self, other: &Interval, bounds: &Bounds) -> Interval {
        debug_assert!(other.lo > Abst::ZERO, "divisor must be strictly positive");
        let corners = [
            bounds.div(self.lo, other.lo),
            bounds.div(self.lo, other.hi),
            bounds.div(self.hi, other.lo),
            bounds.div(self.hi, other.hi),
        ];
        Interval::new(Abst::min_of(corners), Abst::max_of(corners))
    }

    /// Remainder, bounded by the magnitude of the divisor and by the dividend.
    pub fn rem(&self, other: &Interval, bounds: &Bounds) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        if other.lo == Abst::ZERO && other.hi == Abst::ZERO {
            return Interval::empty();
        }
        let one = Abst::Value(1);
        let m = bounds
            .sub(bounds.abs(other.lo), one)
            .max(bounds.sub(bounds.abs(other.hi), one));
        let zero = bounds.clamp(0);
        if self.lo >= Abst::ZERO {
            return Interval::new(zero, self.hi.min(m));
        }
        let below = bounds.neg(bounds.neg(self.lo).min(m));
        if self.hi <= Abst::ZERO {
            return Interval::new(below, zero);
        }
        Interval::new(below, self.hi.min(m))
    }

    /// Refines `(left, right)` assuming `left <rel> right` holds.
    ///
    /// Returns a pair of empty intervals when the relation cannot hold.
    pub fn compare(rel: Relation, left: &Interval, right: &Interval, bounds: &Bounds) -> (Interval, Interval) {
        match rel {
            Relation::Eq => Interval::eq_transfer(left, right),
            Relation::Ne => Interval::ne_transfer(left, right),
            Relation::Lt => Interval::lt_transfer(left, right, bounds),
            Relation::Le => Interval::le_transfer(left, right),
            Relation::Gt => Interval::gt_transfer(left, right, bounds),
            Relation::Ge => Interval::ge_transfer(left, right),
        }
    }

    fn infeasible() -> (Interval, Interval) {
        (Interval::empty(), Interval::empty())
    }

    pub fn eq_transfer(left: &Interval, right: &Interval) -> (Interval, Interval) {
        if left.is_empty() || right.is_empty() || left.lo > right.hi || right.lo > left.hi {
            return Interval::infeasible();
        }
        let both = left.intersect(right);
        (both, both)
    }

    pub fn ne_transfer(left: &Interval, right: &Interval) -> (Interval, Interval) {
        if left.is_empty() || right.is_empty() {
            return Interval::infeasible();
        }
        if left.is_singleton() && right.is_singleton() && left.lo == right.lo {
            return Interval::infeasible();
        }
        (*left, *right)
    }

    pub fn lt_transfer(left: &Interval, right: &Interval, bounds: &Bounds) -> (Interval, Interval) {
        if left.is_empty() || right.is_empty() || left.lo >= right.hi {
            return Interval::infeasible();
        }
        let one = Abst::Value(1);
        let new_left = Interval::new(left.lo, left.hi.min(bounds.sub(right.hi, one)));
        let new_right = Interval::new(bounds.add(left.lo, one).max(right.lo), right.hi);
        (new_left, new_right)
    }

    pub fn le_transfer(left: &Interval, right: &Interval) -> (Interval, Interval) {
        if left.is_empty() || right.is_empty() || left.lo > right.hi {
            return Interval::infeasible();
        }
        let new_left = Interval::new(left.lo, left.hi.min(right.hi));
        let new_right = Interval::new(left.lo.max(right.lo), right.hi);
        (new_left, new_right)
    }

    pub fn gt_transfer(left: &Interval, right: &Interval, bounds: &Bounds) -> (Interval, Interval) {
        if left.is_empty() || right.is_empty() || right.lo >= left.hi {
            return Interval::infeasible();
        }
        let one = Abst::Value(1);
        let new_left = Interval::new(left.lo.max(bounds.add(right.lo, one)), left.hi);
        let new_right = Interval::new(right.lo, bounds.sub(left.hi, one).min(right.hi));
        (new_left, new_right)
    }

    pub fn ge_transfer(left: &Interval, right: &Interval) -> (Interval, Interval) {
        if left.is_empty() || right.is_empty() || right.lo > left.hi {
            return Interval::infeasible();
        }
        let new_left = Interval::new(left.lo.max(right.lo), left.hi);
        let new_right = Interval::new(right.lo, left.hi.min(right.hi));
        (new_left, new_right)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::empty()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty set]")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

/// Order relation assumed by a comparison transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    /// The relation that holds exactly when `self` does not.
    pub fn negate(self) -> Relation {
        match self {
            Relation::Eq => Relation::Ne,
            Relation::Ne => Relation::Eq,
            Relation::Lt => Relation::Ge,
            Relation::Le => Relation::Gt,
            Relation::Gt => Relation::Le,
            Relation::Ge => Relation::Lt,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Eq => "eq",
            Relation::Ne => "ne",
            Relation::Lt => "lt",
            Relation::Le => "le",
            Relation::Gt => "gt",
            Relation::Ge => "ge",
        };
        write!(f, "{}", s)
    }
}
