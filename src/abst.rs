//! Extended integers with saturating arithmetic.
//!
//! An [`Abst`] is either a finite value, one of the two infinities, or
//! [`Abst::Undefined`] (the result of an operation with no meaningful value,
//! such as division by zero). Finite values always lie within the window of
//! some [`Bounds`]: every arithmetic result is clamped through
//! [`Bounds::clamp`], so anything above `max` becomes `+inf` and anything
//! below `min` becomes `-inf`.
//!
//! # Ordering
//!
//! The total order on defined values is `-inf < finite < +inf`.
//! `Undefined` is only equal to itself and is incomparable with everything else.
//!
//! # Example
//!
//! ```
//! use dataflow_rs::abst::{Abst, Bounds};
//!
//! let bounds = Bounds::new(-200, 200);
//! assert_eq!(bounds.add(Abst::Value(150), Abst::Value(100)), Abst::PosInf);
//! assert_eq!(bounds.div(Abst::Value(7), Abst::Value(0)), Abst::Undefined);
//! assert_eq!(bounds.mul(Abst::Value(0), Abst::NegInf), Abst::Value(0));
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Extended integer: finite value, infinity, or undefined.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Abst {
    /// Negative infinity.
    NegInf,
    /// Finite value inside the current [`Bounds`].
    Value(i64),
    /// Positive infinity.
    PosInf,
    /// No value. Absorbing for every operation.
    Undefined,
}

impl Abst {
    pub const ZERO: Abst = Abst::Value(0);

    pub fn is_undef(self) -> bool {
        matches!(self, Abst::Undefined)
    }

    pub fn is_pos_inf(self) -> bool {
        matches!(self, Abst::PosInf)
    }

    pub fn is_neg_inf(self) -> bool {
        matches!(self, Abst::NegInf)
    }

    pub fn is_inf(self) -> bool {
        self.is_pos_inf() || self.is_neg_inf()
    }

    pub fn as_value(self) -> Option<i64> {
        match self {
            Abst::Value(n) => Some(n),
            _ => None,
        }
    }

    /// Sign of a defined value: -1, 0 or 1.
    fn signum(self) -> Option<i128> {
        match self {
            Abst::NegInf => Some(-1),
            Abst::Value(n) => Some(n.signum() as i128),
            Abst::PosInf => Some(1),
            Abst::Undefined => None,
        }
    }

    /// Infinity with the given sign (zero counts as positive).
    fn inf_with_sign(sign: i128) -> Abst {
        if sign < 0 {
            Abst::NegInf
        } else {
            Abst::PosInf
        }
    }

    /// Smaller of two values. `Undefined` if either is undefined.
    pub fn min(self, other: Abst) -> Abst {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            Some(_) => self,
            None => Abst::Undefined,
        }
    }

    /// Larger of two values. `Undefined` if either is undefined.
    pub fn max(self, other: Abst) -> Abst {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            Some(_) => self,
            None => Abst::Undefined,
        }
    }

    pub fn min_of(values: impl IntoIterator<Item = Abst>) -> Abst {
        values.into_iter().reduce(Abst::min).unwrap_or(Abst::Undefined)
    }

    pub fn max_of(values: impl IntoIterator<Item = Abst>) -> Abst {
        values.into_iter().reduce(Abst::max).unwrap_or(Abst::Undefined)
    }
}

impl From<i64> for Abst {
    fn from(value: i64) -> Self {
        Abst::Value(value)
    }
}

impl PartialOrd for Abst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Abst::Undefined, Abst::Undefined) => Some(Ordering::Equal),
            (Abst::Undefined, _) | (_, Abst::Undefined) => None,
            (Abst::NegInf, Abst::NegInf) | (Abst::PosInf, Abst::PosInf) => Some(Ordering::Equal),
            (Abst::NegInf, _) | (_, Abst::PosInf) => Some(Ordering::Less),
            (_, Abst::NegInf) | (Abst::PosInf, _) => Some(Ordering::Greater),
            (Abst::Value(a), Abst::Value(b)) => Some(a.cmp(b)),
        }
    }
}

impl fmt::Display for Abst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abst::NegInf => write!(f, "-INF"),
            Abst::Value(n) => write!(f, "{}", n),
            Abst::PosInf => write!(f, "INF"),
            Abst::Undefined => write!(f, "UNDEF"),
        }
    }
}

/// Saturation window for finite values.
///
/// Every arithmetic operation on [`Abst`] goes through a `Bounds`, which
/// collapses results above `max` to `+inf` and below `min` to `-inf`.
/// A narrow window gives the abstract domain a finite height, which is what
/// makes the interval fixpoint terminate on CFGs with loops.
///
/// # Invariants
///
/// - `min <= max`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Bounds {
    min: i64,
    max: i64,
}

impl Bounds {
    /// Window used for loop-bearing procedures.
    pub const LOOP_WINDOW: i64 = 200;

    /// Creates a window `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn new(min: i64, max: i64) -> Self {
        assert!(min <= max, "Bounds require min <= max, got [{}, {}]", min, max);
        Self { min, max }
    }

    /// Creates a window `[min, max]`, or `None` if `min > max`.
    pub fn try_new(min: i64, max: i64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// The full `i64` range: only overflow saturates.
    pub const fn unbounded() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    /// `[-200, 200]`, small enough for loops to converge quickly.
    pub const fn for_loops() -> Self {
        Self {
            min: -Self::LOOP_WINDOW,
            max: Self::LOOP_WINDOW,
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Lifts a (possibly out-of-range) integer into the domain.
    pub fn clamp(&self, value: i128) -> Abst {
        if value > self.max as i128 {
            Abst::PosInf
        } else if value < self.min as i128 {
            Abst::NegInf
        } else {
            Abst::Value(value as i64)
        }
    }

    /// Re-clamps an existing value, e.g. a literal produced outside this window.
    pub fn value(&self, value: Abst) -> Abst {
        match value {
            Abst::Value(n) => self.clamp(n as i128),
            other => other,
        }
    }

    pub fn neg(&self, a: Abst) -> Abst {
        match a {
            Abst::NegInf => Abst::PosInf,
            Abst::PosInf => Abst::NegInf,
            Abst::Value(n) => self.clamp(-(n as i128)),
            Abst::Undefined => Abst::Undefined,
        }
    }

    pub fn abs(&self, a: Abst) -> Abst {
        match a {
            Abst::NegInf | Abst::PosInf => Abst::PosInf,
            Abst::Value(n) => self.clamp((n as i128).abs()),
            Abst::Undefined => Abst::Undefined,
        }
    }

    pub fn add(&self, a: Abst, b: Abst) -> Abst {
        match (a, b) {
            (Abst::Undefined, _) | (_, Abst::Undefined) => Abst::Undefined,
            (Abst::Value(x), Abst::Value(y)) => self.clamp(x as i128 + y as i128),
            (Abst::PosInf, Abst::NegInf) | (Abst::NegInf, Abst::PosInf) => Abst::Undefined,
            (inf @ (Abst::PosInf | Abst::NegInf), _) | (_, inf @ (Abst::PosInf | Abst::NegInf)) => inf,
        }
    }

    pub fn sub(&self, a: Abst, b: Abst) -> Abst {
        match (a, b) {
            (Abst::Value(x), Abst::Value(y)) => self.clamp(x as i128 - y as i128),
            (inf @ (Abst::PosInf | Abst::NegInf), Abst::Value(_)) => inf,
            _ => self.add(a, self.neg(b)),
        }
    }

    pub fn mul(&self, a: Abst, b: Abst) -> Abst {
        match (a, b) {
            (Abst::Undefined, _) | (_, Abst::Undefined) => Abst::Undefined,
            (Abst::Value(0), _) | (_, Abst::Value(0)) => self.clamp(0),
            (Abst::Value(x), Abst::Value(y)) => self.clamp(x as i128 * y as i128),
            _ => match (a.signum(), b.signum()) {
                (Some(sa), Some(sb)) => Abst::inf_with_sign(sa * sb),
                _ => Abst::Undefined,
            },
        }
    }

    /// Truncating division. Division by zero is `Undefined`.
    pub fn div(&self, a: Abst, b: Abst) -> Abst {
        match (a, b) {
            (Abst::Undefined, _) | (_, Abst::Undefined) => Abst::Undefined,
            (_, Abst::Value(0)) => Abst::Undefined,
            (Abst::Value(x), Abst::Value(y)) => self.clamp(x as i128 / y as i128),
            (Abst::Value(_), _) => self.clamp(0),
            _ => match (a.signum(), b.signum()) {
                // Infinite dividend: stays infinite over a finite divisor,
                // and `inf / inf` collapses to a unit of the right sign.
                (Some(sa), Some(sb)) if b.is_inf() => self.clamp(sa * sb),
                (Some(sa), Some(sb)) => Abst::inf_with_sign(sa * sb),
                _ => Abst::Undefined,
            },
        }
    }

    /// Truncating remainder (sign follows the dividend).
    pub fn rem(&self, a: Abst, b: Abst) -> Abst {
        match (a, b) {
            (Abst::Undefined, _) | (_, Abst::Undefined) => Abst::Undefined,
            (Abst::PosInf | Abst::NegInf, _) => Abst::Undefined,
            (_, Abst::Value(0)) => Abst::Undefined,
            (Abst::Value(x), Abst::Value(y)) => self.clamp(x as i128 % y as i128),
            (Abst::Value(x), _) => self.clamp(x as i128),
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::unbounded()
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
