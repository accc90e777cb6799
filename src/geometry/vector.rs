//! Componentwise integer vectors over the cell index space.

use core::fmt;
use core::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A `D`-dimensional vector of cell indices or index offsets.
///
/// Arithmetic is componentwise and wrapping-free in practice: extents in this
/// crate stay far inside `i64` range. Comparison helpers are componentwise
/// (`all_le`, `all_ge`) rather than a derived lexicographic order, because the
/// geometric questions this type answers are per-axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntVector<const D: usize>(#[serde(with = "crate::geometry::serde_array")] [i64; D]);

impl<const D: usize> IntVector<D> {
    /// Vector with the given components.
    pub fn new(components: [i64; D]) -> Self {
        Self(components)
    }

    /// All components zero.
    pub fn zero() -> Self {
        Self([0; D])
    }

    /// All components one.
    pub fn one() -> Self {
        Self([1; D])
    }

    /// All components equal to `v`.
    pub fn splat(v: i64) -> Self {
        Self([v; D])
    }

    /// Unit vector along `axis`.
    pub fn unit(axis: usize) -> Self {
        let mut out = [0; D];
        out[axis] = 1;
        Self(out)
    }

    /// The underlying component array.
    pub fn components(&self) -> &[i64; D] {
        &self.0
    }

    /// Product of all components.
    pub fn product(&self) -> i64 {
        self.0.iter().product()
    }

    /// Componentwise minimum.
    pub fn min(&self, other: &Self) -> Self {
        Self(core::array::from_fn(|d| self.0[d].min(other.0[d])))
    }

    /// Componentwise maximum.
    pub fn max(&self, other: &Self) -> Self {
        Self(core::array::from_fn(|d| self.0[d].max(other.0[d])))
    }

    /// `true` if every component is `<=` the matching component of `other`.
    pub fn all_le(&self, other: &Self) -> bool {
        (0..D).all(|d| self.0[d] <= other.0[d])
    }

    /// `true` if every component is `>=` the matching component of `other`.
    pub fn all_ge(&self, other: &Self) -> bool {
        (0..D).all(|d| self.0[d] >= other.0[d])
    }
}

impl<const D: usize> Default for IntVector<D> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const D: usize> From<[i64; D]> for IntVector<D> {
    fn from(components: [i64; D]) -> Self {
        Self(components)
    }
}

impl<const D: usize> Index<usize> for IntVector<D> {
    type Output = i64;
    fn index(&self, axis: usize) -> &i64 {
        &self.0[axis]
    }
}

impl<const D: usize> IndexMut<usize> for IntVector<D> {
    fn index_mut(&mut self, axis: usize) -> &mut i64 {
        &mut self.0[axis]
    }
}

impl<const D: usize> Add for IntVector<D> {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl<const D: usize> AddAssign for IntVector<D> {
    fn add_assign(&mut self, rhs: Self) {
        for d in 0..D {
            self.0[d] += rhs.0[d];
        }
    }
}

impl<const D: usize> Sub for IntVector<D> {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl<const D: usize> SubAssign for IntVector<D> {
    fn sub_assign(&mut self, rhs: Self) {
        for d in 0..D {
            self.0[d] -= rhs.0[d];
        }
    }
}

impl<const D: usize> Neg for IntVector<D> {
    type Output = Self;
    fn neg(mut self) -> Self {
        for d in 0..D {
            self.0[d] = -self.0[d];
        }
        self
    }
}

impl<const D: usize> Mul<i64> for IntVector<D> {
    type Output = Self;
    fn mul(mut self, rhs: i64) -> Self {
        for d in 0..D {
            self.0[d] *= rhs;
        }
        self
    }
}

impl<const D: usize> fmt::Display for IntVector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (d, v) in self.0.iter().enumerate() {
            if d > 0 {
                write!(f, ",")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn componentwise_arithmetic() {
        let a = IntVector::new([1, -2, 3]);
        let b = IntVector::new([4, 5, -6]);
        assert_eq!(a + b, IntVector::new([5, 3, -3]));
        assert_eq!(a - b, IntVector::new([-3, -7, 9]));
        assert_eq!(-a, IntVector::new([-1, 2, -3]));
        assert_eq!(a * 2, IntVector::new([2, -4, 6]));
    }

    #[test]
    fn componentwise_comparisons_are_not_lexicographic() {
        let a = IntVector::new([0, 5]);
        let b = IntVector::new([1, 4]);
        assert!(!a.all_le(&b));
        assert!(!a.all_ge(&b));
        assert!(a.all_le(&a.max(&b)));
        assert!(a.all_ge(&a.min(&b)));
    }

    #[test]
    fn display_is_tuple_like() {
        assert_eq!(IntVector::new([3, -1]).to_string(), "(3,-1)");
    }

    #[test]
    fn serde_round_trip() {
        let v = IntVector::new([7, 8, 9]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[7,8,9]");
        let back: IntVector<3> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        let bytes = bincode::serialize(&v).unwrap();
        let back: IntVector<3> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, v);
    }
}
