//! Tolerance grading for comparing derivatives computed in different ways.

/// Worst accepted distance.
pub const MAX_ERROR: f64 = 1e-3;

/// Typical distance between two evaluations of the same formula in a
/// different order.
pub const AVG_ERROR: f64 = 1e-6;

/// Distance below which two values count as the same.
pub const MIN_ERROR: f64 = 1e-12;

/// How close two values are, relative to their magnitude.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    Precise = 0,
    Partial = 1,
    Relative = 2,
    /// Not equal.
    Scarce = 3,
}

/// Grades the relative distance `|a - b| / max(1, |a|, |b|)`.
pub trait RelativeEq<Rhs: ?Sized = Self> {
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.is_nan() || rhs.is_nan() {
            return ApproxEquality::Scarce;
        }
        let scale = self.abs().max(rhs.abs()).max(1.0);
        let dif = (self - rhs).abs() / scale;

        if dif < MIN_ERROR {
            ApproxEquality::Precise
        } else if dif < AVG_ERROR {
            ApproxEquality::Partial
        } else if dif < MAX_ERROR {
            ApproxEquality::Relative
        } else {
            ApproxEquality::Scarce
        }
    }
}

impl RelativeEq for [f64] {
    /// Worst grade over the elements; slices of different length are
    /// [`Scarce`](ApproxEquality::Scarce).
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        self.iter()
            .zip(rhs)
            .map(|(a, b)| a.approx_eq(b))
            .max()
            .unwrap_or(ApproxEquality::Precise)
    }
}

/// True when `a` and `b` grade at least `within`.
pub fn approx_within<T: RelativeEq + ?Sized>(a: &T, b: &T, within: ApproxEquality) -> bool {
    a.approx_eq(b) <= within
}

/// Shorthand for [`approx_within`] at [`ApproxEquality::Partial`].
pub fn approx_eq<T: RelativeEq + ?Sized>(a: &T, b: &T) -> bool {
    approx_within(a, b, ApproxEquality::Partial)
}
