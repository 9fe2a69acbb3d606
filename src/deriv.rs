//! Which derivative orders a network computes.

/// Switches for the derivative buffers carried by every unit.
///
/// - `d1`: first derivative w.r.t. each input
/// - `d2`: second (diagonal) derivative w.r.t. each input
/// - `vd1`: first derivative w.r.t. each variational parameter
/// - `c1`: cross derivative `d2/dx_k dw_j`
/// - `c2`: cross derivative `d3/dx_k^2 dw_j`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DerivFlags {
    pub d1: bool,
    pub d2: bool,
    pub vd1: bool,
    pub c1: bool,
    pub c2: bool,
}

impl DerivFlags {
    /// Value only.
    pub const NONE: Self = Self::new(false, false, false, false, false);
    pub const D1: Self = Self::new(true, false, false, false, false);
    pub const D12: Self = Self::new(true, true, false, false, false);
    pub const VD1: Self = Self::new(false, false, true, false, false);
    pub const D1_VD1: Self = Self::new(true, false, true, false, false);
    pub const D12_VD1: Self = Self::new(true, true, true, false, false);
    /// Every order, including both cross derivatives.
    pub const ALL: Self = Self::new(true, true, true, true, true);

    pub const fn new(d1: bool, d2: bool, vd1: bool, c1: bool, c2: bool) -> Self {
        Self { d1, d2, vd1, c1, c2 }
    }

    /// Adds the orders the requested ones are built from.
    ///
    /// `c2` needs `c1` and `d2`, `c1` needs `d1` and `vd1`, `d2` needs `d1`.
    #[must_use]
    pub const fn normalized(self) -> Self {
        let c1 = self.c1 || self.c2;
        let d2 = self.d2 || self.c2;
        let d1 = self.d1 || d2 || c1;
        let vd1 = self.vd1 || c1;
        Self::new(d1, d2, vd1, c1, self.c2)
    }

    /// Drops the orders whose dependencies are switched off.
    ///
    /// The result is the largest normalized subset of `self`.
    #[must_use]
    pub const fn restricted(self) -> Self {
        let d2 = self.d2 && self.d1;
        let c1 = self.c1 && self.d1 && self.vd1;
        let c2 = self.c2 && c1 && d2;
        Self::new(self.d1, d2, self.vd1, c1, c2)
    }

    pub const fn is_normalized(self) -> bool {
        let n = self.normalized();
        n.d1 == self.d1 && n.d2 == self.d2 && n.vd1 == self.vd1 && n.c1 == self.c1
    }

    /// Orders enabled in both `self` and `other`.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self::new(
            self.d1 && other.d1,
            self.d2 && other.d2,
            self.vd1 && other.vd1,
            self.c1 && other.c1,
            self.c2 && other.c2,
        )
    }

    /// Orders enabled in either.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::new(
            self.d1 || other.d1,
            self.d2 || other.d2,
            self.vd1 || other.vd1,
            self.c1 || other.c1,
            self.c2 || other.c2,
        )
    }

    /// Whether every order in `other` is also enabled here.
    pub const fn contains(self, other: Self) -> bool {
        (self.d1 || !other.d1)
            && (self.d2 || !other.d2)
            && (self.vd1 || !other.vd1)
            && (self.c1 || !other.c1)
            && (self.c2 || !other.c2)
    }

    pub const fn any(self) -> bool {
        self.d1 || self.d2 || self.vd1 || self.c1 || self.c2
    }
}
