//! Core types: identifiers, Price, Shares

use std::fmt;

/// Number of share units in one whole share.
///
/// Quantities are fixed-point: `Shares(1)` is 0.0001 of a share.
pub const SHARE_SCALE: i64 = 10_000;

/// Price per whole share in smallest units (cents).
///
/// `Price(10050)` represents $100.50.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Price = Price(0);

    #[inline]
    pub fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_cents(self.0, f)
    }
}

/// Share quantity in units of 1/10 000 share.
///
/// `Shares(20694)` is 2.0694 shares. Fixed-point keeps fractional
/// allocation exact and repeatable across runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shares(pub i64);

impl Shares {
    pub const ZERO: Shares = Shares(0);
    pub const ONE: Shares = Shares(SHARE_SCALE);

    /// Whole shares, e.g. `Shares::whole(3) == Shares(30_000)`.
    pub const fn whole(n: i64) -> Self {
        Shares(n * SHARE_SCALE)
    }

    #[inline]
    pub fn units(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Truncate down to a multiple of `increment` units.
    pub fn truncate_to(self, increment: i64) -> Self {
        debug_assert!(increment > 0, "increment must be positive");
        Shares(self.0 - self.0.rem_euclid(increment))
    }

    /// Approximate value as a floating-point share count (display only).
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SHARE_SCALE as f64
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SHARE_SCALE;
        let frac = (self.0 % SHARE_SCALE).abs();
        if self.0 < 0 && whole == 0 {
            write!(f, "-0.{frac:04}")
        } else {
            write!(f, "{whole}.{frac:04}")
        }
    }
}

/// Market value in cents of `qty` at `price`, rounded toward zero.
pub fn notional_floor(qty: Shares, price: Price) -> i64 {
    (qty.0 as i128 * price.0 as i128 / SHARE_SCALE as i128) as i64
}

/// Market value in cents of `qty` at `price`, rounded up.
pub fn notional_ceil(qty: Shares, price: Price) -> i64 {
    let num = qty.0 as i128 * price.0 as i128;
    let scale = SHARE_SCALE as i128;
    let q = num / scale;
    let adj = if num % scale > 0 { 1 } else { 0 };
    (q + adj) as i64
}

/// Largest quantity (in share units) that `cents` buys at `price`.
///
/// Returns zero for a non-positive price.
pub fn affordable(cents: i64, price: Price) -> Shares {
    if price.0 <= 0 || cents <= 0 {
        return Shares::ZERO;
    }
    Shares((cents as i128 * SHARE_SCALE as i128 / price.0 as i128) as i64)
}

pub(crate) fn fmt_cents(cents: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let dollars = cents / 100;
    let rem = (cents % 100).abs();
    if cents < 0 {
        write!(f, "-${}.{:02}", dollars.abs(), rem)
    } else {
        write!(f, "${}.{:02}", dollars, rem)
    }
}

/// Account identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Security identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SecurityId(pub u64);

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Asset class identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AssetClassId(pub u64);

impl fmt::Display for AssetClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}
