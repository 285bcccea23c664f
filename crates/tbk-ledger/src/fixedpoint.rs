//! Money as integer micros.
//!
//! Prices, costs, averages and realized PnL are all `Micros`: an `i64` count
//! of 1e-6 currency units. Long replays add thousands of amounts together and
//! integer addition keeps every one of them exact.
//!
//! There is no `From<i64>`; quantities stay plain `i64` and only meet money
//! through [`Micros::checked_mul_qty`] and [`Micros::checked_div_qty`].
//! Checked ops return `None` on overflow and callers turn that into an error.
//! `checked_div_qty` is the single division (average price): it rounds half
//! away from zero and refuses a zero quantity.

use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Price/cash scale: micros (1e-6).
pub const MICROS_SCALE: i64 = 1_000_000;

/// Number of fractional digits carried by [`Micros`].
pub const MICROS_DECIMALS: u32 = 6;

/// A fixed-point monetary amount at 1e-6 scale (micros).
///
/// Use [`Micros::new`] for explicit construction and [`Micros::raw`] to
/// extract the underlying integer at crate boundaries.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Micros(i64);

impl Micros {
    /// Zero monetary amount.
    pub const ZERO: Micros = Micros(0);

    /// Maximum representable value.
    pub const MAX: Micros = Micros(i64::MAX);

    /// Construct a `Micros` from a raw `i64` already at 1e-6 scale.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Construct from a whole number of currency units (`100` -> `100.000000`).
    ///
    /// Returns `None` on overflow.
    #[inline]
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(MICROS_SCALE).map(Micros)
    }

    /// Extract the underlying raw `i64`.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_sub(rhs.0).map(Micros)
    }

    #[inline]
    pub fn checked_neg(self) -> Option<Micros> {
        self.0.checked_neg().map(Micros)
    }

    /// Addition clamped to the `i64` range.
    #[inline]
    pub fn saturating_add(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_add(rhs.0))
    }

    /// Absolute value; `i64::MIN` saturates.
    #[inline]
    pub fn abs(self) -> Micros {
        Micros(self.0.saturating_abs())
    }

    /// `true` if this amount is non-negative.
    #[inline]
    pub fn is_non_negative(self) -> bool {
        self.0 >= 0
    }

    /// `true` if this amount is strictly negative.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply a per-unit price by an integer contract quantity.
    ///
    /// Returns `None` if the multiplication overflows `i64`.
    #[inline]
    pub fn checked_mul_qty(self, qty: i64) -> Option<Micros> {
        self.0.checked_mul(qty).map(Micros)
    }

    /// Divide an amount by an integer quantity, rounding half away from zero
    /// to the nearest micro.
    ///
    /// Returns `None` when `qty == 0`. This is the division guard for average
    /// price computation: callers must never reach it with a flat position.
    pub fn checked_div_qty(self, qty: i64) -> Option<Micros> {
        if qty == 0 {
            return None;
        }
        let n = self.0 as i128;
        let d = qty as i128;
        let q = n / d;
        let r = n % d;
        let q = if 2 * r.abs() >= d.abs() {
            if (n < 0) == (d < 0) {
                q + 1
            } else {
                q - 1
            }
        } else {
            q
        };
        // |q| <= |n| for |d| >= 1, so the result always fits back into i64.
        Some(Micros(q as i64))
    }

    /// Render with `decimals` fractional digits (0..=6), rounding half away
    /// from zero. `Display` always renders all six digits.
    pub fn to_decimal_string(self, decimals: u32) -> String {
        let decimals = decimals.min(MICROS_DECIMALS);
        let step = 10_i128.pow(MICROS_DECIMALS - decimals);
        let n = self.0 as i128;
        let mut scaled = n / step;
        if 2 * (n % step).abs() >= step {
            scaled += if n < 0 { -1 } else { 1 };
        }

        let sign = if scaled < 0 { "-" } else { "" };
        let scaled = scaled.abs();
        if decimals == 0 {
            return format!("{sign}{scaled}");
        }
        let unit = 10_i128.pow(decimals);
        let int_part = scaled / unit;
        let frac_part = scaled % unit;
        format!(
            "{sign}{int_part}.{frac_part:0width$}",
            width = decimals as usize
        )
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

// Unchecked forms panic on overflow in debug builds; the replay path uses the
// checked methods.
macro_rules! micros_binop {
    ($tr:ident, $method:ident, $op:tt) => {
        impl $tr for Micros {
            type Output = Micros;
            #[inline]
            fn $method(self, rhs: Micros) -> Micros {
                Micros(self.0 $op rhs.0)
            }
        }
    };
}

micros_binop!(Add, add, +);
micros_binop!(Sub, sub, -);

impl Neg for Micros {
    type Output = Micros;
    #[inline]
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}

impl std::iter::Sum for Micros {
    fn sum<I: Iterator<Item = Micros>>(iter: I) -> Micros {
        iter.fold(Micros::ZERO, |acc, m| acc + m)
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal_string(MICROS_DECIMALS))
    }
}
