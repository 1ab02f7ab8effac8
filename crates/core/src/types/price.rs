//! Money amounts for snack prices and order totals.
//!
//! Prices are decimal baht with at most two fractional digits. Floating point
//! never touches money: line totals and order totals are computed with
//! [`Decimal`] arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Quantity;

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price must have at most {max} decimal places")]
    TooPrecise {
        /// Maximum number of decimal places.
        max: u32,
    },
    /// The input string is not a decimal number.
    #[error("price is not a valid decimal number")]
    Invalid,
}

/// A non-negative unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Maximum number of decimal places stored (`NUMERIC(12, 2)`).
    pub const MAX_SCALE: u32 = 2;

    /// Create a price, rejecting negative or over-precise amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] or [`PriceError::TooPrecise`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount.normalize().scale() > Self::MAX_SCALE {
            return Err(PriceError::TooPrecise {
                max: Self::MAX_SCALE,
            });
        }
        Ok(Self(amount))
    }

    /// Parse a price from a form field such as `"10.50"`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Invalid`] when the string is not a number, or any
    /// error from [`Price::new`].
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount: Decimal = s.trim().parse().map_err(|_| PriceError::Invalid)?;
        Self::new(amount)
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this price.
    #[must_use]
    pub fn line_total(&self, quantity: Quantity) -> Decimal {
        self.0 * Decimal::from(quantity.get())
    }
}

/// Sum of `price * quantity` over every line.
///
/// ```
/// use nom_naa_core::{Price, Quantity, order_total};
/// use rust_decimal::Decimal;
///
/// let a = Price::parse("10.00").unwrap();
/// let b = Price::parse("5.50").unwrap();
/// let total = order_total([
///     (a, Quantity::new(2).unwrap()),
///     (b, Quantity::new(1).unwrap()),
/// ]);
/// assert_eq!(total, Decimal::new(2550, 2));
/// ```
#[must_use]
pub fn order_total(lines: impl IntoIterator<Item = (Price, Quantity)>) -> Decimal {
    lines
        .into_iter()
        .map(|(price, quantity)| price.line_total(quantity))
        .sum()
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: i32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_rejects_negative_and_over_precise() {
        assert_eq!(Price::parse("-1"), Err(PriceError::Negative));
        assert_eq!(
            Price::parse("1.005"),
            Err(PriceError::TooPrecise { max: 2 })
        );
        assert_eq!(Price::parse("abc"), Err(PriceError::Invalid));
    }

    #[test]
    fn test_trailing_zeros_are_not_precision() {
        assert!(Price::parse("3.5000").is_ok());
        assert!(Price::parse("0").is_ok());
    }

    #[test]
    fn test_line_total() {
        let price = Price::parse("12.25").unwrap();
        assert_eq!(price.line_total(qty(4)), Decimal::new(4900, 2));
    }

    #[test]
    fn test_order_total_of_no_lines_is_zero() {
        assert_eq!(order_total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn test_order_total_has_no_float_drift() {
        let dime = Price::parse("0.10").unwrap();
        let total = order_total((0..3).map(|_| (dime, qty(1))));
        assert_eq!(total, Decimal::new(30, 2));
    }

    #[test]
    fn test_display_always_two_places() {
        assert_eq!(Price::parse("7").unwrap().to_string(), "7.00");
        assert_eq!(Price::parse("7.5").unwrap().to_string(), "7.50");
    }
}
