use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Points earned per burned token.
pub const POINTS_PER_TOKEN: Decimal = Decimal::from_parts(1888, 0, 0, false, 3);

/// Converts a raw SPL amount string (integer base units) into token units.
pub fn raw_amount_to_decimal(raw: &str, decimals: u8) -> Result<Decimal, ConversionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::InvalidDecimal("empty amount".to_string()));
    }
    let mut value =
        Decimal::from_str(trimmed).map_err(|e| ConversionError::InvalidDecimal(e.to_string()))?;
    if decimals > 28 {
        return Err(ConversionError::Overflow);
    }
    // shift by the mint decimals without touching the mantissa
    value
        .set_scale(value.scale() + decimals as u32)
        .map_err(|_| ConversionError::Overflow)?;
    Ok(value.normalize())
}

/// `uiAmount` comes back from the RPC as a JSON float.
pub fn ui_amount_to_decimal(ui_amount: f64) -> Result<Decimal, ConversionError> {
    if !ui_amount.is_finite() {
        return Err(ConversionError::InvalidDecimal(ui_amount.to_string()));
    }
    Decimal::from_str(&ui_amount.to_string())
        .or_else(|_| Decimal::try_from(ui_amount))
        .map_err(|e| ConversionError::InvalidDecimal(e.to_string()))
}

/// Floors a decimal to an integer point value, saturating at the `i64` bounds.
pub fn floor_to_points(value: Decimal) -> i64 {
    let floored = value.floor();
    floored.to_i64().unwrap_or(if floored.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// `floor(burned × 1.888)`, saturating like [`floor_to_points`].
pub fn base_points(burned: Decimal) -> i64 {
    floor_to_points(burned.saturating_mul(POINTS_PER_TOKEN))
}

/// Largest amount in token units an SPL account can hold at `decimals`: `u64::MAX / 10^decimals`.
pub fn max_token_amount(decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(u64::MAX as i128, u32::from(decimals.min(28)))
}

/// Rounds a percentage to two decimal places, half away from zero.
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("Overflow in conversion")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_amount_scaling() {
        let value = raw_amount_to_decimal("1500000", 6).unwrap();
        assert_eq!(value, Decimal::from_str("1.5").unwrap());

        let whole = raw_amount_to_decimal("42", 0).unwrap();
        assert_eq!(whole, Decimal::from(42));
    }

    #[test]
    fn test_raw_amount_rejects_garbage() {
        assert!(raw_amount_to_decimal("", 6).is_err());
        assert!(raw_amount_to_decimal("12abc", 6).is_err());
        assert!(raw_amount_to_decimal("1", 40).is_err());
    }

    #[test]
    fn test_base_points_floors() {
        assert_eq!(base_points(Decimal::from(1000)), 1888);
        assert_eq!(base_points(Decimal::from_str("0.5").unwrap()), 0);
        assert_eq!(base_points(Decimal::from_str("10.6").unwrap()), 20);
        assert_eq!(base_points(Decimal::MAX), i64::MAX);
    }

    #[test]
    fn test_round_percent() {
        assert_eq!(
            round_percent(Decimal::from_str("5.005").unwrap()),
            Decimal::from_str("5.01").unwrap()
        );
        assert_eq!(
            round_percent(Decimal::from_str("1.5").unwrap() + Decimal::from_str("3.5").unwrap()),
            Decimal::from(5)
        );
    }

    #[test]
    fn test_ui_amount() {
        assert_eq!(ui_amount_to_decimal(12.25).unwrap(), Decimal::from_str("12.25").unwrap());
        assert!(ui_amount_to_decimal(f64::NAN).is_err());
    }
}
