//! Lossless conversions between chain integers and `NUMERIC` columns.

use alloy_primitives::U256;
use bigdecimal::BigDecimal;
use bigdecimal::num_bigint::{BigInt, Sign};

use crate::error::IndexerError;

/// `U256` as a scale-0 decimal.
#[must_use]
pub fn from_u256(value: U256) -> BigDecimal {
    BigDecimal::new(
        BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>()),
        0,
    )
}

/// `u64` as a scale-0 decimal.
#[must_use]
pub fn from_u64(value: u64) -> BigDecimal {
    BigDecimal::from(value)
}

/// Reads a non-negative integral decimal back into a `U256`.
///
/// # Errors
///
/// [`IndexerError::Persistence`] for negative, fractional or oversized values.
pub fn to_u256(value: &BigDecimal) -> Result<U256, IndexerError> {
    let integral = value.with_scale(0);
    if integral != *value {
        return Err(IndexerError::Persistence(format!(
            "expected an integer, found {value}"
        )));
    }
    let (digits, _) = integral.as_bigint_and_exponent();
    let (sign, bytes) = digits.to_bytes_be();
    if sign == Sign::Minus {
        return Err(IndexerError::Persistence(format!(
            "expected a non-negative integer, found {value}"
        )));
    }
    U256::try_from_be_slice(&bytes)
        .ok_or_else(|| IndexerError::Persistence(format!("{value} does not fit in 256 bits")))
}

/// Reads a decimal back into a `u64`.
///
/// # Errors
///
/// [`IndexerError::Persistence`] when the value is out of range.
pub fn to_u64(value: &BigDecimal) -> Result<u64, IndexerError> {
    let wide = to_u256(value)?;
    u64::try_from(wide)
        .map_err(|_| IndexerError::Persistence(format!("{value} does not fit in 64 bits")))
}

/// Converts a list of `U256` into decimals.
#[must_use]
pub fn from_u256_list(values: &[U256]) -> Vec<BigDecimal> {
    values.iter().copied().map(from_u256).collect()
}

/// Converts a list of decimals into `U256`.
///
/// # Errors
///
/// Fails on the first value [`to_u256`] rejects.
pub fn to_u256_list(values: &[BigDecimal]) -> Result<Vec<U256>, IndexerError> {
    values.iter().map(to_u256).collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn u256_survives_numeric() {
        for value in [U256::ZERO, U256::from(42), U256::MAX] {
            let Ok(back) = to_u256(&from_u256(value)) else {
                panic!("{value} should round-trip");
            };
            assert_eq!(back, value);
        }
    }

    #[test]
    fn max_u256_has_78_digits() {
        assert_eq!(from_u256(U256::MAX).to_string().len(), 78);
    }

    #[test]
    fn trailing_zero_scale_is_accepted() {
        let Ok(value) = BigDecimal::from_str("7.000") else {
            panic!("literal");
        };
        let Ok(back) = to_u256(&value) else {
            panic!("7.000 is integral");
        };
        assert_eq!(back, U256::from(7));
    }

    #[test]
    fn rejects_fractions_negatives_and_overflow() {
        let Ok(fraction) = BigDecimal::from_str("1.5") else {
            panic!("literal");
        };
        assert!(to_u256(&fraction).is_err());
        assert!(to_u256(&BigDecimal::from(-1)).is_err());

        let too_big = from_u256(U256::MAX) + BigDecimal::from(1);
        assert!(to_u256(&too_big).is_err());
        assert!(to_u64(&from_u256(U256::from(u64::MAX) + U256::from(1))).is_err());
    }

    #[test]
    fn block_numbers_round_trip() {
        let Ok(back) = to_u64(&from_u64(19_000_000)) else {
            panic!("block number");
        };
        assert_eq!(back, 19_000_000);
    }
}
