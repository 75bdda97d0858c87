use ethers::types::U256;
use rust_decimal::Decimal;
use thiserror::Error;

// 10^77 is the largest power of ten a U256 holds.
pub const MAX_DECIMALS: u32 = 77;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0:?}")]
    Malformed(String),

    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("amount is not a finite number")]
    NotFinite,

    #[error("unsupported number of decimals: {0}")]
    Decimals(u32),

    #[error("amount {0} does not fit in 256 bits at {1} decimals")]
    Overflow(String, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Amount {
    Text(String),
    Float(f64),
    Decimal(Decimal),
}

impl From<&str> for Amount {
    fn from(value: &str) -> Self {
        Amount::Text(value.to_string())
    }
}

impl From<String> for Amount {
    fn from(value: String) -> Self {
        Amount::Text(value)
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::Float(value)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::Decimal(value)
    }
}

impl Amount {
    fn to_decimal_string(&self) -> Result<String, AmountError> {
        match self {
            Amount::Text(text) => Ok(text.trim().replace('_', "")),
            // `Display` for f64 yields the shortest string that round-trips, never
            // scientific notation, so 0.02 stays "0.02".
            Amount::Float(value) if value.is_finite() => Ok(format!("{value}")),
            Amount::Float(_) => Err(AmountError::NotFinite),
            Amount::Decimal(value) => Ok(value.normalize().to_string()),
        }
    }
}

// Scales by 10^decimals in integer arithmetic, truncating any fractional remainder.
pub fn to_minimal_unit(amount: impl Into<Amount>, decimals: u32) -> Result<U256, AmountError> {
    let text = amount.into().to_decimal_string()?;

    let unsigned = text.strip_prefix('+').unwrap_or(&text);
    if unsigned.starts_with('-') {
        return Err(AmountError::Negative(text));
    }

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(AmountError::Malformed(text));
    }

    if decimals > MAX_DECIMALS {
        return Err(AmountError::Decimals(decimals));
    }

    let fraction = &fraction[..fraction.len().min(decimals as usize)];
    let digits = format!("{whole}{fraction}");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    let overflow = || AmountError::Overflow(text.clone(), decimals);
    let mantissa = U256::from_dec_str(digits).map_err(|_| overflow())?;
    let shift = decimals - fraction.len() as u32;
    U256::from(10)
        .checked_pow(U256::from(shift))
        .and_then(|scale| mantissa.checked_mul(scale))
        .ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn two_hundredths_of_ether() {
        let wei = to_minimal_unit("0.02", 18).unwrap();
        assert_eq!(wei, U256::from(20_000_000_000_000_000u64));
    }

    #[test]
    fn all_input_forms_agree() {
        let expected = to_minimal_unit("0.1", 18).unwrap();
        assert_eq!(to_minimal_unit(0.1f64, 18).unwrap(), expected);
        assert_eq!(
            to_minimal_unit(Decimal::from_str("0.1000").unwrap(), 18).unwrap(),
            expected
        );
        assert_eq!(expected, U256::from(100_000_000_000_000_000u64));
    }

    #[test]
    fn fractional_remainder_is_truncated() {
        assert_eq!(to_minimal_unit("1.2345679", 6).unwrap(), U256::from(1_234_567u64));
        assert_eq!(to_minimal_unit("0.0000009", 6).unwrap(), U256::zero());
    }

    #[test]
    fn whole_numbers_and_bare_fractions() {
        assert_eq!(to_minimal_unit("3", 2).unwrap(), U256::from(300u64));
        assert_eq!(to_minimal_unit(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(to_minimal_unit("7.", 0).unwrap(), U256::from(7u64));
        assert_eq!(to_minimal_unit("1_000", 0).unwrap(), U256::from(1000u64));
    }

    #[test]
    fn precision_beyond_binary_floats() {
        let wei = to_minimal_unit("123456789.123456789123456789", 18).unwrap();
        assert_eq!(
            wei,
            U256::from_dec_str("123456789123456789123456789").unwrap()
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(to_minimal_unit("", 18), Err(AmountError::Malformed(_))));
        assert!(matches!(to_minimal_unit("1.2.3", 18), Err(AmountError::Malformed(_))));
        assert!(matches!(to_minimal_unit("abc", 18), Err(AmountError::Malformed(_))));
        assert!(matches!(to_minimal_unit("-1", 18), Err(AmountError::Negative(_))));
        assert_eq!(to_minimal_unit(f64::NAN, 18), Err(AmountError::NotFinite));
        assert!(matches!(
            to_minimal_unit("2", 77),
            Err(AmountError::Overflow(_, 77))
        ));
    }

    #[test]
    fn decimals_are_bounded() {
        assert_eq!(
            to_minimal_unit("1", MAX_DECIMALS).unwrap(),
            U256::from(10).pow(U256::from(77))
        );
        assert_eq!(to_minimal_unit("1", 78), Err(AmountError::Decimals(78)));
        assert_eq!(
            to_minimal_unit("0.02", u32::MAX),
            Err(AmountError::Decimals(u32::MAX))
        );
    }
}
