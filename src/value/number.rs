//! Arbitrary-precision decimal numbers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A decimal number of arbitrary precision.
///
/// Stored normalized as `sign * digits * 10^-scale` with no trailing zeros in
/// `digits`, so structural equality is numeric equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number {
    negative: bool,
    digits: String,
    scale: i64,
}

/// Error returned when text is not a decimal number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid number literal: {0}")]
pub struct ParseNumberError(String);

impl Number {
    /// Zero.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            negative: false,
            digits: "0".to_string(),
            scale: 0,
        }
    }

    fn normalized(negative: bool, digits: &str, scale: i64) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            return Self::zero();
        }
        let without_trailing = trimmed.trim_end_matches('0');
        let dropped = i64::try_from(trimmed.len() - without_trailing.len()).unwrap_or(i64::MAX);
        Self {
            negative,
            digits: without_trailing.to_string(),
            scale: scale.saturating_sub(dropped),
        }
    }

    /// Converts from an `f64`. Returns `None` for NaN and infinities.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // f64's Display never uses exponent notation.
        value.to_string().parse().ok()
    }

    /// Returns true if the number has no fractional part.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        self.scale <= 0
    }

    /// Returns true for negative numbers.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// Converts to `i64` if the number is an integer in range.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        self.to_string().parse().ok()
    }

    /// Converts to `u64` if the number is a non-negative integer in range.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        if !self.is_integer() || self.negative {
            return None;
        }
        self.to_string().parse().ok()
    }

    /// Nearest `f64`.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        let pad = |n: &Self| {
            let zeros = usize::try_from(scale - n.scale).unwrap_or(0);
            let mut s = n.digits.clone();
            s.extend(std::iter::repeat_n('0', zeros));
            s
        };
        let (a, b) = (pad(self), pad(other));
        let (a, b) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = || ParseNumberError(input.to_string());
        let s = input.trim();

        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = s[pos + 1..].parse().map_err(|_| err())?;
                (&s[..pos], exp)
            }
            None => (s, 0),
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let digits = format!("{int_part}{frac_part}");
        let frac_len = i64::try_from(frac_part.len()).map_err(|_| err())?;
        let scale = frac_len.checked_sub(exponent).ok_or_else(err)?;
        let number = Self::normalized(negative, &digits, scale);
        Ok(if number.digits == "0" {
            Self::zero()
        } else {
            number
        })
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        if self.scale <= 0 {
            f.write_str(&self.digits)?;
            for _ in 0..(-self.scale) {
                f.write_str("0")?;
            }
            return Ok(());
        }

        let scale = usize::try_from(self.scale).map_err(|_| fmt::Error)?;
        if scale >= self.digits.len() {
            f.write_str("0.")?;
            for _ in 0..(scale - self.digits.len()) {
                f.write_str("0")?;
            }
            f.write_str(&self.digits)
        } else {
            let split = self.digits.len() - scale;
            write!(f, "{}.{}", &self.digits[..split], &self.digits[split..])
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::normalized(value < 0, &value.unsigned_abs().to_string(), 0)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Self::normalized(false, &value.to_string(), 0)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Number {
        s.parse().expect("valid number")
    }

    #[test]
    fn test_normalization() {
        assert_eq!(n("1.50"), n("1.5"));
        assert_eq!(n("100"), n("1e2"));
        assert_eq!(n("0.00"), Number::zero());
        assert_eq!(n("-0"), Number::zero());
        assert_eq!(n("1.5").to_string(), "1.5");
        assert_eq!(n("1e3").to_string(), "1000");
        assert_eq!(n("0.0012").to_string(), "0.0012");
        assert_eq!(n("-12.5e-1").to_string(), "-1.25");
    }

    #[test]
    fn test_precision_is_preserved() {
        let big = "123456789012345678901234567890.000000000000000001";
        assert_eq!(n(big).to_string(), big);
    }

    #[test]
    fn test_ordering() {
        assert!(n("2") > n("1.99999"));
        assert!(n("-2") < n("-1"));
        assert!(n("0.1") > n("-5"));
        assert!(n("10") > n("9.9"));
        assert_eq!(n("3.0").cmp(&n("3")), Ordering::Equal);
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(n("42").as_i64(), Some(42));
        assert_eq!(n("-42").as_u64(), None);
        assert_eq!(n("4.2").as_i64(), None);
        assert_eq!(Number::from(-7_i64).to_string(), "-7");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("".parse::<Number>().is_err());
        assert!("1.2.3".parse::<Number>().is_err());
        assert!("abc".parse::<Number>().is_err());
        assert!(Number::from_f64(f64::NAN).is_none());
    }
}
