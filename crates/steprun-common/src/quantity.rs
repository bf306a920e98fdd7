//! Kubernetes resource quantity parsing
//!
//! `k8s_openapi` models a quantity as an opaque string. Comparing requests
//! across containers needs numeric values, so quantities are normalized to
//! an integer count of nano-units. Supports decimal SI (`m`, `k`, `M`, ...),
//! binary SI (`Ki`, `Mi`, ...) and exponent (`1e3`) notation.

use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::{Error, Result};

const NANO_EXPONENT: i32 = 9;

/// A quantity normalized to nano-units, ordered numerically
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParsedQuantity {
    nanos: i128,
}

impl ParsedQuantity {
    /// The zero quantity
    pub const ZERO: Self = Self { nanos: 0 };

    /// Parse a `k8s_openapi` quantity
    pub fn from_quantity(quantity: &Quantity) -> Result<Self> {
        quantity.0.parse()
    }
}

impl FromStr for ParsedQuantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            Some(_) => (false, trimmed),
            None => return Err(Error::invalid_quantity(s, "empty quantity")),
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(Error::invalid_quantity(s, "missing or malformed number"));
        }

        let digits = format!("{}{}", int_part, frac_part);
        let out_of_range = || Error::invalid_quantity(s, "value out of range");
        let mantissa: i128 = digits.parse().map_err(|_| out_of_range())?;
        let scale = i32::try_from(frac_part.len()).map_err(|_| out_of_range())?;

        let (binary_exponent, decimal_exponent) =
            parse_suffix(suffix).ok_or_else(|| Error::invalid_quantity(s, "unknown suffix"))?;

        let mut magnitude = mantissa
            .checked_mul(1i128 << binary_exponent)
            .ok_or_else(out_of_range)?;

        let exponent = decimal_exponent
            .checked_add(NANO_EXPONENT)
            .and_then(|e| e.checked_sub(scale))
            .ok_or_else(out_of_range)?;
        if exponent >= 0 {
            let factor = 10i128
                .checked_pow(exponent as u32)
                .ok_or_else(out_of_range)?;
            magnitude = magnitude.checked_mul(factor).ok_or_else(out_of_range)?;
        } else {
            // Sub-nano precision rounds up, as the API server does.
            magnitude = match 10i128.checked_pow(exponent.unsigned_abs()) {
                Some(divisor) => {
                    let whole = magnitude / divisor;
                    if magnitude % divisor == 0 {
                        whole
                    } else {
                        whole + 1
                    }
                }
                None if magnitude == 0 => 0,
                None => 1,
            };
        }

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
        })
    }
}

/// Returns `(binary exponent, decimal exponent)` for a suffix
fn parse_suffix(suffix: &str) -> Option<(u32, i32)> {
    let parsed = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        s if s.starts_with('e') || s.starts_with('E') => (0, s[1..].parse::<i32>().ok()?),
        _ => return None,
    };
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn q(s: &str) -> ParsedQuantity {
        s.parse().unwrap()
    }

    #[rstest]
    #[case::millicores("100m", 100_000_000)]
    #[case::whole_cores("2", 2_000_000_000)]
    #[case::fraction("0.5", 500_000_000)]
    #[case::leading_dot(".5", 500_000_000)]
    #[case::kibibytes("1Ki", 1024 * 1_000_000_000)]
    #[case::kilobytes("1k", 1_000_000_000_000)]
    #[case::exponent("1e3", 1_000_000_000_000)]
    #[case::negative_exponent("5e-3", 5_000_000)]
    #[case::nano("1n", 1)]
    #[case::sub_nano_rounds_up("0.1n", 1)]
    #[case::zero("0", 0)]
    #[case::negative("-1", -1_000_000_000)]
    fn parses_quantities(#[case] input: &str, #[case] nanos: i128) {
        assert_eq!(q(input), ParsedQuantity { nanos });
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_number("Mi")]
    #[case::unknown_suffix("1Zi")]
    #[case::two_dots("1.2.3")]
    #[case::bad_exponent("1ex")]
    #[case::overflow("1e40")]
    fn rejects_invalid_quantities(#[case] input: &str) {
        let err = input.parse::<ParsedQuantity>().unwrap_err();
        assert!(matches!(err, Error::InvalidQuantity { .. }));
    }

    #[rstest]
    #[case::max_exponent("1e2147483647")]
    #[case::min_exponent_with_fraction("1.00000000000000000000e-2147483648")]
    fn exponent_overflow_is_out_of_range(#[case] input: &str) {
        let err = input.parse::<ParsedQuantity>().unwrap_err();
        assert!(
            matches!(err, Error::InvalidQuantity { ref message, .. } if message == "value out of range")
        );
    }

    #[test]
    fn equal_values_in_different_units_compare_equal() {
        assert_eq!(q("1"), q("1000m"));
        assert_eq!(q("1Gi"), q("1024Mi"));
        assert_eq!(q("1e3"), q("1k"));
    }

    #[test]
    fn binary_units_are_larger_than_decimal() {
        assert!(q("1Gi") > q("1G"));
        assert!(q("500m") > q("200m"));
        assert!(q("128Mi") < q("1Gi"));
    }

    #[test]
    fn parses_k8s_quantity() {
        let parsed = ParsedQuantity::from_quantity(&Quantity("250m".to_string())).unwrap();
        assert_eq!(parsed, q("0.25"));
        assert_ne!(parsed, ParsedQuantity::ZERO);
        assert_eq!(q("0"), ParsedQuantity::ZERO);
    }
}
