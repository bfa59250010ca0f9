// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conversion between display amounts and settlement-token minor units.
//!
//! Everything inside the engine is minor units. These helpers are only
//! called at the edges (user input, HTTP responses).

use alloy::primitives::U256;

/// Errors produced when a display amount cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Invalid amount format: {0}")]
    Format(String),

    #[error("Too many decimal places (max {0})")]
    Precision(u8),

    #[error("Amount overflow")]
    Overflow,
}

/// Parse a human-readable amount into minor units.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1500.5")
/// * `decimals` - Token decimals (6 for PYUSD)
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if parts.len() > 2 || parts[0].is_empty() {
        return Err(AmountError::Format(amount.to_string()));
    }

    let whole = parts[0]
        .parse::<u128>()
        .map_err(|_| AmountError::Format(amount.to_string()))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.is_empty() || !dec_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(AmountError::Format(amount.to_string()));
        }
        if dec_str.len() > decimals as usize {
            return Err(AmountError::Precision(decimals));
        }
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| AmountError::Format(amount.to_string()))?
    } else {
        0u128
    };

    let multiplier = 10u128
        .checked_pow(decimals as u32)
        .ok_or(AmountError::Overflow)?;
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or(AmountError::Overflow)?;

    Ok(U256::from(total))
}

/// Format minor units as a human-readable amount (trailing zeros trimmed).
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

/// Format a basis-point rate as a percentage string ("5.25%").
pub fn format_bps(bps: U256) -> String {
    format!("{}%", format_amount(bps, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_amounts_round_trip_through_minor_units() {
        for display in ["500", "1500.5", "15000"] {
            let minor = parse_amount(display, 6).unwrap();
            assert_eq!(format_amount(minor, 6), display);
        }
        assert_eq!(parse_amount("1500.5", 6).unwrap(), U256::from(1_500_500_000u64));
    }

    #[test]
    fn parse_rejects_excess_precision() {
        assert_eq!(
            parse_amount("1.0000001", 6),
            Err(AmountError::Precision(6))
        );
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(parse_amount("1.2.3", 6).is_err());
        assert!(parse_amount("", 6).is_err());
        assert!(parse_amount("-5", 6).is_err());
        assert!(parse_amount("5.", 6).is_err());
        assert!(parse_amount("abc", 6).is_err());
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_amount(U256::from(1_250_000u64), 6), "1.25");
        assert_eq!(format_amount(U256::ZERO, 6), "0");
    }

    #[test]
    fn bps_render_as_percent() {
        assert_eq!(format_bps(U256::from(525)), "5.25%");
        assert_eq!(format_bps(U256::from(1200)), "12%");
    }
}
