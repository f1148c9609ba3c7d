//! Transaction validation.
//!
//! Two layers:
//!
//! - [`SmartTransaction::validate`] runs inside every build and rejects
//!   transactions the node would refuse outright.
//! - [`validate_expedite`], [`expedite_from_units`] and [`validate_amount`]
//!   are the stricter checks applied to user input before a transaction is
//!   even assembled.
//!
//! All of it is pure. Decimal arithmetic goes through `rust_decimal` so that
//! `0.000000000001` is exactly what it says.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{Payload, SmartTransaction};
use crate::config::{FEE_UNIT_SCALE, MAX_LANG_LENGTH};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reasons a transaction or its inputs are rejected before signing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The priority fee is unparseable, negative, or not a multiple of the
    /// smallest fee unit.
    #[error("invalid expedite fee {value:?}: {reason}")]
    InvalidFee { value: String, reason: String },

    #[error("localization tag {0:?} is longer than two characters")]
    InvalidLanguageTag(String),

    /// A transfer amount is not a plain non-negative integer.
    #[error("amount {0:?} must be a decimal integer")]
    InvalidAmountFormat(String),

    /// An amount is well-formed but below one unit or fractional.
    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("self-transfer source and target are both {0}")]
    SameBalanceModel(String),

    #[error("payload sets more than one of contract params, UTXO and self-transfer")]
    AmbiguousPayload,

    #[error("unknown balance kind {0:?}, expected Account or UTXO")]
    UnknownBalanceKind(String),
}

// ---------------------------------------------------------------------------
// Build-time validation
// ---------------------------------------------------------------------------

impl SmartTransaction {
    /// Structural checks on the assembled transaction.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.expedite.is_empty() {
            let fee = parse_decimal(&self.expedite).ok_or_else(|| ValidationError::InvalidFee {
                value: self.expedite.clone(),
                reason: "not a decimal number".into(),
            })?;
            if fee.is_sign_negative() && !fee.is_zero() {
                return Err(ValidationError::InvalidFee {
                    value: self.expedite.clone(),
                    reason: "must not be negative".into(),
                });
            }
        }

        if self.lang.trim().chars().count() > MAX_LANG_LENGTH {
            return Err(ValidationError::InvalidLanguageTag(self.lang.clone()));
        }

        match &self.payload {
            Payload::UtxoTransfer { amount, .. } => check_amount_format(amount)?,
            Payload::SelfTransfer { amount, source, target } => {
                check_amount_format(amount)?;
                if source == target {
                    return Err(ValidationError::SameBalanceModel(source.to_string()));
                }
            }
            Payload::ContractCall { .. } => {}
        }
        Ok(())
    }
}

fn check_amount_format(amount: &str) -> Result<(), ValidationError> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidAmountFormat(amount.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Smallest fee unit, `10^-12`.
fn fee_unit() -> Decimal {
    Decimal::new(1, FEE_UNIT_SCALE)
}

/// Accepts plain and scientific notation.
fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// A fee in base units must be at least `10^-12` and a whole multiple of it.
///
/// ```
/// use ibax_sdk::transaction::validate_expedite;
///
/// assert!(validate_expedite("0.000000000001").is_ok());
/// assert!(validate_expedite("0.0000000001").is_ok());
/// assert!(validate_expedite("0.0000000000015").is_err());
/// ```
pub fn validate_expedite(expedite: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFee {
        value: expedite.to_string(),
        reason: reason.to_string(),
    };
    if expedite.is_empty() {
        return Err(invalid("empty"));
    }
    let fee = parse_decimal(expedite).ok_or_else(|| invalid("not a decimal number"))?;
    let unit = fee_unit();
    if fee < unit || !(fee % unit).is_zero() {
        return Err(invalid("not a positive multiple of the smallest fee unit"));
    }
    Ok(())
}

/// Convert a count of smallest fee units into a base-unit fee string and
/// validate it. Fractional input is truncated: `"1500.9"` becomes
/// `"0.0000000015"`.
pub fn expedite_from_units(units: &str) -> Result<String, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidFee {
        value: units.to_string(),
        reason,
    };
    let count = parse_decimal(units).ok_or_else(|| invalid("not a decimal number".into()))?;
    let mut fee = count.trunc();
    fee.rescale(0);
    fee.set_scale(FEE_UNIT_SCALE)
        .map_err(|e| invalid(e.to_string()))?;
    let fee = fee.normalize().to_string();
    validate_expedite(&fee)?;
    Ok(fee)
}

/// A transfer amount must be at least one and integral.
pub fn validate_amount(amount: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidAmount {
        value: amount.to_string(),
        reason: reason.to_string(),
    };
    if amount.is_empty() {
        return Err(invalid("empty"));
    }
    let value = parse_decimal(amount).ok_or_else(|| invalid("not a decimal number"))?;
    if value < Decimal::ONE || !value.fract().is_zero() {
        return Err(invalid("must be a whole number of at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::BalanceKind;

    fn utxo(amount: &str) -> SmartTransaction {
        SmartTransaction::new(Payload::UtxoTransfer {
            recipient: 7,
            amount: amount.into(),
            comment: String::new(),
        })
    }

    #[test]
    fn amount_must_be_digits() {
        assert!(utxo("100").validate().is_ok());
        for bad in ["1.5", "-1", "1e3", " 1", ""] {
            assert_eq!(
                utxo(bad).validate(),
                Err(ValidationError::InvalidAmountFormat(bad.into())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn negative_fee_rejected() {
        let mut tx = SmartTransaction::new(Payload::contract(1));
        tx.expedite = "-1".into();
        assert!(matches!(tx.validate(), Err(ValidationError::InvalidFee { .. })));
        tx.expedite = "abc".into();
        assert!(matches!(tx.validate(), Err(ValidationError::InvalidFee { .. })));
        tx.expedite = "0".into();
        assert!(tx.validate().is_ok());
        tx.expedite = String::new();
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn lang_tag_length() {
        let mut tx = SmartTransaction::new(Payload::contract(1));
        tx.lang = " en ".into();
        assert!(tx.validate().is_ok());
        tx.lang = "eng".into();
        assert_eq!(
            tx.validate(),
            Err(ValidationError::InvalidLanguageTag("eng".into()))
        );
    }

    #[test]
    fn self_transfer_needs_distinct_models() {
        let tx = SmartTransaction::new(Payload::SelfTransfer {
            amount: "5".into(),
            source: BalanceKind::Utxo,
            target: BalanceKind::Utxo,
        });
        assert_eq!(
            tx.validate(),
            Err(ValidationError::SameBalanceModel("UTXO".into()))
        );
    }

    #[test]
    fn fee_quantization() {
        assert!(validate_expedite("0.000000000001").is_ok());
        assert!(validate_expedite("1").is_ok());
        assert!(validate_expedite("1e-12").is_ok());
        assert!(validate_expedite("0.0000000000001").is_err());
        assert!(validate_expedite("0.0000000000015").is_err());
        assert!(validate_expedite("0").is_err());
        assert!(validate_expedite("").is_err());
        assert!(validate_expedite("fast").is_err());
    }

    #[test]
    fn fee_from_units() {
        assert_eq!(expedite_from_units("1").unwrap(), "0.000000000001");
        assert_eq!(expedite_from_units("1500.9").unwrap(), "0.0000000015");
        assert_eq!(expedite_from_units("1000000000000").unwrap(), "1");
        assert!(expedite_from_units("0").is_err());
        assert!(expedite_from_units("0.5").is_err());
        assert!(expedite_from_units("-3").is_err());
        assert!(expedite_from_units("x").is_err());
    }

    #[test]
    fn amounts() {
        assert!(validate_amount("1").is_ok());
        assert!(validate_amount("250000").is_ok());
        assert!(validate_amount("0").is_err());
        assert!(validate_amount("1.5").is_err());
        assert!(validate_amount("").is_err());
    }
}
