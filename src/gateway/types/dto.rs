//! Request and response bodies

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::AccountProfile;
use crate::error::LedgerError;
use crate::money::{Amount, MoneyError};
use crate::transfer::OpResult;

/// Amount as a JSON string ("250.00") or number (250.5)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    /// Positive amount with at most two decimals
    pub fn parse(&self) -> Result<Amount, LedgerError> {
        match self {
            AmountInput::Text(s) => Ok(Amount::parse(s.trim())?),
            AmountInput::Number(n) => {
                let decimal = Decimal::from_str_exact(&n.to_string())
                    .map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;
                Ok(Amount::try_from(decimal)?)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    /// Seconds
    pub expires_in: u64,
    pub account: AccountProfile,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub recipient_email: String,
    pub amount: AmountInput,
    #[serde(default)]
    pub description: Option<String>,
}

/// Deposit or withdrawal body
#[derive(Debug, Deserialize)]
pub struct FundsRequest {
    pub amount: AmountInput,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleOutcome {
    Success,
    Failed,
}

/// Provider callback resolving a pending deposit or withdrawal
#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub outcome: SettleOutcome,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl SettleRequest {
    pub fn into_op_result(self) -> OpResult {
        match self.outcome {
            SettleOutcome::Success => OpResult::Success(self.reference.unwrap_or_default()),
            SettleOutcome::Failed => OpResult::Failed(
                self.reason
                    .unwrap_or_else(|| "declined by provider".to_string()),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub is_active: bool,
}

/// `?offset=&limit=` for history
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_input_accepts_string_and_number() {
        let body: FundsRequest = serde_json::from_str(r#"{"amount": "250.00"}"#).unwrap();
        assert_eq!(body.amount.parse().unwrap(), Amount::from_cents(25_000));

        let body: FundsRequest = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        assert_eq!(body.amount.parse().unwrap(), Amount::from_cents(1_250));

        let body: FundsRequest = serde_json::from_str(r#"{"amount": 40}"#).unwrap();
        assert_eq!(body.amount.parse().unwrap(), Amount::from_cents(4_000));
    }

    #[test]
    fn test_amount_input_rejections() {
        for raw in [r#""0""#, r#""-1""#, r#""1.001""#, r#""abc""#, "0", "-5", "1.001"] {
            let body: FundsRequest =
                serde_json::from_str(&format!(r#"{{"amount": {}}}"#, raw)).unwrap();
            assert!(
                matches!(body.amount.parse(), Err(LedgerError::InvalidAmount(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_settle_request_outcomes() {
        let req: SettleRequest =
            serde_json::from_str(r#"{"outcome": "success", "reference": "ext_1"}"#).unwrap();
        assert_eq!(req.into_op_result(), OpResult::Success("ext_1".into()));

        let req: SettleRequest = serde_json::from_str(r#"{"outcome": "failed"}"#).unwrap();
        assert!(req.into_op_result().is_explicit_fail());
    }
}
