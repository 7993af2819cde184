//! Wallet result types returned by the session manager
//!
//! These are read-only projections of SDK responses.

use serde::{Deserialize, Serialize};

use crate::sdk::{SdkPaymentState, SdkPaymentType};

/// Satoshis per bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Balance and receive address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub balance_sat: u64,
    pub address: String,
}

impl WalletInfo {
    /// Balance in BTC with exactly eight decimals
    pub fn balance_btc(&self) -> String {
        format_btc(self.balance_sat)
    }
}

/// Format a satoshi amount as a BTC decimal string, e.g. `0.01234567`
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

/// Payment direction from the wallet's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDirection {
    Incoming,
    Outgoing,
}

impl From<SdkPaymentType> for PaymentDirection {
    fn from(kind: SdkPaymentType) -> Self {
        match kind {
            SdkPaymentType::Receive => PaymentDirection::Incoming,
            SdkPaymentType::Send => PaymentDirection::Outgoing,
        }
    }
}

/// Local three-state payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl From<SdkPaymentState> for PaymentStatus {
    fn from(state: SdkPaymentState) -> Self {
        match state {
            SdkPaymentState::Complete => PaymentStatus::Completed,
            SdkPaymentState::Failed | SdkPaymentState::TimedOut => PaymentStatus::Failed,
            // In-flight, refund and unrecognized states all read as pending
            SdkPaymentState::Created
            | SdkPaymentState::Pending
            | SdkPaymentState::Refundable
            | SdkPaymentState::RefundPending
            | SdkPaymentState::WaitingFeeAcceptance
            | SdkPaymentState::Unknown => PaymentStatus::Pending,
        }
    }
}

impl PaymentStatus {
    /// Map an SDK status string onto the local model
    pub fn from_sdk_str(status: &str) -> Self {
        SdkPaymentState::from_wire(status).into()
    }
}

impl PaymentDirection {
    /// Map an SDK payment type string onto the local model
    pub fn from_sdk_str(kind: &str) -> Self {
        SdkPaymentType::from_wire(kind).into()
    }
}

/// One entry of the payment history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub amount_sat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp_sec: u64,
    pub direction: PaymentDirection,
    pub status: PaymentStatus,
}

/// Signed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    pub signature: String,
    pub message: String,
    pub public_key: String,
}

/// Invoice created for receiving a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResult {
    pub invoice: String,
    pub amount_sat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fees_sat: u64,
}

/// Outcome of a standard send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub payment_id: String,
    pub destination: String,
    pub status: PaymentStatus,
    pub fees_sat: u64,
}

/// Outcome of an LNURL-pay or a fallback standard send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlPayOutcome {
    pub payment_id: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_action: Option<SuccessActionInfo>,
}

/// Success action shown to the payer after an LNURL payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SuccessActionInfo {
    Message { message: String },
    Url { description: String, url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_btc() {
        assert_eq!(format_btc(1_234_567), "0.01234567");
        assert_eq!(format_btc(0), "0.00000000");
        assert_eq!(format_btc(SATS_PER_BTC), "1.00000000");
        assert_eq!(format_btc(2 * SATS_PER_BTC + 1), "2.00000001");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(PaymentStatus::from_sdk_str("complete"), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_sdk_str("pending"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_sdk_str("failed"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_sdk_str("timedOut"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_sdk_str("refundable"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_sdk_str("something-new"), PaymentStatus::Pending);
    }

    #[test]
    fn test_direction_mapping() {
        assert_eq!(PaymentDirection::from_sdk_str("receive"), PaymentDirection::Incoming);
        assert_eq!(PaymentDirection::from_sdk_str("send"), PaymentDirection::Outgoing);
        assert_eq!(PaymentDirection::from_sdk_str("swap"), PaymentDirection::Outgoing);
    }

    #[test]
    fn test_payment_record_serialization() {
        let record = PaymentRecord {
            id: "p1".to_string(),
            amount_sat: 50_000,
            description: None,
            timestamp_sec: 1_700_000_000,
            direction: PaymentDirection::Incoming,
            status: PaymentStatus::Completed,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["amountSat"], 50_000);
        assert_eq!(json["direction"], "incoming");
        assert_eq!(json["status"], "completed");
        assert!(json.get("description").is_none());
    }
}
