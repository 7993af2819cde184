//! Wallet SDK capability interface
//!
//! The session manager talks to the Lightning/Liquid wallet SDK only through
//! these traits. [`WalletConnector`] produces a connected [`WalletSdk`] handle
//! from vault credentials; the handle exposes the payment capabilities and an
//! event subscription whose first [`SdkEvent::Synced`] marks the wallet ready.
//!
//! [`memory::MemoryWallet`] implements both traits in memory for mock mode
//! and tests.

pub mod memory;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::OperationError;
use crate::vault::Network;

/// Errors reported by the wallet SDK
#[derive(Debug, Clone, Error)]
pub enum SdkError {
    #[error("SDK not connected")]
    NotConnected,

    #[error("Insufficient funds: need {needed_sat} sat, have {available_sat} sat")]
    InsufficientFunds { needed_sat: u64, available_sat: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Generic(String),
}

impl From<SdkError> for OperationError {
    fn from(e: SdkError) -> Self {
        OperationError::Sdk(e.to_string())
    }
}

impl From<SdkError> for crate::Error {
    fn from(e: SdkError) -> Self {
        crate::Error::Operation(e.into())
    }
}

/// Result type alias for SDK calls
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Credentials and location handed to the SDK on connect
#[derive(Clone)]
pub struct ConnectRequest {
    pub api_key: String,
    pub mnemonic: String,
    pub network: Network,
    pub working_dir: PathBuf,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("has_mnemonic", &!self.mnemonic.is_empty())
            .field("network", &self.network)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

/// Lifecycle and payment events emitted by the SDK
#[derive(Debug, Clone)]
pub enum SdkEvent {
    /// The wallet finished a synchronization round with the network
    Synced,
    PaymentPending { payment: SdkPayment },
    PaymentSucceeded { payment: SdkPayment },
    PaymentFailed { payment: SdkPayment },
}

/// Receives SDK events; called from SDK-owned tasks
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: SdkEvent);
}

/// Produces connected SDK handles
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> SdkResult<Arc<dyn WalletSdk>>;
}

/// A connected wallet SDK instance
#[async_trait]
pub trait WalletSdk: Send + Sync {
    /// Register an event listener and return its id
    async fn add_event_listener(&self, listener: Box<dyn EventListener>) -> SdkResult<String>;

    async fn get_info(&self) -> SdkResult<GetInfoResponse>;

    async fn prepare_receive_payment(
        &self,
        request: PrepareReceiveRequest,
    ) -> SdkResult<PrepareReceiveResponse>;

    async fn receive_payment(
        &self,
        request: ReceivePaymentRequest,
    ) -> SdkResult<ReceivePaymentResponse>;

    async fn prepare_send_payment(
        &self,
        request: PrepareSendRequest,
    ) -> SdkResult<PrepareSendResponse>;

    async fn send_payment(&self, request: SendPaymentRequest) -> SdkResult<SendPaymentResponse>;

    async fn list_payments(&self, request: ListPaymentsRequest) -> SdkResult<Vec<SdkPayment>>;

    async fn sign_message(&self, request: SignMessageRequest) -> SdkResult<SignMessageResponse>;

    async fn check_message(&self, request: CheckMessageRequest) -> SdkResult<CheckMessageResponse>;

    /// Classify a payment destination string
    async fn parse(&self, input: &str) -> SdkResult<InputType>;

    async fn prepare_lnurl_pay(
        &self,
        request: PrepareLnUrlPayRequest,
    ) -> SdkResult<PrepareLnUrlPayResponse>;

    async fn lnurl_pay(&self, request: LnUrlPayRequest) -> SdkResult<LnUrlPayResult>;
}

// ============================================================================
// Wallet info
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkWalletInfo {
    pub balance_sat: u64,
    pub pending_send_sat: u64,
    pub pending_receive_sat: u64,
    /// Hex-encoded wallet public key
    pub pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfoResponse {
    pub wallet_info: SdkWalletInfo,
}

// ============================================================================
// Receive
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    Lightning,
    BitcoinAddress,
    LiquidAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReceiveRequest {
    pub payment_method: PaymentMethod,
    pub amount_sat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReceiveResponse {
    pub payment_method: PaymentMethod,
    pub amount_sat: Option<u64>,
    pub fees_sat: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePaymentRequest {
    pub prepare_response: PrepareReceiveResponse,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePaymentResponse {
    /// Invoice or address the payer should use
    pub destination: String,
}

// ============================================================================
// Send
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareSendRequest {
    pub destination: String,
    /// Required for destinations that do not carry an amount
    pub amount_sat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareSendResponse {
    pub destination: String,
    pub amount_sat: u64,
    pub fees_sat: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPaymentRequest {
    pub prepare_response: PrepareSendResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPaymentResponse {
    pub payment: SdkPayment,
}

// ============================================================================
// Payments
// ============================================================================

/// SDK payment direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdkPaymentType {
    Receive,
    Send,
}

impl SdkPaymentType {
    /// Parse the SDK wire name; anything but `receive` is a send
    pub fn from_wire(s: &str) -> Self {
        match s {
            "receive" => SdkPaymentType::Receive,
            _ => SdkPaymentType::Send,
        }
    }
}

/// SDK payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdkPaymentState {
    Created,
    Pending,
    Complete,
    Failed,
    TimedOut,
    Refundable,
    RefundPending,
    WaitingFeeAcceptance,
    /// A state this build does not know about
    #[serde(other)]
    Unknown,
}

impl SdkPaymentState {
    /// Parse the SDK wire name; unrecognized names map to `Unknown`
    pub fn from_wire(s: &str) -> Self {
        match s {
            "created" => SdkPaymentState::Created,
            "pending" => SdkPaymentState::Pending,
            "complete" => SdkPaymentState::Complete,
            "failed" => SdkPaymentState::Failed,
            "timedOut" => SdkPaymentState::TimedOut,
            "refundable" => SdkPaymentState::Refundable,
            "refundPending" => SdkPaymentState::RefundPending,
            "waitingFeeAcceptance" => SdkPaymentState::WaitingFeeAcceptance,
            _ => SdkPaymentState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkPayment {
    pub tx_id: Option<String>,
    pub destination: Option<String>,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    pub amount_sat: u64,
    pub fees_sat: u64,
    pub payment_type: SdkPaymentType,
    pub status: SdkPaymentState,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPaymentsRequest {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageResponse {
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessageRequest {
    pub message: String,
    pub pubkey: String,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckMessageResponse {
    pub is_valid: bool,
}

// ============================================================================
// Input parsing and LNURL-pay
// ============================================================================

/// Classification of a destination string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    Bolt11 { invoice: String, amount_sat: Option<u64> },
    Bolt12Offer { offer: String },
    BitcoinAddress { address: String },
    LiquidAddress { address: String },
    LnUrlPay { data: LnUrlPayRequestData },
    LnUrlError { reason: String },
    Url { url: String },
}

impl InputType {
    /// Short name for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            InputType::Bolt11 { .. } => "bolt11",
            InputType::Bolt12Offer { .. } => "bolt12",
            InputType::BitcoinAddress { .. } => "bitcoin address",
            InputType::LiquidAddress { .. } => "liquid address",
            InputType::LnUrlPay { .. } => "lnurl-pay",
            InputType::LnUrlError { .. } => "lnurl error",
            InputType::Url { .. } => "url",
        }
    }
}

/// Parameters served by an LNURL-pay endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnUrlPayRequestData {
    pub callback: String,
    pub min_sendable_msat: u64,
    pub max_sendable_msat: u64,
    /// Maximum comment length accepted by the endpoint; 0 disables comments
    pub comment_allowed: u16,
    pub domain: String,
    pub ln_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareLnUrlPayRequest {
    pub data: LnUrlPayRequestData,
    pub amount_sat: u64,
    pub comment: Option<String>,
    pub validate_success_action_url: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareLnUrlPayResponse {
    /// Invoice returned by the endpoint callback
    pub destination: String,
    pub amount_sat: u64,
    pub fees_sat: u64,
    pub data: LnUrlPayRequestData,
    pub comment: Option<String>,
    pub success_action: Option<SuccessAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnUrlPayRequest {
    pub prepare_response: PrepareLnUrlPayResponse,
}

/// Success action returned by an LNURL-pay endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessAction {
    Message { message: String },
    Url { description: String, url: String },
    Aes { description: String, plaintext: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LnUrlPayResult {
    EndpointSuccess {
        payment: SdkPayment,
        success_action: Option<SuccessAction>,
    },
    EndpointError {
        reason: String,
    },
    PayError {
        payment_hash: String,
        reason: String,
    },
}
