//! Wallet session lifecycle
//!
//! [`SessionManager`] owns the connection to the wallet SDK. The first call
//! to [`SessionManager::ensure_ready`] loads the vault, connects, attaches an
//! event listener and then waits for the SDK's first `Synced` event. Every
//! wallet operation goes through that gate.
//!
//! ```text
//! Uninitialized -> Connecting -> Connected -> AwaitingSync -> Ready
//!                      |             |             |
//!                      +-------------+-------------+--> Failed(reason)
//! ```
//!
//! `Ready` is a latch: once observed it holds for the life of the manager.
//! A failed connect keeps nothing, so the next call starts over.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{watch, OnceCell};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{OperationError, Result, SessionError};
use crate::sdk::{
    CheckMessageRequest, ConnectRequest, EventListener, InputType, ListPaymentsRequest,
    LnUrlPayRequest, LnUrlPayRequestData, LnUrlPayResult, PaymentMethod, PrepareLnUrlPayRequest,
    PrepareReceiveRequest, PrepareSendRequest, ReceivePaymentRequest, SdkEvent, SdkPayment,
    SendPaymentRequest, SignMessageRequest, SuccessAction, WalletConnector, WalletSdk,
};
use crate::types::{
    InvoiceResult, LnurlPayOutcome, PaymentRecord, SendResult, SignatureResult,
    SuccessActionInfo, WalletInfo,
};
use crate::vault::SecretVault;

/// Default SDK working directory
pub const DEFAULT_WORKING_DIR: &str = "./.breez-data";

/// Default interval between readiness checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default cap on the readiness wait
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(120);

/// Default page size for `list_payments`
pub const DEFAULT_PAYMENT_LIMIT: u32 = 100;

/// Session tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// SDK working directory
    pub working_dir: PathBuf,
    /// Sleep between readiness checks
    pub poll_interval: Duration,
    /// Upper bound on the readiness wait
    pub readiness_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }
}

/// Connection state of the wallet SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Connecting,
    Connected,
    AwaitingSync,
    Ready,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::AwaitingSync => write!(f, "awaiting sync"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

type SharedState = Arc<RwLock<SessionState>>;

fn read_state(state: &SharedState) -> SessionState {
    state.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_state(state: &SharedState, next: SessionState) {
    *state.write().unwrap_or_else(|e| e.into_inner()) = next;
}

/// Latches `Ready` on the first `Synced` event
struct SyncListener {
    state: SharedState,
    ready: Arc<watch::Sender<bool>>,
}

impl EventListener for SyncListener {
    fn on_event(&self, event: SdkEvent) {
        match event {
            SdkEvent::Synced => {
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                if *state != SessionState::Ready {
                    info!("Wallet synced, session ready");
                    *state = SessionState::Ready;
                }
                drop(state);
                self.ready.send_replace(true);
            }
            SdkEvent::PaymentPending { payment } => {
                debug!("Payment pending: {}", payment_id(&payment));
            }
            SdkEvent::PaymentSucceeded { payment } => {
                info!("Payment succeeded: {}", payment_id(&payment));
            }
            SdkEvent::PaymentFailed { payment } => {
                warn!("Payment failed: {}", payment_id(&payment));
            }
        }
    }
}

/// Wallet session service
pub struct SessionManager {
    vault: Arc<SecretVault>,
    connector: Arc<dyn WalletConnector>,
    settings: SessionSettings,

    /// Connected SDK handle; set once by the first successful connect
    sdk: OnceCell<Arc<dyn WalletSdk>>,

    state: SharedState,

    /// Ready latch, flipped by the event listener
    ready: Arc<watch::Sender<bool>>,

    /// Cancels readiness waits when it turns `true`
    shutdown: watch::Receiver<bool>,
}

impl SessionManager {
    /// Create a session manager that is never cancelled
    pub fn new(
        vault: Arc<SecretVault>,
        connector: Arc<dyn WalletConnector>,
        settings: SessionSettings,
    ) -> Self {
        let (_tx, shutdown) = watch::channel(false);
        Self::with_shutdown(vault, connector, settings, shutdown)
    }

    /// Create a session manager whose readiness waits end when `shutdown` flips to `true`
    pub fn with_shutdown(
        vault: Arc<SecretVault>,
        connector: Arc<dyn WalletConnector>,
        settings: SessionSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            vault,
            connector,
            settings,
            sdk: OnceCell::new(),
            state: Arc::new(RwLock::new(SessionState::Uninitialized)),
            ready: Arc::new(ready),
            shutdown,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn vault(&self) -> &Arc<SecretVault> {
        &self.vault
    }

    pub fn state(&self) -> SessionState {
        read_state(&self.state)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Connect in the background so the first tool call finds a synced wallet
    pub async fn warm_up(&self) {
        match self.ensure_ready().await {
            Ok(_) => info!("Wallet session warmed up"),
            Err(e) => warn!("Wallet warm-up failed, will retry on first use: {}", e),
        }
    }

    /// Connect if needed and wait until the wallet has synced
    pub async fn ensure_ready(&self) -> std::result::Result<Arc<dyn WalletSdk>, SessionError> {
        let sdk = self.sdk.get_or_try_init(|| self.connect()).await?.clone();
        if !self.is_ready() {
            self.wait_for_sync().await?;
        }
        Ok(sdk)
    }

    async fn connect(&self) -> std::result::Result<Arc<dyn WalletSdk>, SessionError> {
        write_state(&self.state, SessionState::Connecting);
        info!("Connecting wallet SDK");

        match self.try_connect().await {
            Ok(sdk) => Ok(sdk),
            Err(e) => {
                error!("Failed to initialize wallet SDK: {}", e);
                write_state(&self.state, SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn try_connect(&self) -> std::result::Result<Arc<dyn WalletSdk>, SessionError> {
        let config = self.vault.load().await?;
        let request = ConnectRequest {
            api_key: config.sdk_key.clone(),
            mnemonic: config.mnemonic.clone(),
            network: config.network,
            working_dir: self.settings.working_dir.clone(),
        };

        let sdk = self
            .connector
            .connect(request)
            .await
            .map_err(|e| SessionError::ConnectFailed(e.to_string()))?;
        write_state(&self.state, SessionState::Connected);
        debug!("Wallet SDK connected on {}", config.network);

        let listener = SyncListener {
            state: self.state.clone(),
            ready: self.ready.clone(),
        };
        let listener_id = sdk
            .add_event_listener(Box::new(listener))
            .await
            .map_err(|e| SessionError::ConnectFailed(e.to_string()))?;
        debug!("Event listener attached: {}", listener_id);

        // The listener may already have latched Ready
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if *state == SessionState::Connected {
                *state = SessionState::AwaitingSync;
            }
        }

        Ok(sdk)
    }

    async fn wait_for_sync(&self) -> std::result::Result<(), SessionError> {
        let timeout = self.settings.readiness_timeout;
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.subscribe();
        let mut shutdown = self.shutdown.clone();

        debug!("Waiting for wallet sync (timeout {:?})", timeout);

        loop {
            if self.is_ready() {
                return Ok(());
            }
            if *shutdown.borrow() {
                return Err(SessionError::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Wallet did not sync within {:?}", timeout);
                return Err(SessionError::ReadinessTimeout(timeout));
            }

            let nap = self.settings.poll_interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                Ok(()) = ready.changed() => {}
                Ok(()) = shutdown.changed() => {}
            }
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Balance and an on-chain receive address
    pub async fn get_balance(&self) -> Result<WalletInfo> {
        let sdk = self.ensure_ready().await?;
        let info = sdk.get_info().await?;

        let prepared = sdk
            .prepare_receive_payment(PrepareReceiveRequest {
                payment_method: PaymentMethod::BitcoinAddress,
                amount_sat: None,
            })
            .await?;
        let address = sdk
            .receive_payment(ReceivePaymentRequest {
                prepare_response: prepared,
                description: None,
            })
            .await?
            .destination;

        Ok(WalletInfo {
            balance_sat: info.wallet_info.balance_sat,
            address,
        })
    }

    /// Create a Lightning invoice for `amount_sat`
    pub async fn create_invoice(
        &self,
        amount_sat: u64,
        description: Option<String>,
    ) -> Result<InvoiceResult> {
        if amount_sat == 0 {
            return Err(OperationError::InvalidArgument("amount must be positive".into()).into());
        }
        let sdk = self.ensure_ready().await?;

        let prepared = sdk
            .prepare_receive_payment(PrepareReceiveRequest {
                payment_method: PaymentMethod::Lightning,
                amount_sat: Some(amount_sat),
            })
            .await?;
        let fees_sat = prepared.fees_sat;
        let invoice = sdk
            .receive_payment(ReceivePaymentRequest {
                prepare_response: prepared,
                description: description.clone(),
            })
            .await?
            .destination;

        info!("Created invoice for {} sat", amount_sat);
        Ok(InvoiceResult {
            invoice,
            amount_sat,
            description,
            fees_sat,
        })
    }

    /// Pay a Lightning invoice or other destination that carries its amount
    pub async fn pay_invoice(&self, destination: &str) -> Result<SendResult> {
        let sdk = self.ensure_ready().await?;
        self.send(sdk.as_ref(), destination, None).await
    }

    async fn send(
        &self,
        sdk: &dyn WalletSdk,
        destination: &str,
        amount_sat: Option<u64>,
    ) -> Result<SendResult> {
        let prepared = sdk
            .prepare_send_payment(PrepareSendRequest {
                destination: destination.to_string(),
                amount_sat,
            })
            .await?;
        let fees_sat = prepared.fees_sat;
        let payment = sdk
            .send_payment(SendPaymentRequest {
                prepare_response: prepared,
            })
            .await?
            .payment;

        let result = SendResult {
            payment_id: payment_id(&payment),
            destination: destination.to_string(),
            status: payment.status.into(),
            fees_sat,
        };
        info!("Sent payment {} ({:?})", result.payment_id, result.status);
        Ok(result)
    }

    /// Pay an LNURL-pay endpoint or Lightning address
    ///
    /// Bolt11, Bolt12 and on-chain destinations fall back to a standard send
    /// of `amount_sat`. Anything else is rejected.
    pub async fn pay_lnurl(
        &self,
        url: &str,
        amount_sat: u64,
        comment: Option<String>,
    ) -> Result<LnurlPayOutcome> {
        if amount_sat == 0 {
            return Err(OperationError::InvalidArgument("amount must be positive".into()).into());
        }
        let sdk = self.ensure_ready().await?;

        let input = sdk
            .parse(url)
            .await
            .map_err(|e| OperationError::UnsupportedDestination(format!("{}: {}", url, e)))?;
        debug!("Destination classified as {}", input.kind());

        match input {
            InputType::LnUrlPay { data } => {
                self.lnurl_pay(sdk.as_ref(), data, amount_sat, comment).await
            }
            InputType::Bolt11 { .. }
            | InputType::Bolt12Offer { .. }
            | InputType::BitcoinAddress { .. }
            | InputType::LiquidAddress { .. } => {
                let sent = self.send(sdk.as_ref(), url, Some(amount_sat)).await?;
                Ok(LnurlPayOutcome {
                    payment_id: sent.payment_id,
                    status: sent.status,
                    success_action: None,
                })
            }
            InputType::LnUrlError { reason } => {
                Err(OperationError::Sdk(format!("LNURL endpoint error: {}", reason)).into())
            }
            other => Err(OperationError::UnsupportedDestination(format!(
                "{} ({})",
                url,
                other.kind()
            ))
            .into()),
        }
    }

    async fn lnurl_pay(
        &self,
        sdk: &dyn WalletSdk,
        data: LnUrlPayRequestData,
        amount_sat: u64,
        comment: Option<String>,
    ) -> Result<LnurlPayOutcome> {
        let amount_msat = amount_sat.saturating_mul(1000);
        if amount_msat < data.min_sendable_msat || amount_msat > data.max_sendable_msat {
            return Err(OperationError::InvalidArgument(format!(
                "amount {} sat outside endpoint range {}..={} msat",
                amount_sat, data.min_sendable_msat, data.max_sendable_msat
            ))
            .into());
        }

        let comment = match comment {
            Some(_) if data.comment_allowed == 0 => {
                debug!("Endpoint does not accept comments, dropping it");
                None
            }
            Some(c) if c.chars().count() > data.comment_allowed as usize => {
                return Err(OperationError::InvalidArgument(format!(
                    "comment longer than {} characters",
                    data.comment_allowed
                ))
                .into());
            }
            other => other,
        };

        let domain = data.domain.clone();
        let prepared = sdk
            .prepare_lnurl_pay(PrepareLnUrlPayRequest {
                data,
                amount_sat,
                comment,
                validate_success_action_url: Some(true),
            })
            .await?;
        if let Some(action) = &prepared.success_action {
            validate_success_action(action, &domain)?;
        }

        match sdk
            .lnurl_pay(LnUrlPayRequest {
                prepare_response: prepared,
            })
            .await?
        {
            LnUrlPayResult::EndpointSuccess {
                payment,
                success_action,
            } => {
                let outcome = LnurlPayOutcome {
                    payment_id: payment_id(&payment),
                    status: payment.status.into(),
                    success_action: success_action.map(success_action_info),
                };
                info!("LNURL payment {} to {} sent", outcome.payment_id, domain);
                Ok(outcome)
            }
            LnUrlPayResult::EndpointError { reason } => {
                Err(OperationError::Sdk(format!("LNURL endpoint error: {}", reason)).into())
            }
            LnUrlPayResult::PayError {
                payment_hash,
                reason,
            } => Err(OperationError::Sdk(format!(
                "LNURL payment {} failed: {}",
                payment_hash, reason
            ))
            .into()),
        }
    }

    /// Payment history, newest first
    pub async fn list_payments(&self, limit: Option<u32>) -> Result<Vec<PaymentRecord>> {
        let sdk = self.ensure_ready().await?;
        let payments = sdk
            .list_payments(ListPaymentsRequest {
                limit: Some(limit.unwrap_or(DEFAULT_PAYMENT_LIMIT)),
                offset: None,
            })
            .await?;

        Ok(payments
            .into_iter()
            .map(|p| PaymentRecord {
                id: payment_id(&p),
                amount_sat: p.amount_sat,
                description: p.description,
                timestamp_sec: p.timestamp,
                direction: p.payment_type.into(),
                status: p.status.into(),
            })
            .collect())
    }

    /// Sign `message` with the wallet key
    pub async fn sign_message(&self, message: &str) -> Result<SignatureResult> {
        let sdk = self.ensure_ready().await?;
        let signature = sdk
            .sign_message(SignMessageRequest {
                message: message.to_string(),
            })
            .await?
            .signature;
        let public_key = sdk.get_info().await?.wallet_info.pubkey;

        Ok(SignatureResult {
            signature,
            message: message.to_string(),
            public_key,
        })
    }

    /// Check a signature produced by `public_key` over `message`
    pub async fn verify_message(
        &self,
        message: &str,
        signature: &str,
        public_key: &str,
    ) -> Result<bool> {
        let sdk = self.ensure_ready().await?;
        let response = sdk
            .check_message(CheckMessageRequest {
                message: message.to_string(),
                pubkey: public_key.to_string(),
                signature: signature.to_string(),
            })
            .await?;
        Ok(response.is_valid)
    }
}

/// Stable id for a payment: tx id, else destination, else a fresh UUID
fn payment_id(payment: &SdkPayment) -> String {
    payment
        .tx_id
        .clone()
        .or_else(|| payment.destination.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Reject URL success actions that are not http(s) on the endpoint's domain
fn validate_success_action(
    action: &SuccessAction,
    domain: &str,
) -> std::result::Result<(), OperationError> {
    let SuccessAction::Url { url, .. } = action else {
        return Ok(());
    };

    let parsed = url::Url::parse(url)
        .map_err(|e| OperationError::InvalidSuccessAction(format!("{}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OperationError::InvalidSuccessAction(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    match parsed.host_str() {
        Some(host) if host.eq_ignore_ascii_case(domain) => Ok(()),
        Some(host) => Err(OperationError::InvalidSuccessAction(format!(
            "host {} does not match {}",
            host, domain
        ))),
        None => Err(OperationError::InvalidSuccessAction(format!("{} has no host", url))),
    }
}

fn success_action_info(action: SuccessAction) -> SuccessActionInfo {
    match action {
        SuccessAction::Message { message } => SuccessActionInfo::Message { message },
        SuccessAction::Url { description, url } => SuccessActionInfo::Url { description, url },
        SuccessAction::Aes {
            description,
            plaintext,
        } => SuccessActionInfo::Message {
            message: plaintext.unwrap_or(description),
        },
    }
}
