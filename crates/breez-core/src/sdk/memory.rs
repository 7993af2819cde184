//! In-memory wallet backend
//!
//! Implements [`WalletConnector`] and [`WalletSdk`] without any network
//! access. Used by `breez-mcp --backend memory` and by tests. Signatures are
//! SHA-256 commitments over the public key and message; they are not a real
//! signature scheme.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use super::*;

/// Behaviour knobs for [`MemoryWallet`]
#[derive(Debug, Clone)]
pub struct MemoryWalletSettings {
    pub balance_sat: u64,
    pub address: String,
    /// Delay before the first `Synced` event; `None` waits for [`MemoryWallet::emit_synced`]
    pub sync_delay: Option<Duration>,
    /// Number of connect attempts that fail before one succeeds
    pub failed_connects: u32,
    /// Success action returned by LNURL-pay endpoints
    pub lnurl_success_action: Option<SuccessAction>,
    /// Seed the payment history with two completed payments
    pub seed_history: bool,
    /// State reported for outgoing payments
    pub send_state: SdkPaymentState,
}

impl Default for MemoryWalletSettings {
    fn default() -> Self {
        Self {
            balance_sat: 500_000,
            address: "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx".to_string(),
            sync_delay: Some(Duration::from_millis(250)),
            failed_connects: 0,
            lnurl_success_action: Some(SuccessAction::Message {
                message: "Thanks for your payment!".to_string(),
            }),
            seed_history: true,
            send_state: SdkPaymentState::Complete,
        }
    }
}

#[derive(Default)]
struct Ledger {
    balance_sat: u64,
    network: Option<Network>,
    pubkey: Option<String>,
    payments: Vec<SdkPayment>,
}

struct Inner {
    settings: MemoryWalletSettings,
    connect_attempts: AtomicU32,
    ledger: Mutex<Ledger>,
    listeners: Mutex<Vec<Box<dyn EventListener>>>,
    synced: Mutex<bool>,
}

/// In-memory wallet SDK
#[derive(Clone)]
pub struct MemoryWallet {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Fee charged on every send
fn fee_for(amount_sat: u64) -> u64 {
    1 + amount_sat / 1000
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::with_settings(MemoryWalletSettings::default())
    }

    pub fn with_settings(settings: MemoryWalletSettings) -> Self {
        let ledger = Ledger {
            balance_sat: settings.balance_sat,
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                settings,
                connect_attempts: AtomicU32::new(0),
                ledger: Mutex::new(ledger),
                listeners: Mutex::new(Vec::new()),
                synced: Mutex::new(false),
            }),
        }
    }

    /// Number of connect calls received so far
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Whether a `Synced` event has been emitted
    pub fn is_synced(&self) -> bool {
        *lock(&self.inner.synced)
    }

    /// Emit `Synced` to every registered listener
    pub fn emit_synced(&self) {
        // Flag and delivery share the listeners lock so a joining listener sees one or the other
        let listeners = lock(&self.inner.listeners);
        *lock(&self.inner.synced) = true;
        debug!("Memory wallet emitting Synced");
        for listener in listeners.iter() {
            listener.on_event(SdkEvent::Synced);
        }
    }

    /// Deliver an arbitrary event to every registered listener
    pub fn emit(&self, event: SdkEvent) {
        for listener in lock(&self.inner.listeners).iter() {
            listener.on_event(event.clone());
        }
    }

    /// Current balance, for assertions
    pub fn balance_sat(&self) -> u64 {
        lock(&self.inner.ledger).balance_sat
    }

    fn connected_pubkey(&self) -> SdkResult<String> {
        lock(&self.inner.ledger)
            .pubkey
            .clone()
            .ok_or(SdkError::NotConnected)
    }

    fn invoice_prefix(&self) -> &'static str {
        match lock(&self.inner.ledger).network {
            Some(Network::Mainnet) => "lnbc",
            Some(Network::Regtest) => "lnbcrt",
            _ => "lntb",
        }
    }

    fn seed_history(ledger: &mut Ledger) {
        let now = now_secs();
        ledger.payments.push(SdkPayment {
            tx_id: Some(Uuid::new_v4().to_string()),
            destination: None,
            timestamp: now.saturating_sub(86_400),
            amount_sat: 50_000,
            fees_sat: 0,
            payment_type: SdkPaymentType::Receive,
            status: SdkPaymentState::Complete,
            description: Some("Test payment".to_string()),
        });
        ledger.payments.push(SdkPayment {
            tx_id: Some(Uuid::new_v4().to_string()),
            destination: None,
            timestamp: now.saturating_sub(3_600),
            amount_sat: 25_000,
            fees_sat: 26,
            payment_type: SdkPaymentType::Send,
            status: SdkPaymentState::Complete,
            description: Some("Outgoing payment".to_string()),
        });
    }

    fn record(&self, payment: SdkPayment) {
        lock(&self.inner.ledger).payments.push(payment);
    }
}

impl Default for MemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Amount encoded in a `ln{bc,tb,bcrt}<n>n1...` invoice, in sats
fn bolt11_amount_sat(invoice: &str) -> Option<u64> {
    let rest = ["lnbcrt", "lnbc", "lntb"]
        .iter()
        .find_map(|prefix| invoice.strip_prefix(prefix))?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !rest[digits.len()..].starts_with('n') {
        return None;
    }
    digits.parse::<u64>().ok().map(|nano_btc| nano_btc / 10)
}

fn classify(input: &str) -> SdkResult<InputType> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    let lower = lower.strip_prefix("lightning:").unwrap_or(&lower).to_string();

    if lower.starts_with("lnurl") {
        return Ok(InputType::LnUrlPay {
            data: lnurl_data("lnurl.example.com", None),
        });
    }

    if let Some((user, domain)) = lower.split_once('@') {
        if !user.is_empty() && domain.contains('.') && !domain.contains('@') {
            return Ok(InputType::LnUrlPay {
                data: lnurl_data(domain, Some(lower.clone())),
            });
        }
    }

    if lower.starts_with("lnbc") || lower.starts_with("lntb") {
        return Ok(InputType::Bolt11 {
            amount_sat: bolt11_amount_sat(&lower),
            invoice: lower,
        });
    }

    if lower.starts_with("lno") {
        return Ok(InputType::Bolt12Offer { offer: lower });
    }

    if ["bc1", "tb1", "bcrt1"].iter().any(|p| lower.starts_with(p)) {
        return Ok(InputType::BitcoinAddress {
            address: trimmed.to_string(),
        });
    }

    if ["lq1", "tlq1", "ex1", "tex1"].iter().any(|p| lower.starts_with(p)) {
        return Ok(InputType::LiquidAddress {
            address: trimmed.to_string(),
        });
    }

    if lower.starts_with("https://") || lower.starts_with("http://") {
        return Ok(InputType::Url {
            url: trimmed.to_string(),
        });
    }

    Err(SdkError::InvalidInput(format!(
        "Unrecognized input type: {}",
        trimmed
    )))
}

fn lnurl_data(domain: &str, ln_address: Option<String>) -> LnUrlPayRequestData {
    LnUrlPayRequestData {
        callback: format!("https://{}/lnurlp/callback", domain),
        min_sendable_msat: 1_000,
        max_sendable_msat: 100_000_000_000,
        comment_allowed: 255,
        domain: domain.to_string(),
        ln_address,
    }
}

#[async_trait]
impl WalletConnector for MemoryWallet {
    async fn connect(&self, request: ConnectRequest) -> SdkResult<Arc<dyn WalletSdk>> {
        let attempt = self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.inner.settings.failed_connects {
            return Err(SdkError::Generic(format!(
                "simulated connect failure (attempt {})",
                attempt + 1
            )));
        }

        if request.mnemonic.trim().is_empty() {
            return Err(SdkError::InvalidInput("mnemonic is empty".to_string()));
        }

        {
            let mut ledger = lock(&self.inner.ledger);
            let secret = sha256_hex(&[b"memory-wallet", request.mnemonic.as_bytes()]);
            ledger.pubkey = Some(format!("02{}", sha256_hex(&[secret.as_bytes()])));
            ledger.network = Some(request.network);
            if self.inner.settings.seed_history && ledger.payments.is_empty() {
                Self::seed_history(&mut ledger);
            }
        }

        info!("Memory wallet connected ({:?})", request);

        if let Some(delay) = self.inner.settings.sync_delay {
            let wallet = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                wallet.emit_synced();
            });
        }

        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl WalletSdk for MemoryWallet {
    async fn add_event_listener(&self, listener: Box<dyn EventListener>) -> SdkResult<String> {
        // A listener that joins after the first sync still learns about it
        let mut listeners = lock(&self.inner.listeners);
        if self.is_synced() {
            listener.on_event(SdkEvent::Synced);
        }
        listeners.push(listener);
        Ok(Uuid::new_v4().to_string())
    }

    async fn get_info(&self) -> SdkResult<GetInfoResponse> {
        let pubkey = self.connected_pubkey()?;
        let ledger = lock(&self.inner.ledger);
        let pending = |kind: SdkPaymentType| -> u64 {
            ledger
                .payments
                .iter()
                .filter(|p| p.payment_type == kind && p.status == SdkPaymentState::Pending)
                .map(|p| p.amount_sat)
                .sum()
        };
        Ok(GetInfoResponse {
            wallet_info: SdkWalletInfo {
                balance_sat: ledger.balance_sat,
                pending_send_sat: pending(SdkPaymentType::Send),
                pending_receive_sat: pending(SdkPaymentType::Receive),
                pubkey,
            },
        })
    }

    async fn prepare_receive_payment(
        &self,
        request: PrepareReceiveRequest,
    ) -> SdkResult<PrepareReceiveResponse> {
        self.connected_pubkey()?;
        if request.payment_method == PaymentMethod::Lightning {
            match request.amount_sat {
                Some(amount) if amount > 0 => {}
                _ => {
                    return Err(SdkError::InvalidInput(
                        "Lightning invoices need a positive amount".to_string(),
                    ))
                }
            }
        }
        Ok(PrepareReceiveResponse {
            payment_method: request.payment_method,
            amount_sat: request.amount_sat,
            fees_sat: 0,
        })
    }

    async fn receive_payment(
        &self,
        request: ReceivePaymentRequest,
    ) -> SdkResult<ReceivePaymentResponse> {
        let prepared = request.prepare_response;
        let destination = match prepared.payment_method {
            PaymentMethod::Lightning => {
                let amount = prepared.amount_sat.unwrap_or_default();
                let mut nonce = [0u8; 16];
                OsRng.fill_bytes(&mut nonce);
                let invoice = format!(
                    "{}{}n1p{}",
                    self.invoice_prefix(),
                    amount * 10,
                    hex::encode(nonce)
                );
                self.record(SdkPayment {
                    tx_id: None,
                    destination: Some(invoice.clone()),
                    timestamp: now_secs(),
                    amount_sat: amount,
                    fees_sat: 0,
                    payment_type: SdkPaymentType::Receive,
                    status: SdkPaymentState::Created,
                    description: request.description,
                });
                invoice
            }
            PaymentMethod::BitcoinAddress => self.inner.settings.address.clone(),
            PaymentMethod::LiquidAddress => {
                format!("tlq1qq{}", &sha256_hex(&[self.inner.settings.address.as_bytes()])[..38])
            }
        };
        Ok(ReceivePaymentResponse { destination })
    }

    async fn prepare_send_payment(
        &self,
        request: PrepareSendRequest,
    ) -> SdkResult<PrepareSendResponse> {
        self.connected_pubkey()?;
        let amount_sat = match classify(&request.destination)? {
            InputType::Bolt11 { amount_sat, .. } => amount_sat.or(request.amount_sat),
            InputType::Bolt12Offer { .. }
            | InputType::BitcoinAddress { .. }
            | InputType::LiquidAddress { .. } => request.amount_sat,
            other => {
                return Err(SdkError::InvalidInput(format!(
                    "cannot send to a {} destination",
                    other.kind()
                )))
            }
        }
        .filter(|amount| *amount > 0)
        .ok_or_else(|| SdkError::InvalidInput("amount is required".to_string()))?;

        let fees_sat = fee_for(amount_sat);
        let available_sat = self.balance_sat();
        if amount_sat + fees_sat > available_sat {
            return Err(SdkError::InsufficientFunds {
                needed_sat: amount_sat + fees_sat,
                available_sat,
            });
        }

        Ok(PrepareSendResponse {
            destination: request.destination,
            amount_sat,
            fees_sat,
        })
    }

    async fn send_payment(&self, request: SendPaymentRequest) -> SdkResult<SendPaymentResponse> {
        let prepared = request.prepare_response;
        let total = prepared.amount_sat + prepared.fees_sat;

        let payment = {
            let mut ledger = lock(&self.inner.ledger);
            if total > ledger.balance_sat {
                return Err(SdkError::InsufficientFunds {
                    needed_sat: total,
                    available_sat: ledger.balance_sat,
                });
            }
            ledger.balance_sat -= total;
            let payment = SdkPayment {
                tx_id: Some(Uuid::new_v4().to_string()),
                destination: Some(prepared.destination),
                timestamp: now_secs(),
                amount_sat: prepared.amount_sat,
                fees_sat: prepared.fees_sat,
                payment_type: SdkPaymentType::Send,
                status: self.inner.settings.send_state,
                description: None,
            };
            ledger.payments.push(payment.clone());
            payment
        };

        let event = match payment.status {
            SdkPaymentState::Complete => SdkEvent::PaymentSucceeded { payment: payment.clone() },
            SdkPaymentState::Failed => SdkEvent::PaymentFailed { payment: payment.clone() },
            _ => SdkEvent::PaymentPending { payment: payment.clone() },
        };
        self.emit(event);
        Ok(SendPaymentResponse { payment })
    }

    async fn list_payments(&self, request: ListPaymentsRequest) -> SdkResult<Vec<SdkPayment>> {
        let ledger = lock(&self.inner.ledger);
        let mut payments = ledger.payments.clone();
        payments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = request.offset.unwrap_or(0) as usize;
        let limit = request.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(payments.into_iter().skip(offset).take(limit).collect())
    }

    async fn sign_message(&self, request: SignMessageRequest) -> SdkResult<SignMessageResponse> {
        let pubkey = self.connected_pubkey()?;
        Ok(SignMessageResponse {
            signature: sha256_hex(&[pubkey.as_bytes(), request.message.as_bytes()]),
        })
    }

    async fn check_message(&self, request: CheckMessageRequest) -> SdkResult<CheckMessageResponse> {
        let expected = sha256_hex(&[request.pubkey.as_bytes(), request.message.as_bytes()]);
        Ok(CheckMessageResponse {
            is_valid: expected.eq_ignore_ascii_case(&request.signature),
        })
    }

    async fn parse(&self, input: &str) -> SdkResult<InputType> {
        classify(input)
    }

    async fn prepare_lnurl_pay(
        &self,
        request: PrepareLnUrlPayRequest,
    ) -> SdkResult<PrepareLnUrlPayResponse> {
        self.connected_pubkey()?;
        let amount_msat = request.amount_sat.saturating_mul(1000);
        if amount_msat < request.data.min_sendable_msat
            || amount_msat > request.data.max_sendable_msat
        {
            return Err(SdkError::InvalidInput(format!(
                "amount {} msat outside endpoint range",
                amount_msat
            )));
        }

        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        let destination = format!(
            "{}{}n1p{}",
            self.invoice_prefix(),
            request.amount_sat * 10,
            hex::encode(nonce)
        );

        Ok(PrepareLnUrlPayResponse {
            destination,
            amount_sat: request.amount_sat,
            fees_sat: fee_for(request.amount_sat),
            data: request.data,
            comment: request.comment,
            success_action: self.inner.settings.lnurl_success_action.clone(),
        })
    }

    async fn lnurl_pay(&self, request: LnUrlPayRequest) -> SdkResult<LnUrlPayResult> {
        let prepared = request.prepare_response;
        let success_action = prepared.success_action.clone();
        let send = self
            .send_payment(SendPaymentRequest {
                prepare_response: PrepareSendResponse {
                    destination: prepared.destination.clone(),
                    amount_sat: prepared.amount_sat,
                    fees_sat: prepared.fees_sat,
                },
            })
            .await;

        Ok(match send {
            Ok(response) => LnUrlPayResult::EndpointSuccess {
                payment: response.payment,
                success_action,
            },
            Err(e) => LnUrlPayResult::PayError {
                payment_hash: sha256_hex(&[prepared.destination.as_bytes()]),
                reason: e.to_string(),
            },
        })
    }
}
