//! External payment provider contract and an in-process sandbox.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::Money;

use crate::error::{Result, SagaError};

/// Provider status of a captured order.
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// An order to open with the provider.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Our reference for the order; the booking id.
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// An order as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOrder {
    pub order_id: String,
    pub status: String,
    /// Where the customer approves the payment.
    pub approval_url: Option<String>,
}

/// Result of a capture call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub status: String,
    pub capture_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_id: Option<String>,
}

impl CaptureResult {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_COMPLETED)
    }
}

/// What the payment ledger needs from an external payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder>;

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult>;

    async fn get_order(&self, order_id: &str) -> Result<ProviderOrder>;
}

#[derive(Debug)]
struct SandboxOrder {
    order: ProviderOrder,
    capture: Option<CaptureResult>,
}

#[derive(Debug, Default)]
struct SandboxState {
    orders: HashMap<String, SandboxOrder>,
    next_id: u32,
    create_calls: u32,
    capture_calls: u32,
    fail_on_create: bool,
    fail_on_capture: bool,
    capture_status: Option<String>,
    unavailable_calls: u32,
}

/// In-process provider that approves every order.
///
/// Failure toggles let tests and local runs drive the failure paths.
#[derive(Debug, Clone, Default)]
pub struct SandboxPaymentProvider {
    state: Arc<RwLock<SandboxState>>,
}

impl SandboxPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SandboxState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SandboxState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects every order creation while set.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_on_create = fail;
    }

    /// Makes every capture call error while set.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.write().fail_on_capture = fail;
    }

    /// Reports captures with this status instead of `COMPLETED`.
    pub fn set_capture_status(&self, status: Option<&str>) {
        self.write().capture_status = status.map(str::to_string);
    }

    /// Makes the next `calls` calls fail as unreachable.
    pub fn fail_next_calls(&self, calls: u32) {
        self.write().unavailable_calls = calls;
    }

    pub fn create_calls(&self) -> u32 {
        self.read().create_calls
    }

    pub fn capture_calls(&self) -> u32 {
        self.read().capture_calls
    }

    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    fn take_unavailable(state: &mut SandboxState) -> Result<()> {
        if state.unavailable_calls > 0 {
            state.unavailable_calls -= 1;
            return Err(SagaError::Unavailable {
                collaborator: "payment provider",
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for SandboxPaymentProvider {
    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder> {
        let mut state = self.write();
        state.create_calls += 1;
        Self::take_unavailable(&mut state)?;

        if state.fail_on_create {
            return Err(SagaError::Provider(format!(
                "order for {} {} rejected",
                request.amount.to_decimal_string(),
                request.currency
            )));
        }

        state.next_id += 1;
        let order_id = format!("SANDBOX-{:06}", state.next_id);
        let order = ProviderOrder {
            order_id: order_id.clone(),
            status: "CREATED".to_string(),
            approval_url: Some(format!(
                "https://sandbox.pay.test/checkoutnow?token={order_id}"
            )),
        };
        state.orders.insert(
            order_id,
            SandboxOrder {
                order: order.clone(),
                capture: None,
            },
        );
        Ok(order)
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult> {
        let mut state = self.write();
        state.capture_calls += 1;
        Self::take_unavailable(&mut state)?;

        if state.fail_on_capture {
            return Err(SagaError::Provider("capture declined by issuer".to_string()));
        }

        let status = state
            .capture_status
            .clone()
            .unwrap_or_else(|| STATUS_COMPLETED.to_string());
        let sequence = state.capture_calls;

        let entry = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| SagaError::Provider(format!("order {order_id} does not exist")))?;

        if let Some(capture) = &entry.capture {
            return Ok(capture.clone());
        }

        let completed = status.eq_ignore_ascii_case(STATUS_COMPLETED);
        let capture = CaptureResult {
            status: status.clone(),
            capture_id: completed.then(|| format!("CAPTURE-{sequence:06}")),
            payer_email: completed.then(|| "buyer@sandbox.pay.test".to_string()),
            payer_id: completed.then(|| "SANDBOXPAYER".to_string()),
        };
        entry.order.status = status;
        if completed {
            entry.capture = Some(capture.clone());
        }
        Ok(capture)
    }

    async fn get_order(&self, order_id: &str) -> Result<ProviderOrder> {
        self.read()
            .orders
            .get(order_id)
            .map(|o| o.order.clone())
            .ok_or_else(|| SagaError::Provider(format!("order {order_id} does not exist")))
    }
}
