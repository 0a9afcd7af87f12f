//! Payment ledger: one payment per booking, driven through the provider.

use std::sync::Arc;

use common::{AggregateId, UserId};
use domain::{
    Aggregate, CaptureDetails, DEFAULT_CURRENCY, Money, OpenPayment, Opened, Payment, PaymentMethod,
    PaymentService, PaymentStatus,
};
use event_store::EventStore;
use messaging::{EventPublisher, PaymentEventType};

use crate::error::{Result, SagaError};
use crate::provider::{CaptureResult, OrderRequest, PaymentProvider};
use crate::read::ReadModels;
use crate::retry::RetryPolicy;
use crate::wire;

/// Where the provider sends the customer after approving or abandoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUrls {
    pub return_url: String,
    pub cancel_url: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            return_url: "http://localhost:3000/payments/return".to_string(),
            cancel_url: "http://localhost:3000/payments/cancel".to_string(),
        }
    }
}

/// Request to pay for a booking.
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    pub booking_id: AggregateId,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    pub user_id: Option<UserId>,
}

impl InitiatePayment {
    pub fn new(booking_id: AggregateId, amount: Money, method: PaymentMethod) -> Self {
        Self {
            booking_id,
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            method,
            user_id: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    fn to_command(&self) -> OpenPayment {
        let cmd = OpenPayment::new(self.booking_id, self.amount, self.method)
            .with_currency(self.currency.clone());
        match self.user_id {
            Some(user_id) => cmd.with_user(user_id),
            None => cmd,
        }
    }
}

/// Result of [`PaymentLedger::initiate`].
#[derive(Debug)]
pub struct Initiated {
    pub payment: Payment,
    /// Where the customer approves the payment, for provider-based methods.
    pub approval_url: Option<String>,
    /// False when the booking already had a payment and it was returned as is.
    pub created: bool,
}

/// Records payments and drives them through the external provider.
///
/// The booking id is the deduplication key: a booking has at most one
/// payment, however many times or however concurrently `initiate` is called.
pub struct PaymentLedger<S: EventStore> {
    payments: PaymentService<S>,
    provider: Arc<dyn PaymentProvider>,
    read: Arc<ReadModels<S>>,
    publisher: Arc<dyn EventPublisher>,
    retry: RetryPolicy,
    urls: ProviderUrls,
}

impl<S: EventStore> PaymentLedger<S> {
    pub fn new(
        store: S,
        provider: Arc<dyn PaymentProvider>,
        read: Arc<ReadModels<S>>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            payments: PaymentService::new(store),
            provider,
            read,
            publisher,
            retry: RetryPolicy::payment_provider(),
            urls: ProviderUrls::default(),
        }
    }

    pub fn with_urls(mut self, urls: ProviderUrls) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Opens the booking's payment, or returns the existing one unchanged.
    ///
    /// Provider-based methods also open a provider order. If that fails the
    /// payment is recorded as failed, `payment.failed` is published, and the
    /// provider error is returned.
    #[tracing::instrument(skip(self, request), fields(booking_id = %request.booking_id, method = %request.method))]
    pub async fn initiate(&self, request: InitiatePayment) -> Result<Initiated> {
        let payment = match self.payments.open_payment(request.to_command()).await? {
            Opened::Existing(payment) => {
                tracing::info!(payment_id = ?payment.id(), "Payment already exists for booking");
                return Ok(Initiated {
                    approval_url: payment.approval_url().map(str::to_string),
                    payment,
                    created: false,
                });
            }
            Opened::Created(payment) => payment,
        };
        metrics::counter!("payments_initiated_total").increment(1);
        let payment_id = require_id(&payment)?;

        if !request.method.requires_provider() {
            wire::publish_payment(
                self.publisher.as_ref(),
                &payment,
                PaymentEventType::PaymentInitiated,
            )
            .await;
            tracing::info!(%payment_id, "Payment recorded");
            return Ok(Initiated {
                payment,
                approval_url: None,
                created: true,
            });
        }

        let order_request = OrderRequest {
            reference: request.booking_id.to_string(),
            amount: request.amount,
            currency: request.currency.clone(),
            return_url: self.urls.return_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
        };
        let order = self
            .retry
            .run("provider_create_order", || {
                self.provider.create_order(&order_request)
            })
            .await;

        match order {
            Ok(order) => {
                let payment = self
                    .payments
                    .open_provider_order(payment_id, &order.order_id, order.approval_url.clone())
                    .await?
                    .aggregate;
                wire::publish_payment(
                    self.publisher.as_ref(),
                    &payment,
                    PaymentEventType::PaymentInitiated,
                )
                .await;
                tracing::info!(%payment_id, provider_order_id = %order.order_id, "Provider order opened");

                Ok(Initiated {
                    payment,
                    approval_url: order.approval_url,
                    created: true,
                })
            }
            Err(e) => {
                let message = provider_message(&e);
                tracing::warn!(%payment_id, error = %message, "Provider order could not be opened");
                self.record_failure(
                    payment_id,
                    &format!("Failed to create provider order: {message}"),
                )
                .await?;
                Err(SagaError::Provider(message))
            }
        }
    }

    /// Captures the payment behind a provider order.
    ///
    /// Capturing a completed payment returns it unchanged. A declined or
    /// failed capture is recorded as a failed payment and returned as
    /// `Ok`; the failure reason carries the provider's status or error.
    #[tracing::instrument(skip(self))]
    pub async fn capture(&self, provider_order_id: &str) -> Result<Payment> {
        self.read.catch_up().await?;
        let summary = self
            .read
            .payments()
            .get_by_provider_order(provider_order_id)
            .await
            .ok_or_else(|| {
                SagaError::NotFound(format!(
                    "Payment not found for provider order: {provider_order_id}"
                ))
            })?;
        let payment = self.require(summary.payment_id).await?;

        match payment.status() {
            PaymentStatus::Completed => {
                tracing::info!(payment_id = %summary.payment_id, "Payment already captured");
                return Ok(payment);
            }
            PaymentStatus::Processing => {}
            other => {
                return Err(SagaError::InvalidState(format!(
                    "Cannot capture payment in {other} state"
                )));
            }
        }

        let captured = self
            .retry
            .run("provider_capture_order", || {
                self.provider.capture_order(provider_order_id)
            })
            .await;

        match captured {
            Ok(capture) if capture.is_completed() => {
                self.record_capture(summary.payment_id, capture).await
            }
            Ok(capture) => {
                tracing::warn!(
                    payment_id = %summary.payment_id,
                    status = %capture.status,
                    "Provider did not complete the capture"
                );
                self.record_failure(
                    summary.payment_id,
                    &format!("Provider order status: {}", capture.status),
                )
                .await
            }
            Err(e) => {
                let message = provider_message(&e);
                tracing::warn!(payment_id = %summary.payment_id, error = %message, "Capture call failed");
                self.record_failure(summary.payment_id, &format!("Capture failed: {message}"))
                    .await
            }
        }
    }

    async fn record_capture(&self, payment_id: AggregateId, capture: CaptureResult) -> Result<Payment> {
        let details = CaptureDetails {
            capture_id: capture.capture_id,
            payer_email: capture.payer_email,
            payer_id: capture.payer_id,
        };
        let result = self.payments.complete_payment(payment_id, details).await?;

        if !result.events.is_empty() {
            wire::publish_payment(
                self.publisher.as_ref(),
                &result.aggregate,
                PaymentEventType::PaymentCompleted,
            )
            .await;
            metrics::counter!("payments_completed_total").increment(1);
            tracing::info!(%payment_id, "Payment completed");
        }

        Ok(result.aggregate)
    }

    async fn record_failure(&self, payment_id: AggregateId, reason: &str) -> Result<Payment> {
        let payment = self
            .payments
            .fail_payment(payment_id, reason)
            .await?
            .aggregate;

        wire::publish_payment(
            self.publisher.as_ref(),
            &payment,
            PaymentEventType::PaymentFailed,
        )
        .await;
        metrics::counter!("payments_failed_total").increment(1);
        tracing::info!(%payment_id, reason, "Payment failed");

        Ok(payment)
    }

    /// Cancels a payment that has not been captured.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, payment_id: AggregateId) -> Result<Payment> {
        let payment = self.payments.cancel_payment(payment_id).await?.aggregate;

        wire::publish_payment(
            self.publisher.as_ref(),
            &payment,
            PaymentEventType::PaymentCancelled,
        )
        .await;
        metrics::counter!("payments_cancelled_total").increment(1);
        tracing::info!("Payment cancelled");

        Ok(payment)
    }

    pub async fn get(&self, payment_id: AggregateId) -> Result<Payment> {
        self.require(payment_id).await
    }

    pub async fn get_by_booking(&self, booking_id: AggregateId) -> Result<Payment> {
        self.payments
            .get_payment_for_booking(booking_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("Payment not found for booking: {booking_id}")))
    }

    /// Lists a user's payments, newest first.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        self.read.catch_up().await?;
        let summaries = self.read.payments().get_by_user(user_id).await;

        let mut payments = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(payment) = self.payments.get_payment(summary.payment_id).await? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    async fn require(&self, payment_id: AggregateId) -> Result<Payment> {
        self.payments
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("Payment not found: {payment_id}")))
    }
}

fn require_id(payment: &Payment) -> Result<AggregateId> {
    payment
        .id()
        .ok_or_else(|| SagaError::InvalidState("Payment has no id".to_string()))
}

/// The provider's own text, without our error prefix.
fn provider_message(e: &SagaError) -> String {
    match e {
        SagaError::Provider(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SandboxPaymentProvider;
    use event_store::InMemoryEventStore;
    use messaging::{InMemoryBroker, PaymentEventMessage, declare_topology};

    struct Fixture {
        ledger: PaymentLedger<InMemoryEventStore>,
        provider: SandboxPaymentProvider,
        broker: InMemoryBroker,
    }

    fn setup() -> Fixture {
        let store = InMemoryEventStore::new();
        let provider = SandboxPaymentProvider::new();
        let broker = InMemoryBroker::new();
        declare_topology(&broker).unwrap();
        let ledger = PaymentLedger::new(
            store.clone(),
            Arc::new(provider.clone()),
            Arc::new(ReadModels::new(store)),
            Arc::new(broker.clone()),
        )
        .with_retry_policy(RetryPolicy::none());

        Fixture {
            ledger,
            provider,
            broker,
        }
    }

    fn paypal(booking_id: AggregateId) -> InitiatePayment {
        InitiatePayment::new(booking_id, Money::from_units(100), PaymentMethod::Paypal)
    }

    #[tokio::test]
    async fn test_initiate_opens_provider_order() {
        let f = setup();
        let initiated = f.ledger.initiate(paypal(AggregateId::new())).await.unwrap();

        assert!(initiated.created);
        assert_eq!(initiated.payment.status(), PaymentStatus::Processing);
        assert_eq!(
            initiated.payment.provider_order_id(),
            Some("SANDBOX-000001")
        );
        assert!(initiated.approval_url.is_some());
        assert_eq!(f.broker.published_with_key("payment.initiated").len(), 1);
    }

    #[tokio::test]
    async fn test_initiate_twice_returns_existing() {
        let f = setup();
        let booking_id = AggregateId::new();

        let first = f.ledger.initiate(paypal(booking_id)).await.unwrap();
        let second = f.ledger.initiate(paypal(booking_id)).await.unwrap();

        assert!(!second.created);
        assert_eq!(first.payment.id(), second.payment.id());
        assert_eq!(second.approval_url, first.approval_url);
        assert_eq!(f.provider.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_card_payment_skips_provider() {
        let f = setup();
        let request = InitiatePayment::new(
            AggregateId::new(),
            Money::from_units(80),
            PaymentMethod::CreditCard,
        )
        .with_currency("EUR");

        let initiated = f.ledger.initiate(request).await.unwrap();

        assert_eq!(initiated.payment.status(), PaymentStatus::Pending);
        assert_eq!(initiated.payment.currency(), "EUR");
        assert_eq!(initiated.approval_url, None);
        assert_eq!(f.provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_on_initiate_records_failure() {
        let f = setup();
        f.provider.set_fail_on_create(true);
        let booking_id = AggregateId::new();

        let result = f.ledger.initiate(paypal(booking_id)).await;

        assert!(matches!(result, Err(SagaError::Provider(_))));
        let payment = f.ledger.get_by_booking(booking_id).await.unwrap();
        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert!(
            payment
                .failure_reason()
                .unwrap()
                .starts_with("Failed to create provider order: ")
        );
        assert_eq!(f.broker.published_with_key("payment.failed").len(), 1);

        // The failed payment is returned as is; no second provider order.
        f.provider.set_fail_on_create(false);
        let again = f.ledger.initiate(paypal(booking_id)).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.payment.status(), PaymentStatus::Failed);
        assert_eq!(f.provider.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_capture_completes_payment() {
        let f = setup();
        let booking_id = AggregateId::new();
        f.ledger.initiate(paypal(booking_id)).await.unwrap();

        let payment = f.ledger.capture("SANDBOX-000001").await.unwrap();

        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert!(payment.capture().capture_id.is_some());
        let completed = f.broker.published_with_key("payment.completed");
        assert_eq!(completed.len(), 1);
        let message: PaymentEventMessage = completed[0].decode().unwrap();
        assert_eq!(message.booking_id, booking_id);

        let again = f.ledger.capture("SANDBOX-000001").await.unwrap();
        assert_eq!(again.status(), PaymentStatus::Completed);
        assert_eq!(f.provider.capture_calls(), 1);
        assert_eq!(f.broker.published_with_key("payment.completed").len(), 1);
    }

    #[tokio::test]
    async fn test_declined_capture_records_provider_status() {
        let f = setup();
        f.ledger.initiate(paypal(AggregateId::new())).await.unwrap();
        f.provider.set_capture_status(Some("DECLINED"));

        let payment = f.ledger.capture("SANDBOX-000001").await.unwrap();

        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(
            payment.failure_reason(),
            Some("Provider order status: DECLINED")
        );
        assert_eq!(f.broker.published_with_key("payment.failed").len(), 1);
    }

    #[tokio::test]
    async fn test_capture_error_records_failure() {
        let f = setup();
        f.ledger.initiate(paypal(AggregateId::new())).await.unwrap();
        f.provider.set_fail_on_capture(true);

        let payment = f.ledger.capture("SANDBOX-000001").await.unwrap();

        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(
            payment.failure_reason(),
            Some("Capture failed: capture declined by issuer")
        );
    }

    #[tokio::test]
    async fn test_capture_unknown_order_is_not_found() {
        let f = setup();
        let result = f.ledger.capture("SANDBOX-999999").await;
        assert!(matches!(result, Err(SagaError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let f = setup();
        let initiated = f.ledger.initiate(paypal(AggregateId::new())).await.unwrap();
        let payment_id = initiated.payment.id().unwrap();

        let cancelled = f.ledger.cancel(payment_id).await.unwrap();
        assert_eq!(cancelled.status(), PaymentStatus::Cancelled);
        assert_eq!(f.broker.published_with_key("payment.cancelled").len(), 1);

        assert!(matches!(
            f.ledger.cancel(payment_id).await,
            Err(SagaError::InvalidState(_))
        ));
        assert!(matches!(
            f.ledger.capture("SANDBOX-000001").await,
            Err(SagaError::InvalidState(_))
        ));
        assert!(matches!(
            f.ledger.cancel(AggregateId::new()).await,
            Err(SagaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_user() {
        let f = setup();
        let user_id = UserId::new();
        f.ledger
            .initiate(paypal(AggregateId::new()).with_user(user_id))
            .await
            .unwrap();
        f.ledger
            .initiate(paypal(AggregateId::new()).with_user(user_id))
            .await
            .unwrap();
        f.ledger.initiate(paypal(AggregateId::new())).await.unwrap();

        let payments = f.ledger.list_by_user(user_id).await.unwrap();
        assert_eq!(payments.len(), 2);
    }
}
