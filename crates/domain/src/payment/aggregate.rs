//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    CaptureDetails, OpenPayment, PaymentError, PaymentEvent, PaymentMethod, PaymentStatus,
    events::PaymentOpenedData,
};

/// Payment aggregate root.
///
/// A booking has at most one payment: the stream id is derived from the
/// booking id, so two concurrent initiations race for the same stream.
#[derive(Debug, Clone, Default)]
pub struct Payment {
    id: Option<AggregateId>,
    version: Version,
    booking_id: Option<AggregateId>,
    user_id: Option<UserId>,
    amount: Money,
    currency: String,
    method: Option<PaymentMethod>,
    status: PaymentStatus,
    provider_order_id: Option<String>,
    approval_url: Option<String>,
    capture: CaptureDetails,
    failure_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PaymentEvent::PaymentOpened(data) => self.apply_payment_opened(data),
            PaymentEvent::ProviderOrderOpened(data) => {
                self.status = PaymentStatus::Processing;
                self.provider_order_id = Some(data.provider_order_id);
                self.approval_url = data.approval_url;
                self.updated_at = Some(data.opened_at);
            }
            PaymentEvent::PaymentCompleted(data) => {
                self.status = PaymentStatus::Completed;
                self.capture = data.capture;
                self.updated_at = Some(data.completed_at);
                self.completed_at = Some(data.completed_at);
            }
            PaymentEvent::PaymentFailed(data) => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(data.reason);
                self.updated_at = Some(data.failed_at);
                self.completed_at = Some(data.failed_at);
            }
            PaymentEvent::PaymentCancelled(data) => {
                self.status = PaymentStatus::Cancelled;
                self.updated_at = Some(data.cancelled_at);
                self.cancelled_at = Some(data.cancelled_at);
            }
        }
    }
}

// Query methods
impl Payment {
    /// Returns the payment stream id for a booking.
    pub fn id_for_booking(booking_id: AggregateId) -> AggregateId {
        AggregateId::derived("Payment", &booking_id.to_string())
    }

    pub fn booking_id(&self) -> Option<AggregateId> {
        self.booking_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn provider_order_id(&self) -> Option<&str> {
        self.provider_order_id.as_deref()
    }

    pub fn approval_url(&self) -> Option<&str> {
        self.approval_url.as_deref()
    }

    pub fn capture(&self) -> &CaptureDetails {
        &self.capture
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }
}

// Command methods (return events)
impl Payment {
    /// Opens the payment record in `Pending`.
    pub fn open(&self, cmd: &OpenPayment) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyOpened);
        }

        if !cmd.amount.is_positive() {
            return Err(PaymentError::InvalidAmount {
                amount: cmd.amount.cents(),
            });
        }

        if !is_currency_code(&cmd.currency) {
            return Err(PaymentError::InvalidCurrency {
                currency: cmd.currency.clone(),
            });
        }

        Ok(vec![PaymentEvent::PaymentOpened(PaymentOpenedData {
            payment_id: Self::id_for_booking(cmd.booking_id),
            booking_id: cmd.booking_id,
            user_id: cmd.user_id,
            amount: cmd.amount,
            currency: cmd.currency.clone(),
            method: cmd.method,
            opened_at: Utc::now(),
        })])
    }

    /// Records the provider order, moving the payment to `Processing`.
    pub fn open_provider_order(
        &self,
        provider_order_id: &str,
        approval_url: Option<String>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if !self.status.can_open_provider_order() {
            return Err(self.invalid_transition("open provider order"));
        }

        Ok(vec![PaymentEvent::provider_order_opened(
            provider_order_id,
            approval_url,
        )])
    }

    /// Records a successful capture.
    ///
    /// Completing an already completed payment is a no-op.
    pub fn complete(&self, capture: CaptureDetails) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.status == PaymentStatus::Completed {
            return Ok(vec![]);
        }

        if !self.status.can_complete() {
            return Err(self.invalid_transition("complete"));
        }

        Ok(vec![PaymentEvent::payment_completed(capture)])
    }

    /// Records a provider failure.
    pub fn fail(&self, reason: impl Into<String>) -> Result<Vec<PaymentEvent>, PaymentError> {
        if !self.status.can_fail() {
            return Err(self.invalid_transition("fail"));
        }

        Ok(vec![PaymentEvent::payment_failed(reason)])
    }

    /// Cancels the payment before capture.
    pub fn cancel(&self) -> Result<Vec<PaymentEvent>, PaymentError> {
        if !self.status.can_cancel() {
            return Err(self.invalid_transition("cancel"));
        }

        Ok(vec![PaymentEvent::payment_cancelled()])
    }

    fn invalid_transition(&self, action: &'static str) -> PaymentError {
        PaymentError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}

// Apply event helpers
impl Payment {
    fn apply_payment_opened(&mut self, data: PaymentOpenedData) {
        self.id = Some(data.payment_id);
        self.booking_id = Some(data.booking_id);
        self.user_id = data.user_id;
        self.amount = data.amount;
        self.currency = data.currency;
        self.method = Some(data.method);
        self.status = PaymentStatus::Pending;
        self.created_at = Some(data.opened_at);
        self.updated_at = Some(data.opened_at);
    }
}

fn is_currency_code(currency: &str) -> bool {
    currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_cmd() -> OpenPayment {
        OpenPayment::new(AggregateId::new(), Money::from_units(100), PaymentMethod::Paypal)
    }

    fn pending_payment() -> Payment {
        let mut payment = Payment::default();
        payment.apply_events(payment.open(&open_cmd()).unwrap());
        payment
    }

    fn processing_payment() -> Payment {
        let mut payment = pending_payment();
        payment.apply_events(
            payment
                .open_provider_order("ORDER-1", Some("https://pay.test/approve".into()))
                .unwrap(),
        );
        payment
    }

    #[test]
    fn test_payment_id_is_derived_from_booking() {
        let cmd = open_cmd();
        let mut payment = Payment::default();
        payment.apply_events(payment.open(&cmd).unwrap());

        assert_eq!(payment.id(), Some(Payment::id_for_booking(cmd.booking_id)));
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert_eq!(payment.currency(), "USD");
    }

    #[test]
    fn test_open_validation() {
        let mut cmd = open_cmd();
        cmd.amount = Money::zero();
        assert!(matches!(
            Payment::default().open(&cmd),
            Err(PaymentError::InvalidAmount { amount: 0 })
        ));

        let mut cmd = open_cmd();
        cmd.currency = "usd".into();
        assert!(matches!(
            Payment::default().open(&cmd),
            Err(PaymentError::InvalidCurrency { .. })
        ));

        assert!(matches!(
            pending_payment().open(&open_cmd()),
            Err(PaymentError::AlreadyOpened)
        ));
    }

    #[test]
    fn test_provider_order_moves_to_processing() {
        let payment = processing_payment();
        assert_eq!(payment.status(), PaymentStatus::Processing);
        assert_eq!(payment.provider_order_id(), Some("ORDER-1"));
        assert_eq!(payment.approval_url(), Some("https://pay.test/approve"));
    }

    #[test]
    fn test_complete_requires_processing() {
        assert!(pending_payment().complete(CaptureDetails::default()).is_err());

        let mut payment = processing_payment();
        let capture = CaptureDetails {
            capture_id: Some("CAP-1".into()),
            payer_email: Some("payer@example.com".into()),
            payer_id: Some("PAYER-1".into()),
        };
        payment.apply_events(payment.complete(capture.clone()).unwrap());

        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.capture(), &capture);
        assert!(payment.completed_at().is_some());
        assert!(payment.complete(CaptureDetails::default()).unwrap().is_empty());
    }

    #[test]
    fn test_fail_records_reason() {
        let mut payment = pending_payment();
        payment.apply_events(payment.fail("Capture failed: declined").unwrap());

        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(payment.failure_reason(), Some("Capture failed: declined"));
        assert!(payment.completed_at().is_some());
        assert!(payment.cancel().is_err());
    }

    #[test]
    fn test_cancel_rules() {
        let mut payment = processing_payment();
        payment.apply_events(payment.cancel().unwrap());
        assert_eq!(payment.status(), PaymentStatus::Cancelled);
        assert!(payment.cancelled_at().is_some());

        let mut completed = processing_payment();
        completed.apply_events(completed.complete(CaptureDetails::default()).unwrap());
        assert!(matches!(
            completed.cancel(),
            Err(PaymentError::InvalidStateTransition {
                current_state: PaymentStatus::Completed,
                action: "cancel"
            })
        ));
    }
}
