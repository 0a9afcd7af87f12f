//! Payment domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::PaymentMethod;

/// Events that can occur on a payment aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    /// Payment record was opened for a booking.
    PaymentOpened(PaymentOpenedData),

    /// Provider accepted the order; customer approval pending.
    ProviderOrderOpened(ProviderOrderOpenedData),

    /// Funds were captured.
    PaymentCompleted(PaymentCompletedData),

    /// Provider rejected or failed the payment.
    PaymentFailed(PaymentFailedData),

    /// Payment was cancelled before capture.
    PaymentCancelled(PaymentCancelledData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentOpened(_) => "PaymentOpened",
            PaymentEvent::ProviderOrderOpened(_) => "ProviderOrderOpened",
            PaymentEvent::PaymentCompleted(_) => "PaymentCompleted",
            PaymentEvent::PaymentFailed(_) => "PaymentFailed",
            PaymentEvent::PaymentCancelled(_) => "PaymentCancelled",
        }
    }
}

/// Data for PaymentOpened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOpenedData {
    pub payment_id: AggregateId,
    pub booking_id: AggregateId,
    pub user_id: Option<UserId>,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    pub opened_at: DateTime<Utc>,
}

/// Data for ProviderOrderOpened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrderOpenedData {
    /// The provider's order id.
    pub provider_order_id: String,

    /// Where the customer approves the payment.
    pub approval_url: Option<String>,

    pub opened_at: DateTime<Utc>,
}

/// Capture details reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDetails {
    pub capture_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_id: Option<String>,
}

/// Data for PaymentCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompletedData {
    #[serde(flatten)]
    pub capture: CaptureDetails,
    pub completed_at: DateTime<Utc>,
}

/// Data for PaymentFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for PaymentCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCancelledData {
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl PaymentEvent {
    pub fn provider_order_opened(
        provider_order_id: impl Into<String>,
        approval_url: Option<String>,
    ) -> Self {
        PaymentEvent::ProviderOrderOpened(ProviderOrderOpenedData {
            provider_order_id: provider_order_id.into(),
            approval_url,
            opened_at: Utc::now(),
        })
    }

    pub fn payment_completed(capture: CaptureDetails) -> Self {
        PaymentEvent::PaymentCompleted(PaymentCompletedData {
            capture,
            completed_at: Utc::now(),
        })
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        PaymentEvent::PaymentFailed(PaymentFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn payment_cancelled() -> Self {
        PaymentEvent::PaymentCancelled(PaymentCancelledData {
            cancelled_at: Utc::now(),
        })
    }
}
