//! Payments read model.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Aggregate, Money, Payment, PaymentEvent, PaymentMethod, PaymentStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, ReadModel};

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSummary {
    pub payment_id: AggregateId,
    pub booking_id: AggregateId,
    pub user_id: Option<UserId>,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider_order_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    payments: HashMap<AggregateId, PaymentSummary>,
    by_provider_order: HashMap<String, AggregateId>,
}

/// Read model answering "which payment does this provider order belong to"
/// and per-user payment listings.
#[derive(Clone)]
pub struct PaymentsView {
    state: Arc<RwLock<State>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl PaymentsView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    pub async fn get(&self, payment_id: AggregateId) -> Option<PaymentSummary> {
        self.state.read().await.payments.get(&payment_id).cloned()
    }

    pub async fn get_by_provider_order(&self, provider_order_id: &str) -> Option<PaymentSummary> {
        let state = self.state.read().await;
        state
            .by_provider_order
            .get(provider_order_id)
            .and_then(|id| state.payments.get(id))
            .cloned()
    }

    pub async fn get_by_booking(&self, booking_id: AggregateId) -> Option<PaymentSummary> {
        self.get(Payment::id_for_booking(booking_id)).await
    }

    /// Gets a user's payments, newest first.
    pub async fn get_by_user(&self, user_id: UserId) -> Vec<PaymentSummary> {
        let mut payments: Vec<_> = self
            .state
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.user_id == Some(user_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments
    }
}

impl Default for PaymentsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for PaymentsView {
    fn name(&self) -> &'static str {
        "PaymentsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type == Payment::aggregate_type() {
            let payment_event: PaymentEvent = serde_json::from_value(event.payload.clone())?;
            let payment_id = event.aggregate_id;
            let mut state = self.state.write().await;

            match payment_event {
                PaymentEvent::PaymentOpened(data) => {
                    state.payments.insert(
                        payment_id,
                        PaymentSummary {
                            payment_id,
                            booking_id: data.booking_id,
                            user_id: data.user_id,
                            amount: data.amount,
                            currency: data.currency,
                            method: data.method,
                            status: PaymentStatus::Pending,
                            provider_order_id: None,
                            failure_reason: None,
                            created_at: data.opened_at,
                            updated_at: data.opened_at,
                        },
                    );
                }
                PaymentEvent::ProviderOrderOpened(data) => {
                    state
                        .by_provider_order
                        .insert(data.provider_order_id.clone(), payment_id);
                    if let Some(payment) = state.payments.get_mut(&payment_id) {
                        payment.status = PaymentStatus::Processing;
                        payment.provider_order_id = Some(data.provider_order_id);
                        payment.updated_at = data.opened_at;
                    }
                }
                PaymentEvent::PaymentCompleted(data) => {
                    if let Some(payment) = state.payments.get_mut(&payment_id) {
                        payment.status = PaymentStatus::Completed;
                        payment.updated_at = data.completed_at;
                    }
                }
                PaymentEvent::PaymentFailed(data) => {
                    if let Some(payment) = state.payments.get_mut(&payment_id) {
                        payment.status = PaymentStatus::Failed;
                        payment.failure_reason = Some(data.reason);
                        payment.updated_at = data.failed_at;
                    }
                }
                PaymentEvent::PaymentCancelled(data) => {
                    if let Some(payment) = state.payments.get_mut(&payment_id) {
                        payment.status = PaymentStatus::Cancelled;
                        payment.updated_at = data.cancelled_at;
                    }
                }
            }
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = State::default();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for PaymentsView {
    fn name(&self) -> &'static str {
        "PaymentsView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.payments.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::DomainEvent;
    use domain::payment::PaymentOpenedData;

    fn envelope(payment_id: AggregateId, version: i64, event: &PaymentEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(payment_id)
            .aggregate_type("Payment")
            .event_type(event.event_type())
            .version(event_store::Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn opened(booking_id: AggregateId, user_id: UserId) -> (AggregateId, PaymentEvent) {
        let payment_id = Payment::id_for_booking(booking_id);
        let event = PaymentEvent::PaymentOpened(PaymentOpenedData {
            payment_id,
            booking_id,
            user_id: Some(user_id),
            amount: Money::from_units(100),
            currency: "USD".to_string(),
            method: PaymentMethod::Paypal,
            opened_at: Utc::now(),
        });
        (payment_id, event)
    }

    #[tokio::test]
    async fn test_provider_order_lookup() {
        let view = PaymentsView::new();
        let booking_id = AggregateId::new();
        let (payment_id, event) = opened(booking_id, UserId::new());

        view.handle(&envelope(payment_id, 1, &event)).await.unwrap();
        assert!(view.get_by_provider_order("ORDER-1").await.is_none());

        view.handle(&envelope(
            payment_id,
            2,
            &PaymentEvent::provider_order_opened("ORDER-1", None),
        ))
        .await
        .unwrap();

        let found = view.get_by_provider_order("ORDER-1").await.unwrap();
        assert_eq!(found.payment_id, payment_id);
        assert_eq!(found.status, PaymentStatus::Processing);
        assert_eq!(view.get_by_booking(booking_id).await, Some(found));
    }

    #[tokio::test]
    async fn test_failure_reason_and_user_listing() {
        let view = PaymentsView::new();
        let user_id = UserId::new();
        let (payment_id, event) = opened(AggregateId::new(), user_id);

        view.handle(&envelope(payment_id, 1, &event)).await.unwrap();
        view.handle(&envelope(
            payment_id,
            2,
            &PaymentEvent::payment_failed("Provider order status: DECLINED"),
        ))
        .await
        .unwrap();

        let payments = view.get_by_user(user_id).await;
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Failed);
        assert_eq!(
            payments[0].failure_reason.as_deref(),
            Some("Provider order status: DECLINED")
        );
        assert!(view.get_by_user(UserId::new()).await.is_empty());
    }
}
