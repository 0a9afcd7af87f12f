//! Payment service.

use common::AggregateId;
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{CaptureDetails, OpenPayment, Payment, PaymentError, PaymentEvent};

/// Attempts at a payment status change when a concurrent writer interferes.
const STATUS_WRITE_ATTEMPTS: u32 = 5;

impl From<PaymentError> for DomainError {
    fn from(e: PaymentError) -> Self {
        DomainError::Payment(e)
    }
}

/// Outcome of opening a payment.
#[derive(Debug)]
pub enum Opened {
    /// This call created the payment.
    Created(Payment),
    /// The booking already had a payment, returned unchanged.
    Existing(Payment),
}

impl Opened {
    pub fn payment(&self) -> &Payment {
        match self {
            Opened::Created(p) | Opened::Existing(p) => p,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            Opened::Created(p) | Opened::Existing(p) => p,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Opened::Created(_))
    }
}

/// Service for recording payment state changes.
pub struct PaymentService<S: EventStore> {
    handler: CommandHandler<S, Payment>,
}

impl<S: EventStore> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Payment> {
        &self.handler
    }

    /// Opens the booking's payment, or returns the one that already exists.
    ///
    /// Concurrent callers for the same booking all end up with the same
    /// payment: the losers of the create race read the winner's record.
    #[tracing::instrument(skip(self))]
    pub async fn open_payment(&self, cmd: OpenPayment) -> Result<Opened, DomainError> {
        let payment_id = Payment::id_for_booking(cmd.booking_id);

        if let Some(existing) = self.handler.load_existing(payment_id).await? {
            return Ok(Opened::Existing(existing));
        }

        match self.handler.execute(payment_id, |p| p.open(&cmd)).await {
            Ok(result) => Ok(Opened::Created(result.aggregate)),
            Err(e) if e.is_conflict() || is_already_opened(&e) => {
                tracing::debug!(%payment_id, "Payment opened concurrently, reading winner");
                self.require(payment_id).await.map(Opened::Existing)
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn open_provider_order(
        &self,
        payment_id: AggregateId,
        provider_order_id: &str,
        approval_url: Option<String>,
    ) -> Result<CommandResult<Payment>, DomainError> {
        self.execute_existing(payment_id, |p| {
            p.open_provider_order(provider_order_id, approval_url.clone())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_payment(
        &self,
        payment_id: AggregateId,
        capture: CaptureDetails,
    ) -> Result<CommandResult<Payment>, DomainError> {
        self.execute_existing(payment_id, |p| p.complete(capture.clone()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail_payment(
        &self,
        payment_id: AggregateId,
        reason: &str,
    ) -> Result<CommandResult<Payment>, DomainError> {
        self.execute_existing(payment_id, |p| p.fail(reason)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(
        &self,
        payment_id: AggregateId,
    ) -> Result<CommandResult<Payment>, DomainError> {
        self.execute_existing(payment_id, |p| p.cancel()).await
    }

    pub async fn get_payment(&self, payment_id: AggregateId) -> Result<Option<Payment>, DomainError> {
        self.handler.load_existing(payment_id).await
    }

    /// Gets the payment of a booking, if one was opened.
    pub async fn get_payment_for_booking(
        &self,
        booking_id: AggregateId,
    ) -> Result<Option<Payment>, DomainError> {
        self.get_payment(Payment::id_for_booking(booking_id)).await
    }

    async fn require(&self, payment_id: AggregateId) -> Result<Payment, DomainError> {
        self.handler
            .load_existing(payment_id)
            .await?
            .ok_or_else(|| not_found(payment_id))
    }

    async fn execute_existing<F>(
        &self,
        payment_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<Payment>, DomainError>
    where
        F: Fn(&Payment) -> Result<Vec<PaymentEvent>, PaymentError>,
    {
        self.require(payment_id).await?;
        self.handler
            .execute_with_retry(payment_id, STATUS_WRITE_ATTEMPTS, command_fn)
            .await
    }
}

fn not_found(payment_id: AggregateId) -> DomainError {
    DomainError::AggregateNotFound {
        aggregate_type: Payment::aggregate_type(),
        aggregate_id: payment_id.to_string(),
    }
}

fn is_already_opened(error: &DomainError) -> bool {
    matches!(error, DomainError::Payment(PaymentError::AlreadyOpened))
}
