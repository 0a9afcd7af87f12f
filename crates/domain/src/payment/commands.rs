//! Payment commands.

use common::{AggregateId, UserId};

use crate::command::Command;
use crate::money::Money;

use super::{Payment, PaymentMethod};

/// Default currency when the caller supplies none.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Command to open the payment of a booking.
#[derive(Debug, Clone)]
pub struct OpenPayment {
    pub booking_id: AggregateId,
    pub user_id: Option<UserId>,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
}

impl OpenPayment {
    /// Creates a new OpenPayment command in the default currency.
    pub fn new(booking_id: AggregateId, amount: Money, method: PaymentMethod) -> Self {
        Self {
            booking_id,
            user_id: None,
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            method,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

impl Command for OpenPayment {
    type Aggregate = Payment;

    fn aggregate_id(&self) -> AggregateId {
        Payment::id_for_booking(self.booking_id)
    }
}
