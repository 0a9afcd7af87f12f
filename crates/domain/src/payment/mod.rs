//! Payment aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Payment;
pub use commands::{DEFAULT_CURRENCY, OpenPayment};
pub use events::{
    CaptureDetails, PaymentCancelledData, PaymentCompletedData, PaymentEvent, PaymentFailedData,
    PaymentOpenedData, ProviderOrderOpenedData,
};
pub use service::{Opened, PaymentService};
pub use state::{PaymentMethod, PaymentStatus};

use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The booking already has a payment.
    #[error("Payment already opened")]
    AlreadyOpened,

    /// Invalid amount.
    #[error("Invalid amount: {amount} (must be greater than 0)")]
    InvalidAmount { amount: i64 },

    /// Currency is not a three-letter upper-case code.
    #[error("Invalid currency: {currency}")]
    InvalidCurrency { currency: String },

    /// Payment is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: PaymentStatus,
        action: &'static str,
    },
}
