//! Payment state machine and payment methods.

use serde::{Deserialize, Serialize};

/// The status of a payment.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──► Completed
///    │            │
///    ├────────────┴──► Failed
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Recorded, no provider order yet.
    #[default]
    Pending,

    /// Provider order created, awaiting customer approval and capture.
    Processing,

    /// Funds captured (terminal state).
    Completed,

    /// Provider rejected the payment (terminal state).
    Failed,

    /// Cancelled before capture (terminal state).
    Cancelled,
}

impl PaymentStatus {
    /// Returns true if a provider order can be attached in this state.
    pub fn can_open_provider_order(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if the payment can be captured in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, PaymentStatus::Processing)
    }

    /// Returns true if the payment can fail in this state.
    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Returns true if the payment can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Paypal,
    CreditCard,
    DebitCard,
    BankTransfer,
}

impl PaymentMethod {
    /// Returns true if the method goes through the external payment provider.
    pub fn requires_provider(&self) -> bool {
        matches!(self, PaymentMethod::Paypal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
