//! Booking–payment saga for the flight booking system.
//!
//! A booking holds one seat per passenger for a limited time while the
//! customer pays. The parts below cannot share a transaction:
//!
//! - [`BookingCoordinator`] reserves seats through [`SeatInventory`], one call
//!   per passenger, and releases every seat it took if a later step fails.
//! - [`PaymentLedger`] keeps one payment per booking and drives it through the
//!   external [`PaymentProvider`].
//! - [`PaymentEventListener`] confirms or cancels bookings when payment events
//!   arrive on the event channel.
//! - [`ExpirationReaper`] expires bookings whose hold window has ended.
//!
//! Collaborator calls go through a per-collaborator [`RetryPolicy`]. Events
//! are published after the state change is committed.

pub mod coordinator;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod listener;
pub mod provider;
pub mod read;
pub mod reaper;
pub mod retry;
pub mod wire;

pub use coordinator::{BookingCoordinator, DEFAULT_HOLD_MINUTES};
pub use error::{Result, SagaError};
pub use inventory::{LocalSeatInventory, SeatInventory};
pub use ledger::{InitiatePayment, Initiated, PaymentLedger, ProviderUrls};
pub use listener::{Handled, PaymentEventListener};
pub use provider::{
    CaptureResult, OrderRequest, PaymentProvider, ProviderOrder, SandboxPaymentProvider,
};
pub use read::ReadModels;
pub use reaper::{DEFAULT_SWEEP_INTERVAL, ExpirationReaper, SweepReport};
pub use retry::RetryPolicy;
