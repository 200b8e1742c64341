//! Derived payments for completed appointments.
//!
//! [`PaymentTrigger`] reacts to transitions into `completed` and asks a
//! [`PaymentRequester`] for the appointment's payment. [`PaymentLedger`] is
//! the in-process requester: it keeps at most one non-split payment per
//! appointment and returns the existing one when asked again.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use salon_core::appointment::Appointment;
use salon_core::payment::{Payment, PaymentSeed};
use salon_core::status::AppointmentStatus;
use salon_db::{keys, load_with_timeout, KeyValueStore};

use crate::bus::{BookingEvent, EventBus, TransitionEvent};
use crate::flush::FlushQueue;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid payment amount {0} for appointment {1}")]
    InvalidAmount(f64, String),

    #[error("Payment service unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// PaymentRequester
// ---------------------------------------------------------------------------

/// Creates (or returns) the payment for an appointment.
///
/// Implementations must be idempotent: asking twice for the same
/// appointment returns the first payment unchanged.
#[async_trait]
pub trait PaymentRequester: Send + Sync {
    async fn request_payment_for_appointment(
        &self,
        appointment_id: &str,
        seed: PaymentSeed,
    ) -> Result<Payment, PaymentError>;
}

// ---------------------------------------------------------------------------
// PaymentLedger
// ---------------------------------------------------------------------------

pub struct PaymentLedger {
    payments: RwLock<Vec<Payment>>,
    flush: FlushQueue,
}

impl PaymentLedger {
    pub fn new(flush: FlushQueue) -> Self {
        Self::with_payments(flush, Vec::new())
    }

    pub fn with_payments(flush: FlushQueue, payments: Vec<Payment>) -> Self {
        Self {
            payments: RwLock::new(payments),
            flush,
        }
    }

    /// Restore from storage; an unreachable or malformed snapshot starts empty.
    pub async fn load(store: &dyn KeyValueStore, deadline: Duration, flush: FlushQueue) -> Self {
        let payments =
            match load_with_timeout::<Vec<Payment>>(store, keys::PAYMENTS, deadline).await {
                Ok(Some(payments)) => {
                    tracing::info!(count = payments.len(), "Loaded payments");
                    payments
                }
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not load payments, starting empty");
                    Vec::new()
                }
            };
        Self::with_payments(flush, payments)
    }

    /// The non-split payment for an appointment, if any.
    pub async fn payment_for(&self, appointment_id: &str) -> Option<Payment> {
        self.payments
            .read()
            .await
            .iter()
            .find(|p| p.appointment_id == appointment_id && !p.is_split)
            .cloned()
    }

    pub async fn all(&self) -> Vec<Payment> {
        self.payments.read().await.clone()
    }
}

#[async_trait]
impl PaymentRequester for PaymentLedger {
    async fn request_payment_for_appointment(
        &self,
        appointment_id: &str,
        seed: PaymentSeed,
    ) -> Result<Payment, PaymentError> {
        if let Some(amount) = seed.total_service_cost {
            if !amount.is_finite() || amount < 0.0 {
                return Err(PaymentError::InvalidAmount(amount, appointment_id.to_owned()));
            }
        }

        let mut payments = self.payments.write().await;
        if let Some(existing) = payments
            .iter()
            .find(|p| p.appointment_id == appointment_id && !p.is_split)
        {
            tracing::debug!(appointment_id, payment_id = %existing.id, "Payment already exists");
            return Ok(existing.clone());
        }

        let payment = Payment::pending(appointment_id, seed, Utc::now());
        payments.push(payment.clone());
        self.flush.enqueue_json(keys::PAYMENTS, &*payments);
        tracing::info!(
            appointment_id,
            payment_id = %payment.id,
            amount = payment.amount,
            "Payment requested"
        );
        Ok(payment)
    }
}

// ---------------------------------------------------------------------------
// PaymentTrigger
// ---------------------------------------------------------------------------

/// Requests a payment whenever an appointment is completed.
pub struct PaymentTrigger {
    requester: Arc<dyn PaymentRequester>,
    /// Held weakly: `run` ends once every owner has dropped the bus.
    bus: Weak<EventBus>,
}

impl PaymentTrigger {
    pub fn new(requester: Arc<dyn PaymentRequester>, bus: Arc<EventBus>) -> Self {
        Self {
            requester,
            bus: Arc::downgrade(&bus),
        }
    }

    /// Run the trigger loop until the bus is closed.
    pub async fn run(self, mut receiver: broadcast::Receiver<BookingEvent>) {
        loop {
            match receiver.recv().await {
                Ok(BookingEvent::StatusChanged(event)) => {
                    if let Err(e) = self.handle(&event).await {
                        tracing::error!(
                            appointment_id = %event.appointment.id,
                            error = %e,
                            "Failed to request payment"
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Payment trigger lagged, run reconcile to catch up");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, payment trigger shutting down");
                    break;
                }
            }
        }
    }

    /// React to one transition. Returns the payment when the transition was a
    /// completion.
    pub async fn handle(&self, event: &TransitionEvent) -> Result<Option<Payment>, PaymentError> {
        if event.change.to_status != AppointmentStatus::Completed {
            return Ok(None);
        }
        let payment = self.request_for(&event.appointment).await?;
        if let Some(bus) = self.bus.upgrade() {
            bus.publish(BookingEvent::PaymentRequested(payment.clone()));
        }
        Ok(Some(payment))
    }

    /// Ensure every completed appointment has a payment.
    ///
    /// Used at startup to cover completions whose event was never handled.
    /// Safe to run any number of times.
    pub async fn reconcile(&self, appointments: &[Appointment]) -> usize {
        let mut ensured = 0;
        for appt in appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
        {
            match self.request_for(appt).await {
                Ok(_) => ensured += 1,
                Err(e) => {
                    tracing::error!(appointment_id = %appt.id, error = %e, "Reconcile failed");
                }
            }
        }
        tracing::debug!(ensured, "Payment reconcile finished");
        ensured
    }

    async fn request_for(&self, appointment: &Appointment) -> Result<Payment, PaymentError> {
        let seed = PaymentSeed {
            client_id: Some(appointment.client_id.clone()),
            total_service_cost: Some(appointment.total_amount),
        };
        self.requester
            .request_payment_for_appointment(&appointment.id, seed)
            .await
    }
}
