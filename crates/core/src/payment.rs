//! Payment records derived from completed appointments.

use serde::{Deserialize, Serialize};

use crate::types::{new_id, EntityId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Pending,
    Completed,
    Refunded,
}

/// A charge tied to one appointment.
///
/// At most one non-split payment exists per `appointment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: EntityId,
    pub appointment_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<EntityId>,
    pub amount: f64,
    pub status: PaymentRecordStatus,
    /// Split payments share an appointment with other split payments and
    /// are exempt from the one-per-appointment rule.
    #[serde(default)]
    pub is_split: bool,
    pub created_at: Timestamp,
}

impl Payment {
    /// A new pending, non-split payment.
    pub fn pending(appointment_id: impl Into<EntityId>, seed: PaymentSeed, at: Timestamp) -> Self {
        Self {
            id: new_id(),
            appointment_id: appointment_id.into(),
            client_id: seed.client_id,
            amount: seed.total_service_cost.unwrap_or(0.0),
            status: PaymentRecordStatus::Pending,
            is_split: false,
            created_at: at,
        }
    }
}

/// Values used to seed a payment request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentSeed {
    pub client_id: Option<EntityId>,
    pub total_service_cost: Option<f64>,
}
