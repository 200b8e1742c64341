use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl CoreError {
    /// Shorthand for a missing appointment.
    pub fn appointment_not_found(id: impl Into<EntityId>) -> Self {
        Self::NotFound {
            entity: "Appointment",
            id: id.into(),
        }
    }
}
