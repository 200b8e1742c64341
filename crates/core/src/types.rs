/// Appointment, user and record ids are opaque strings (UUID v4 for
/// records created by this engine, arbitrary for externally supplied user ids).
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form key/value metadata attached to audit entries.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Generate a fresh record id.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
