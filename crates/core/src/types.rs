/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier of a live realtime connection.
///
/// Issued by the server as a UUID v4 string on WebSocket connect; a
/// client reconnecting with the same id within the disconnect grace
/// period resumes ownership of its holds.
pub type SessionId = String;
