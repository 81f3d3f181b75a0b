/// Scan job identifiers are sequentially-issued 64-bit integers
/// (BIGSERIAL when backed by PostgreSQL).
pub type JobId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
