/// Database row types — these map directly to SQLite rows.
/// Distinct from advisory-types models to keep the DB layer independent.

pub struct AdvisoryRow {
    pub id: String,
    pub message: String,
    pub created_at: String,
}
