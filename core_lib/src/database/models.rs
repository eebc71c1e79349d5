use serde::Serialize;
use serde_json::{Map, Value};

/// One row of the `users` table.
///
/// Only `id` and `email` are typed; any other column the table happens to
/// have is passed through untouched in `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    #[serde(flatten)]
    pub columns: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub rows_affected: u64,
}

impl UpdateOutcome {
    pub fn is_noop(&self) -> bool {
        self.rows_affected == 0
    }
}
