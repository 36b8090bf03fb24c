use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A free-text label, attachable to protocols many-to-many. Rows are created
/// lazily by tag resolution the first time a text is seen.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub text: String,
}
