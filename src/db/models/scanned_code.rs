//! Persisted reward codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    pub id: String,
    pub code: String,
    pub user_id: Option<String>,
    pub redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redemption_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeRecord {
    pub fn new(code: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            user_id,
            redeemed: false,
            redeemed_at: None,
            redemption_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
