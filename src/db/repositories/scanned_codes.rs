use anyhow::{bail, Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, to_u64},
    models::CodeRecord,
    Database,
};

pub const MIN_STORED_CODE_LEN: usize = 3;
pub const MAX_STORED_CODE_LEN: usize = 50;

const SELECT_COLUMNS: &str = "id, code, user_id, redeemed, redeemed_at, redemption_error, created_at, updated_at";

fn row_to_record(row: &Row) -> Result<CodeRecord> {
    let redeemed_at: Option<String> = row.get("redeemed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let redeemed: i64 = row.get("redeemed")?;

    Ok(CodeRecord {
        id: row.get("id")?,
        code: row.get("code")?,
        user_id: row.get("user_id")?,
        redeemed: redeemed != 0,
        redeemed_at: parse_optional_datetime(redeemed_at, "redeemed_at")?,
        redemption_error: row.get("redemption_error")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

/// Format check applied before anything is written.
pub fn validate_code_format(code: &str) -> Result<()> {
    let len = code.chars().count();
    if !(MIN_STORED_CODE_LEN..=MAX_STORED_CODE_LEN).contains(&len) {
        bail!("invalid code format: expected {MIN_STORED_CODE_LEN}-{MAX_STORED_CODE_LEN} characters, got {len}");
    }
    Ok(())
}

impl Database {
    pub async fn find_code(&self, code: &str) -> Result<Option<CodeRecord>> {
        let code = code.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS}
                 FROM scanned_codes
                 WHERE code = ?1
                 ORDER BY created_at ASC
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query(params![code])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn insert_code(&self, code: &str, user_id: Option<&str>) -> Result<CodeRecord> {
        let code = code.trim();
        validate_code_format(code)?;

        let record = CodeRecord::new(code, user_id.map(str::to_string));
        let row = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO scanned_codes (id, code, user_id, redeemed, redeemed_at, redemption_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, NULL, NULL, ?4, ?5)",
                params![
                    row.id,
                    row.code,
                    row.user_id,
                    row.created_at.to_rfc3339(),
                    row.updated_at.to_rfc3339(),
                ],
            )
            .context("failed to insert scanned code")?;
            Ok(())
        })
        .await?;

        Ok(record)
    }

    pub async fn count_codes(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM scanned_codes", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }
}
