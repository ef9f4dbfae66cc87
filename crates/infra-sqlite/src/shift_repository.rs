// SQLite ShiftRepository Implementation

use async_trait::async_trait;
use chrono::NaiveDateTime;
use shiftswap_core::domain::{ClaimState, Shift, ShiftId, ShiftStatus};
use shiftswap_core::error::{AppError, Result};
use shiftswap_core::port::ShiftRepository;
use sqlx::SqlitePool;

// sqlx::Error -> AppError, keeping the SQLite result code when there is one
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "275" => AppError::Database(format!(
                        "Check constraint violation: {}",
                        db_err.message()
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

fn parse_status(raw: &str) -> Result<ShiftStatus> {
    raw.parse()
        .map_err(|_| AppError::Database(format!("Unknown shift status in row: {}", raw)))
}

#[derive(sqlx::FromRow)]
struct ShiftRow {
    id: String,
    created_at: i64,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    notes: Option<String>,
    owner_id: String,
    status: String,
    claimer_contact: Option<String>,
}

impl TryFrom<ShiftRow> for Shift {
    type Error = AppError;

    fn try_from(row: ShiftRow) -> Result<Self> {
        Ok(Shift {
            id: row.id,
            created_at: row.created_at,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            notes: row.notes,
            owner_id: row.owner_id,
            status: parse_status(&row.status)?,
            claimer_contact: row.claimer_contact,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClaimStateRow {
    status: String,
    claimer_contact: Option<String>,
    owner_id: String,
}

impl TryFrom<ClaimStateRow> for ClaimState {
    type Error = AppError;

    fn try_from(row: ClaimStateRow) -> Result<Self> {
        Ok(ClaimState {
            status: parse_status(&row.status)?,
            claimer_contact: row.claimer_contact,
            owner_id: row.owner_id,
        })
    }
}

const SELECT_SHIFT: &str = r#"
    SELECT id, created_at, starts_at, ends_at, notes, owner_id, status, claimer_contact
    FROM shifts
"#;

pub struct SqliteShiftRepository {
    pool: SqlitePool,
}

impl SqliteShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftRepository for SqliteShiftRepository {
    async fn find_all(&self) -> Result<Vec<Shift>> {
        let rows: Vec<ShiftRow> =
            sqlx::query_as(&format!("{} ORDER BY starts_at ASC, id ASC", SELECT_SHIFT))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(Shift::try_from).collect()
    }

    async fn find_by_id(&self, id: &ShiftId) -> Result<Option<Shift>> {
        let row: Option<ShiftRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_SHIFT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Shift::try_from).transpose()
    }

    async fn find_claim_state(&self, id: &ShiftId) -> Result<Option<ClaimState>> {
        let row: Option<ClaimStateRow> =
            sqlx::query_as("SELECT status, claimer_contact, owner_id FROM shifts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        row.map(ClaimState::try_from).transpose()
    }

    async fn upsert(&self, shift: &Shift) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shifts (
                id, created_at, starts_at, ends_at, notes, owner_id, status, claimer_contact
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                starts_at = excluded.starts_at,
                ends_at = excluded.ends_at,
                notes = excluded.notes,
                owner_id = excluded.owner_id,
                status = excluded.status,
                claimer_contact = excluded.claimer_contact
            "#,
        )
        .bind(&shift.id)
        .bind(shift.created_at)
        .bind(shift.starts_at)
        .bind(shift.ends_at)
        .bind(&shift.notes)
        .bind(&shift.owner_id)
        .bind(shift.status.as_str())
        .bind(&shift.claimer_contact)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &ShiftId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_if(&self, shift: &Shift, expected: &ClaimState) -> Result<bool> {
        // `IS` compares NULL claimers as equal
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET starts_at = ?, ends_at = ?, notes = ?, owner_id = ?, status = ?, claimer_contact = ?
            WHERE id = ? AND status = ? AND owner_id = ? AND claimer_contact IS ?
            "#,
        )
        .bind(shift.starts_at)
        .bind(shift.ends_at)
        .bind(&shift.notes)
        .bind(&shift.owner_id)
        .bind(shift.status.as_str())
        .bind(&shift.claimer_contact)
        .bind(&shift.id)
        .bind(expected.status.as_str())
        .bind(&expected.owner_id)
        .bind(&expected.claimer_contact)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_if(&self, id: &ShiftId, expected: &ClaimState) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM shifts
            WHERE id = ? AND status = ? AND owner_id = ? AND claimer_contact IS ?
            "#,
        )
        .bind(id)
        .bind(expected.status.as_str())
        .bind(&expected.owner_id)
        .bind(&expected.claimer_contact)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn claim_if_open(&self, id: &ShiftId, claimer: &str) -> Result<bool> {
        // Single conditional UPDATE: the row decides the race
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET status = ?, claimer_contact = ?
            WHERE id = ? AND status = ? AND owner_id <> ?
            "#,
        )
        .bind(ShiftStatus::Claimed.as_str())
        .bind(claimer)
        .bind(id)
        .bind(ShiftStatus::Open.as_str())
        .bind(claimer)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
