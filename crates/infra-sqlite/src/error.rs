// sqlx error mapping

use overseer_core::error::AppError;

/// Convert sqlx::Error to AppError::Repository, keeping the SQLite result code
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite result codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "2067" | "1555" => AppError::Repository(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                "5" => AppError::Repository(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => AppError::Repository(format!("Database full: {}", db_err.message())),
                other => AppError::Repository(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => AppError::Repository(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Repository("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Repository(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Repository(err.to_string()),
    }
}
