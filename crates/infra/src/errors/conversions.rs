//! Conversions from external infrastructure errors into domain errors.

use costsync_domain::CostSyncError;
use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CostSyncError);

impl From<InfraError> for CostSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CostSyncError> for InfraError {
    fn from(value: CostSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoCostSyncError {
    fn into_costsync(self) -> CostSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CostSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCostSyncError for SqlError {
    fn into_costsync(self) -> CostSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => CostSyncError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        CostSyncError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => {
                        CostSyncError::Database(format!("constraint violation: {message}"))
                    }
                    _ => CostSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CostSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CostSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CostSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => CostSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CostSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_costsync())
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(CostSyncError::Database(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CostSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCostSyncError for HttpError {
    fn into_costsync(self) -> CostSyncError {
        if self.is_timeout() {
            return CostSyncError::Network("HTTP request timed out".into());
        }
        if self.is_connect() {
            return CostSyncError::Network("HTTP connection failure".into());
        }
        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return match code {
                404 => CostSyncError::NotFound(message),
                408 | 429 => CostSyncError::Network(message),
                400..=499 => CostSyncError::InvalidInput(message),
                _ => CostSyncError::Network(message),
            };
        }
        CostSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_costsync())
    }
}

/// Shorthand used by the repositories.
pub(crate) fn map_sql_error(err: SqlError) -> CostSyncError {
    CostSyncError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: tokio::task::JoinError) -> CostSyncError {
    if err.is_cancelled() {
        CostSyncError::Internal("blocking task cancelled".into())
    } else {
        CostSyncError::Internal(format!("blocking task panic: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CostSyncError = InfraError::from(err).into();
        match mapped {
            CostSyncError::Database(msg) => assert!(msg.contains("busy")),
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped: CostSyncError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, CostSyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_422_maps_to_invalid_input() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNPROCESSABLE_ENTITY))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: CostSyncError = InfraError::from(error).into();
        match mapped {
            CostSyncError::InvalidInput(msg) => assert!(msg.contains("422")),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }
}
