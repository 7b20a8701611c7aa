use chrono::NaiveDate;
use sea_orm::{DbErr, SqlErr};

use crate::service::session::SessionError;

/// Service-level failures. Validation and conflict errors carry an actionable
/// message; persistence errors are logged by the HTTP layer and reported
/// generically.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("account does not have the requested role")]
    RoleMismatch,
    #[error("email already registered")]
    EmailTaken,
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication required")]
    Unauthorized,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("account creation failed")]
    CreationFailed(#[source] DbErr),
    #[error("{context} failed")]
    Persistence {
        context: &'static str,
        #[source]
        source: DbErr,
    },
    #[error("session store error: {0}")]
    Session(#[from] SessionError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::MissingField(_) => "missing_field",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::WeakPassword(_) => "weak_password",
            ServiceError::PasswordMismatch => "password_mismatch",
            ServiceError::InvalidRole(_) => "invalid_role",
            ServiceError::RoleMismatch => "invalid_role",
            ServiceError::EmailTaken => "email_taken",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::Forbidden => "forbidden",
            ServiceError::CreationFailed(_) => "creation_failed",
            ServiceError::Persistence { .. } => "persistence_error",
            ServiceError::Session(_) => "session_error",
            ServiceError::PasswordHash(_) => "password_hash_failed",
        }
    }

    pub fn db(context: &'static str) -> impl FnOnce(DbErr) -> ServiceError {
        move |source| ServiceError::Persistence { context, source }
    }

    /// Maps a write failure, turning unique-key violations into conflicts.
    pub fn from_write(
        context: &'static str,
        conflict: &'static str,
    ) -> impl FnOnce(DbErr) -> ServiceError {
        move |source| match source.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::Conflict(conflict.to_string())
            }
            _ => ServiceError::Persistence { context, source },
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ServiceError::CreationFailed(_)
                | ServiceError::Persistence { .. }
                | ServiceError::Session(_)
                | ServiceError::PasswordHash(_)
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Required text field: trimmed and non-empty.
pub fn required(field: &'static str, value: Option<&str>) -> ServiceResult<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ServiceError::MissingField(field)),
    }
}

/// Optional text field: blank strings count as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Optional `YYYY-MM-DD` field.
pub fn date(field: &'static str, value: Option<&str>) -> ServiceResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ServiceError::InvalidInput(format!("{field} must be a YYYY-MM-DD date"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_blank_values() {
        assert!(matches!(
            required("email", Some("   ")),
            Err(ServiceError::MissingField("email"))
        ));
        assert!(matches!(required("email", None), Err(ServiceError::MissingField("email"))));
        assert_eq!(required("email", Some(" a@x.com ")).unwrap(), "a@x.com");
    }

    #[test]
    fn optional_drops_blank_strings() {
        assert_eq!(optional(Some("  ".to_string())), None);
        assert_eq!(optional(Some(" O+ ".to_string())), Some("O+".to_string()));
    }

    #[test]
    fn dates_parse_or_explain() {
        assert_eq!(date("hire_date", None).unwrap(), None);
        assert_eq!(
            date("hire_date", Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert!(matches!(
            date("hire_date", Some("29/02/2024")),
            Err(ServiceError::InvalidInput(message)) if message.contains("hire_date")
        ));
    }

    #[test]
    fn internal_errors_are_flagged() {
        let err = ServiceError::Persistence {
            context: "create patient",
            source: DbErr::Custom("boom".to_string()),
        };
        assert!(err.is_internal());
        assert_eq!(err.code(), "persistence_error");
        assert!(!ServiceError::EmailTaken.is_internal());
    }
}
