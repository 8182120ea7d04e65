use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use airtime_payment_engine::{AccountApiError, LedgerError, SettingsApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The account is suspended.")]
    AccountSuspended,
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("Insufficient funds. {0}")]
    InsufficientFunds(String),
    #[error("The payment provider declined the request. {0}")]
    ProviderDeclined(String),
    #[error("The payment provider could not be reached. {0}")]
    ProviderUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::AccountSuspended => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds(_) => StatusCode::PAYMENT_REQUIRED,
            Self::ProviderDeclined(_) => StatusCode::BAD_GATEWAY,
            Self::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountNotFound(_) |
            LedgerError::TransactionNotFound(_) |
            LedgerError::VerificationNotFound(_) => Self::NoRecordFound(e.to_string()),
            LedgerError::AccountSuspended(_) => Self::AccountSuspended,
            LedgerError::AccountAlreadyExists(_) |
            LedgerError::ReferenceAlreadyExists(_) |
            LedgerError::DuplicateReceipt(_) |
            LedgerError::ConflictingState(_) => Self::Conflict(e.to_string()),
            LedgerError::InvalidAmount { .. } | LedgerError::ValidationError(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            LedgerError::InsufficientFunds { .. } => Self::InsufficientFunds(e.to_string()),
            LedgerError::ProviderDeclined { .. } => Self::ProviderDeclined(e.to_string()),
            LedgerError::ProviderUnavailable(_) => Self::ProviderUnavailable(e.to_string()),
            LedgerError::DatabaseError(_) | LedgerError::AccountError(_) | LedgerError::SettingsError(_) => {
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::QueryError(m) => Self::InvalidRequestBody(m),
            AccountApiError::DatabaseError(m) => Self::BackendError(m),
        }
    }
}

impl From<SettingsApiError> for ServerError {
    fn from(e: SettingsApiError) -> Self {
        match e {
            SettingsApiError::UnknownSetting(_) => Self::NoRecordFound(e.to_string()),
            SettingsApiError::InvalidValue { .. } => Self::InvalidRequestBody(e.to_string()),
            SettingsApiError::DatabaseError(m) => Self::BackendError(m),
        }
    }
}
