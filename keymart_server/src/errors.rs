use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use keymart_engine::{traits::FulfilmentError, PaymentFlowError};
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
    #[error("The payment provider could not be reached. {0}")]
    ProviderUnavailable(String),
    #[error("The payment provider request failed. {0}")]
    ProviderError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProviderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::DatabaseError(FulfilmentError::PaymentNotFound(r)) => {
                ServerError::NoRecordFound(format!("No payment with reference {r}"))
            },
            PaymentFlowError::DatabaseError(FulfilmentError::OrderNotFound(id)) => {
                ServerError::NoRecordFound(format!("No order with id {id}"))
            },
            PaymentFlowError::VerificationError(e) => ServerError::ProviderUnavailable(e.to_string()),
            mismatch @ PaymentFlowError::ProviderMismatch { .. } => {
                ServerError::InvalidRequestPath(mismatch.to_string())
            },
            other => ServerError::BackendError(other.to_string()),
        }
    }
}

impl From<provider_tools::ProviderApiError> for ServerError {
    fn from(e: provider_tools::ProviderApiError) -> Self {
        use provider_tools::ProviderApiError::*;
        match e {
            RestResponseError(m) => ServerError::ProviderUnavailable(m),
            QueryError { status, message } if status >= 500 => ServerError::ProviderUnavailable(message),
            UnsupportedCurrency(c) => ServerError::NoRecordFound(format!("No exchange rate for {c}")),
            other => ServerError::ProviderError(other.to_string()),
        }
    }
}
