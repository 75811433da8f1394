//! Error handling and custom error types
//!
//! Provides unified error handling across the service using thiserror. Each
//! error knows the HTTP status it maps to and the localized message shown to
//! the caller; `Display` stays operator-facing and goes to the logs.

use axum::http::StatusCode;
use thiserror::Error;

/// Failure of the single outbound vision-model call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model upstream failure (status {status:?}): {detail}")]
    UpstreamFailure { status: Option<u16>, detail: String },

    #[error("Model upstream rate limited the request")]
    RateLimited,

    #[error("Model upstream quota exhausted")]
    QuotaExhausted,

    #[error("Model returned no message content")]
    EmptyResponse,
}

impl ModelError {
    /// Whether a bounded retry policy may attempt the call again.
    ///
    /// Rate limiting and quota exhaustion are surfaced to the caller as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::UpstreamFailure { .. } | ModelError::EmptyResponse
        )
    }
}

/// Failure to turn raw model output into a [`crate::models::Diagnosis`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Model output is not valid JSON: {0}")]
    Malformed(String),

    #[error("Model output has an invalid diagnosis shape: {0}")]
    InvalidShape(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Image URL is required")]
    MissingImageUrl,

    #[error("Invalid image URL. Only images from the {bucket} storage bucket are allowed.")]
    UntrustedImageUrl { bucket: String },

    #[error("AI service not configured")]
    ModelNotConfigured,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Caller identity could not be resolved")]
    Unauthorized,

    #[error("Diagnosis history is not configured")]
    HistoryUnavailable,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingImageUrl | Error::UntrustedImageUrl { .. } => StatusCode::BAD_REQUEST,
            Error::Model(ModelError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            Error::Model(ModelError::QuotaExhausted) => StatusCode::PAYMENT_REQUIRED,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::HistoryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the end user in the `error` field of the response body.
    pub fn user_message(&self) -> String {
        match self {
            Error::Model(ModelError::RateLimited) => {
                "Çok fazla istek gönderildi. Lütfen birkaç dakika sonra tekrar deneyin.".to_string()
            }
            Error::Model(ModelError::QuotaExhausted) => {
                "AI kredisi tükendi. Lütfen yöneticinizle iletişime geçin.".to_string()
            }
            Error::Model(ModelError::UpstreamFailure { .. }) => {
                "AI analizi başarısız oldu".to_string()
            }
            Error::Model(ModelError::EmptyResponse) => "AI yanıtı alınamadı".to_string(),
            Error::Parse(ParseError::Malformed(_)) => "AI yanıtı işlenemedi".to_string(),
            Error::Parse(ParseError::InvalidShape(_)) => "Geçersiz teşhis formatı".to_string(),
            Error::Unauthorized => "Oturum gerekli".to_string(),
            Error::HistoryUnavailable => "Teşhis geçmişi şu anda kullanılamıyor".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_input_errors_map_to_bad_request() {
        assert_eq!(Error::MissingImageUrl.status_code(), StatusCode::BAD_REQUEST);
        let err = Error::UntrustedImageUrl {
            bucket: "plant-images".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.user_message().contains("plant-images"));
    }

    #[test]
    fn test_upstream_errors_keep_distinct_statuses() {
        assert_eq!(
            Error::from(ModelError::RateLimited).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            Error::from(ModelError::QuotaExhausted).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            Error::from(ModelError::EmptyResponse).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let messages = [
            Error::from(ModelError::RateLimited).user_message(),
            Error::from(ModelError::QuotaExhausted).user_message(),
            Error::from(ModelError::UpstreamFailure {
                status: Some(500),
                detail: "boom".to_string(),
            })
            .user_message(),
            Error::from(ModelError::EmptyResponse).user_message(),
            Error::from(ParseError::Malformed("eof".to_string())).user_message(),
            Error::from(ParseError::InvalidShape("disease".to_string())).user_message(),
        ];

        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_upstream_detail_is_not_leaked_to_user() {
        let err = Error::from(ModelError::UpstreamFailure {
            status: Some(503),
            detail: "internal gateway trace".to_string(),
        });
        assert!(!err.user_message().contains("gateway trace"));
        assert!(err.to_string().contains("gateway trace"));
    }

    #[test]
    fn test_only_transient_model_errors_are_retryable() {
        assert!(ModelError::EmptyResponse.is_retryable());
        assert!(ModelError::UpstreamFailure {
            status: None,
            detail: String::new()
        }
        .is_retryable());
        assert!(!ModelError::RateLimited.is_retryable());
        assert!(!ModelError::QuotaExhausted.is_retryable());
    }
}
