use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Time parse error: {0}")]
    TimeParse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provisioner error: {0}")]
    Provisioner(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Chat error: {0}")]
    Chat(#[from] crate::bot::messenger::SendError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TimeParse(_) => StatusCode::BAD_REQUEST,
            AppError::Http(_)
            | AppError::Provisioner(_)
            | AppError::Gateway(_)
            | AppError::Chat(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
        }));
        (code, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
