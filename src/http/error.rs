//! HTTP error handling. Every failure renders as `{"error": "<message>"}`.

use crate::proxy::ProxyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not found")]
    NotFound,
    #[error("WebSocket upgrade required: {0}")]
    UpgradeRequired(String),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::UpgradeRequired(_) => StatusCode::UPGRADE_REQUIRED,
            GatewayError::Proxy(e) => match e {
                ProxyError::MissingParameter(_)
                | ProxyError::InvalidParameter(_)
                | ProxyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                ProxyError::DomainNotAllowed(_) => StatusCode::FORBIDDEN,
                ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ProxyError::NotConfigured(_) | ProxyError::Token(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ProxyError::TooManyRedirects
                | ProxyError::BadRedirect
                | ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
