use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Não autorizado: {0}")]
    Unauthorized(String),

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Dados inválidos: {0}")]
    ValidationError(String),

    #[error("Conflito: {0}")]
    Conflict(String),

    #[error("Erro de banco de dados: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Erro de arquivo: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Erro na planilha: {0}")]
    Planilha(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::JsonError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::HttpError(_) | AppError::Planilha(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("tarefa de banco interrompida: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Detalhes internos vão para o log, nunca para o cliente
        let error_message = if status.is_server_error() {
            tracing::error!("❌ {}", self);
            match status {
                StatusCode::BAD_GATEWAY => self.to_string(),
                _ => "Erro interno do servidor".to_string(),
            }
        } else {
            match &self {
                AppError::NotFound(msg)
                | AppError::Unauthorized(msg)
                | AppError::Forbidden(msg)
                | AppError::ValidationError(msg)
                | AppError::Conflict(msg) => msg.clone(),
                other => other.to_string(),
            }
        };

        let body = json!({
            "error": error_message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_por_variante() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Database(rusqlite::Error::QueryReturnedNoRows).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_resposta_nao_vaza_erro_interno() {
        let response = AppError::InternalError("segredo".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
