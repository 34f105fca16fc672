/// Log de entrada e saída de cada requisição, com o tempo de resposta.
///
/// Complementa o `TraceLayer`: aqui só caminho, status e duração, no
/// formato dos helpers de `utils::logging`.

use axum::{extract::Request, middleware::Next, response::Response};
use tokio::time::Instant;

use crate::utils::logging::{log_request_processed, log_request_received};

pub async fn log_requests(request: Request, next: Next) -> Response {
    let inicio = Instant::now();
    let metodo = request.method().to_string();
    let caminho = request.uri().path().to_string();

    // Health check é chamado a todo instante pelo balanceador
    let silencioso = caminho == "/health";
    if !silencioso {
        log_request_received(&caminho, &metodo);
    }

    let response = next.run(request).await;

    if !silencioso {
        log_request_processed(&caminho, response.status().as_u16(), inicio.elapsed().as_millis() as u64);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_resposta_passa_intacta() {
        let app = Router::new()
            .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "chá") }))
            .layer(axum::middleware::from_fn(log_requests));

        let response = app
            .oneshot(axum::http::Request::builder().uri("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
