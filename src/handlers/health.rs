use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::utils::logging::*;
use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_health_check();

    let banco = match state
        .db
        .call(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?))
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            log_error(&format!("❌ Health check sem banco: {}", e));
            "indisponivel"
        }
    };

    Json(json!({
        "status": if banco == "ok" { "healthy" } else { "degraded" },
        "service": "atendimento-gr",
        "version": env!("CARGO_PKG_VERSION"),
        "database": banco,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
