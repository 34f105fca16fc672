// Biblioteca do Atendimento GR
// Expõe módulos para uso em testes e no binário

pub mod access_control;
pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod historico;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use services::OpcoesFormulario;

/// Folga para cabeçalhos e campos do multipart além do arquivo
const MARGEM_MULTIPART: usize = 64 * 1024;

// AppState é definido aqui para ser compartilhado
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub db: db::Database,
    pub opcoes: Arc<RwLock<OpcoesFormulario>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(settings: config::Settings) -> Self {
        let db = db::Database::new(&settings.database.path, settings.database.busy_timeout_ms);
        Self {
            settings,
            db,
            opcoes: Arc::new(RwLock::new(OpcoesFormulario::default())),
            http: reqwest::Client::new(),
        }
    }
}

/// Monta todas as rotas da API
pub fn build_router(state: Arc<AppState>) -> Router {
    use handlers::{admin, anexos, auth as auth_handlers, gr, health, registros};

    let publicas = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/registro", post(auth_handlers::solicitar_registro))
        .route("/auth/solicitar-senha", post(auth_handlers::solicitar_senha));

    let protegidas = Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route("/auth/troca-senha", post(auth_handlers::troca_senha))
        .route("/auth/sessao", get(auth_handlers::sessao_atual))
        .route("/opcoes", get(registros::opcoes))
        .route("/contadores", get(registros::contadores))
        .route("/registros", get(registros::listar).post(registros::criar))
        .route("/registros/busca", get(registros::busca))
        .route(
            "/registros/:id",
            get(registros::obter).put(registros::atualizar).delete(registros::excluir),
        )
        .route(
            "/registros/:id/anexos/:tipo",
            post(anexos::enviar).get(anexos::baixar).delete(anexos::remover),
        )
        // GR e admin
        .route("/gr/dashboard", get(gr::dashboard))
        .route("/gr/alteracoes", get(gr::alteracoes))
        .route("/gr/registros/:id/historico", get(gr::historico))
        .route("/gr/registros/:id/verificar", post(gr::verificar))
        // Admin
        .route("/admin/usuarios", get(admin::listar_usuarios).post(admin::criar_usuario))
        .route(
            "/admin/usuarios/:id",
            put(admin::atualizar_usuario).delete(admin::excluir_usuario),
        )
        .route("/admin/solicitacoes", get(admin::painel_solicitacoes))
        .route("/admin/solicitacoes/registro/:id/aprovar", post(admin::aprovar_registro))
        .route("/admin/solicitacoes/registro/:id/rejeitar", post(admin::rejeitar_registro))
        .route("/admin/solicitacoes/senha/:id/aprovar", post(admin::aprovar_senha))
        .route("/admin/solicitacoes/senha/:id/rejeitar", post(admin::rejeitar_senha))
        .route("/admin/logs", get(admin::listar_logs).delete(admin::limpar_logs))
        .route("/admin/historico", get(admin::listar_historico))
        .route("/admin/estatisticas", get(admin::estatisticas))
        .route("/admin/backup", post(admin::backup))
        .route("/admin/opcoes/recarregar", post(admin::recarregar_opcoes))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth::require_session));

    let limite = state.settings.uploads.max_bytes + MARGEM_MULTIPART;

    Router::new()
        .merge(publicas)
        .merge(protegidas)
        .layer(DefaultBodyLimit::max(limite))
        .layer(axum_middleware::from_fn(middleware::log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
