/// Middleware layer para o Axum router
///
/// - Log de requisições com tempo de resposta
/// - Sessão e guardas de perfil ficam em `crate::auth`

pub mod request_log;

pub use request_log::log_requests;
