use tracing::{info, warn, error, debug};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_database_ready(path: &str) {
    info!("🗄️ Banco de dados pronto: {}", path);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Atendimento GR server starting on port {}", port);
}

pub fn log_server_ready(host: &str, port: u16) {
    info!("✅ Server ready and listening on http://{}:{}", host, port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_login(username: &str, nivel: &str) {
    info!("🔓 Login: {} ({})", username, nivel);
}

pub fn log_login_failed(username: &str, motivo: &str) {
    warn!("🔒 Login recusado para '{}': {}", username, motivo);
}

pub fn log_registro_alterado(registro_id: i64, usuario: &str, campos: usize) {
    info!("✏️ Registro {} alterado por {} ({} campos)", registro_id, usuario, campos);
}

pub fn log_sessoes_limpas(removidas: usize) {
    if removidas > 0 {
        info!("🧹 {} sessões inativas removidas", removidas);
    } else {
        debug!("Nenhuma sessão inativa para remover");
    }
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
