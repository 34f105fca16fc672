/// Atendimento GR: API de registros de transporte, aprovação SM/AE e auditoria
///
/// - Sessões por cookie, um dispositivo por sessão
/// - Histórico de alterações por registro e log de auditoria
/// - Opções do formulário carregadas de uma planilha remota
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use atendimento_gr::{build_router, config::Settings, services, utils::logging::*, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("atendimento_gr=info,tower_http=info")),
        )
        .init();

    if dotenv.is_ok() {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    let settings = Settings::new()?;
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    let state = AppState::new(settings.clone());
    state.db.inicializar()?;
    log_database_ready(&state.db.path().display().to_string());

    if settings.auth.seed_test_users {
        let iteracoes = settings.auth.pbkdf2_iterations;
        let criados = state
            .db
            .call(move |conn| services::usuarios::semear_usuarios_teste(conn, iteracoes))
            .await?;
        log_info(&format!("👥 {} usuários de teste criados", criados.len()));
    }

    let state = Arc::new(state);

    // Planilha em segundo plano: o servidor sobe com as opções padrão
    {
        let state = state.clone();
        tokio::spawn(async move {
            let opcoes = services::planilha::carregar_ou_padrao(
                &state.http,
                state.settings.planilha.onedrive_url.as_deref(),
                state.settings.planilha.timeout_seconds,
            )
            .await;
            *state.opcoes.write().await = opcoes;
        });
    }

    // Limpeza periódica de sessões inativas
    {
        let state = state.clone();
        let intervalo = Duration::from_secs(settings.session.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervalo);
            loop {
                ticker.tick().await;
                let timeout = state.settings.session.timeout_seconds;
                match state
                    .db
                    .call(move |conn| services::sessoes::limpar_inativas(conn, timeout))
                    .await
                {
                    Ok(removidas) => log_sessoes_limpas(removidas),
                    Err(e) => log_error(&format!("❌ Falha ao limpar sessões: {}", e)),
                }
            }
        });
    }

    let app = build_router(state);

    let port = settings.porta();
    let listener = TcpListener::bind(format!("{}:{}", settings.server.host, port)).await?;

    log_server_startup(port);
    log_server_ready(&settings.server.host, port);

    // Graceful shutdown com signal handling
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("❌ Falha ao instalar handler de Ctrl+C: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sinal) => {
                sinal.recv().await;
            }
            Err(e) => {
                log_error(&format!("❌ Falha ao instalar handler de SIGTERM: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log_info("📴 Sinal de desligamento recebido");
}
