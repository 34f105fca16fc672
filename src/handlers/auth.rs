//! Login, logout, troca de senha e solicitações públicas

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::sessao::{cookie_removido, cookie_sessao, dispositivo, ip_cliente};
use crate::auth::SessaoUsuario;
use crate::models::{NovaSolicitacaoRegistro, NovoLog};
use crate::services::auditoria::registrar_log;
use crate::services::{sessoes, solicitacoes, usuarios};
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "usuario")]
    pub username: String,
    #[serde(alias = "senha")]
    pub password: String,
    #[serde(default = "aba_usuario")]
    pub login_type: String,
}

fn aba_usuario() -> String {
    "user".to_string()
}

const CREDENCIAIS_INVALIDAS: &str = "Usuário ou senha inválidos";

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    conexao: Option<ConnectInfo<SocketAddr>>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Response> {
    let username = body.username.trim().to_string();
    if username.is_empty() || body.password.is_empty() {
        return Err(AppError::ValidationError("Preencha usuário e senha".into()));
    }
    let aba_admin = match body.login_type.as_str() {
        "user" => false,
        "admin" => true,
        outro => {
            return Err(AppError::ValidationError(format!("Tipo de login inválido: {}", outro)));
        }
    };

    let endereco = conexao.map(|ConnectInfo(addr)| addr);
    let ip = ip_cliente(&headers, endereco);
    let device = dispositivo(&headers, endereco);

    let resultado = state
        .db
        .call(move |conn| {
            let Some(usuario) = usuarios::verificar(conn, &username, &body.password)? else {
                registrar_log(
                    conn,
                    &NovoLog::new(&username, "login falhou")
                        .descricao("Usuário ou senha inválidos")
                        .ip(Some(ip))
                        .origem("auth"),
                )?;
                log_login_failed(&username, "credenciais inválidas");
                return Err(AppError::Unauthorized(CREDENCIAIS_INVALIDAS.into()));
            };

            // Admin e GR entram por qualquer aba; comum só pela de usuário
            if aba_admin && !usuario.nivel.is_gestao() {
                log_login_failed(&username, "perfil comum na aba administrativa");
                return Err(AppError::Forbidden(
                    "Este usuário não tem acesso administrativo. Use a aba de usuário".into(),
                ));
            }

            let session_id = sessoes::criar(conn, &usuario.username, usuario.nivel, &device)?;
            usuarios::atualizar_ultimo_login(conn, &usuario.username)?;
            registrar_log(
                conn,
                &NovoLog::new(&usuario.username, "login")
                    .nivel(usuario.nivel.as_str())
                    .descricao(format!("Login pela aba {}", if aba_admin { "admin" } else { "user" }))
                    .ip(Some(ip))
                    .origem("auth"),
            )?;
            Ok((usuario, session_id))
        })
        .await;

    let (usuario, session_id) = resultado?;
    log_login(&usuario.username, usuario.nivel.as_str());

    let cookie = cookie_sessao(&state.settings.session.cookie_name, &session_id);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "username": usuario.username,
            "nivel": usuario.nivel,
            "primeiro_login": usuario.deve_trocar_senha(),
            "destino": if usuario.deve_trocar_senha() { "/auth/troca-senha" } else { usuario.nivel.destino_inicial() },
        })),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Response> {
    let SessaoUsuario { username, nivel, session_id } = sessao;
    state
        .db
        .call(move |conn| {
            sessoes::remover(conn, &session_id)?;
            registrar_log(
                conn,
                &NovoLog::new(&username, "logout").nivel(nivel.as_str()).origem("auth"),
            )?;
            Ok(())
        })
        .await?;

    Ok((
        [(header::SET_COOKIE, cookie_removido(&state.settings.session.cookie_name))],
        Json(json!({ "message": "Sessão encerrada" })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct TrocaSenhaRequest {
    pub nova_senha: String,
    pub confirmar_senha: String,
}

pub async fn troca_senha(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Json(body): Json<TrocaSenhaRequest>,
) -> AppResult<Json<Value>> {
    let iteracoes = state.settings.auth.pbkdf2_iterations;
    let username = sessao.username.clone();
    state
        .db
        .call(move |conn| {
            usuarios::trocar_senha_primeiro_login(
                conn,
                &username,
                &body.nova_senha,
                &body.confirmar_senha,
                iteracoes,
            )?;
            registrar_log(
                conn,
                &NovoLog::new(&username, "troca de senha").nivel(sessao.nivel.as_str()).origem("auth"),
            )?;
            Ok(())
        })
        .await?;

    Ok(Json(json!({ "message": "Senha alterada com sucesso" })))
}

pub async fn sessao_atual(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    let username = sessao.username.clone();
    let usuario = state
        .db
        .call(move |conn| usuarios::obter_por_username(conn, &username))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Usuário da sessão não existe mais".into()))?;

    Ok(Json(json!({
        "username": usuario.username,
        "nivel": usuario.nivel,
        "email": usuario.email,
        "primeiro_login": usuario.deve_trocar_senha(),
        "last_login": usuario.last_login,
        "timeout_seconds": state.settings.session.timeout_seconds,
    })))
}

pub async fn solicitar_registro(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NovaSolicitacaoRegistro>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = state
        .db
        .call(move |conn| solicitacoes::solicitar_registro(conn, &body))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "message": "Solicitação enviada. Aguarde a aprovação de um administrador"
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SolicitarSenhaRequest {
    #[serde(alias = "usuario")]
    pub username: String,
}

pub async fn solicitar_senha(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SolicitarSenhaRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = state
        .db
        .call(move |conn| solicitacoes::solicitar_senha(conn, &body.username))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "message": "Solicitação de nova senha registrada"
        })),
    ))
}
