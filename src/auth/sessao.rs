//! Middleware de sessão
//!
//! Resolve o cookie de sessão, confere dispositivo e inatividade e deixa o
//! usuário logado como extensão da requisição ([`SessaoUsuario`]).

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::models::Nivel;
use crate::services::sessoes;
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// Usuário dono da requisição
#[derive(Debug, Clone, PartialEq)]
pub struct SessaoUsuario {
    pub username: String,
    pub nivel: Nivel,
    pub session_id: String,
}

/// Valor de um cookie do header `Cookie`
pub fn ler_cookie(headers: &HeaderMap, nome: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|par| par.trim().split_once('='))
        .find(|(chave, _)| *chave == nome)
        .map(|(_, valor)| valor.trim().to_string())
        .filter(|valor| !valor.is_empty())
}

/// IP do cliente: proxy (`X-Forwarded-For`, `X-Real-IP`) ou conexão direta
pub fn ip_cliente(headers: &HeaderMap, conexao: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| conexao.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "desconhecido".to_string())
}

/// Identificador de dispositivo da requisição (`User-Agent|ip`)
pub fn dispositivo(headers: &HeaderMap, conexao: Option<SocketAddr>) -> String {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    sessoes::device_id(user_agent, &ip_cliente(headers, conexao))
}

pub fn endereco_conexao(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

pub fn cookie_sessao(nome: &str, session_id: &str) -> String {
    format!("{}={}; HttpOnly; SameSite=Lax; Path=/", nome, session_id)
}

pub fn cookie_removido(nome: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", nome)
}

fn unauthorized_response(erro: AppError, cookie: Option<&str>) -> Response {
    let mut response = erro.into_response();
    if let Some(nome) = cookie {
        if let Ok(valor) = HeaderValue::from_str(&cookie_removido(nome)) {
            response.headers_mut().insert(header::SET_COOKIE, valor);
        }
    }
    response
}

/// Exige uma sessão válida para seguir adiante
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let nome_cookie = state.settings.session.cookie_name.clone();

    let Some(session_id) = ler_cookie(request.headers(), &nome_cookie) else {
        tracing::debug!("Requisição sem cookie de sessão: {}", request.uri().path());
        return Err(unauthorized_response(
            AppError::Unauthorized("Faça login para continuar".into()),
            None,
        ));
    };

    let device = dispositivo(request.headers(), endereco_conexao(&request));
    let timeout = state.settings.session.timeout_seconds;
    let sid = session_id.clone();

    match state
        .db
        .call(move |conn| sessoes::validar(conn, &sid, &device, timeout))
        .await
    {
        Ok(sessao) => {
            request.extensions_mut().insert(SessaoUsuario {
                username: sessao.username,
                nivel: sessao.nivel,
                session_id,
            });
            Ok(next.run(request).await)
        }
        Err(erro @ AppError::Unauthorized(_)) => Err(unauthorized_response(erro, Some(&nome_cookie))),
        Err(erro) => Err(erro.into_response()),
    }
}

/// Falha com `Forbidden` se o perfil da sessão não estiver na lista
pub fn exigir_nivel(sessao: &SessaoUsuario, permitidos: &[Nivel]) -> AppResult<()> {
    if permitidos.contains(&sessao.nivel) {
        Ok(())
    } else {
        tracing::warn!(
            "⛔ {} ({}) tentou acessar área restrita",
            sessao.username,
            sessao.nivel
        );
        Err(AppError::Forbidden("Acesso não autorizado para este perfil".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pares: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pares {
            h.append(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        h
    }

    #[test]
    fn test_ler_cookie() {
        let h = headers(&[("cookie", "tema=escuro; gr_session=abc-123"), ("cookie", "x=1")]);
        assert_eq!(ler_cookie(&h, "gr_session").as_deref(), Some("abc-123"));
        assert_eq!(ler_cookie(&h, "x").as_deref(), Some("1"));
        assert_eq!(ler_cookie(&h, "outro"), None);
        assert_eq!(ler_cookie(&headers(&[("cookie", "gr_session=")]), "gr_session"), None);
    }

    #[test]
    fn test_ip_e_dispositivo() {
        let addr: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        assert_eq!(ip_cliente(&HeaderMap::new(), Some(addr)), "10.0.0.9");
        assert_eq!(ip_cliente(&HeaderMap::new(), None), "desconhecido");

        let h = headers(&[("x-forwarded-for", "200.1.1.1, 10.0.0.1"), ("user-agent", "Mozilla/5.0")]);
        assert_eq!(ip_cliente(&h, Some(addr)), "200.1.1.1");
        assert_eq!(dispositivo(&h, Some(addr)), "Mozilla/5.0|200.1.1.1");
    }

    #[test]
    fn test_exigir_nivel() {
        let sessao = SessaoUsuario {
            username: "bia".into(),
            nivel: Nivel::Gr,
            session_id: "s".into(),
        };
        assert!(exigir_nivel(&sessao, &[Nivel::Gr, Nivel::Admin]).is_ok());
        assert!(matches!(
            exigir_nivel(&sessao, &[Nivel::Admin]).unwrap_err(),
            AppError::Forbidden(_)
        ));
    }

    #[test]
    fn test_cookies() {
        assert_eq!(cookie_sessao("gr_session", "abc"), "gr_session=abc; HttpOnly; SameSite=Lax; Path=/");
        assert!(cookie_removido("gr_session").ends_with("Max-Age=0"));
    }
}
