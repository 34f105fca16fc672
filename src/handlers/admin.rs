//! Área administrativa: usuários, solicitações, logs, histórico e manutenção

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{deslocamento, paginacao, total_paginas};
use crate::auth::{exigir_nivel, SessaoUsuario};
use crate::historico::gravacao;
use crate::models::{FiltrosLog, Nivel, NovoLog, NovoUsuario};
use crate::services::auditoria::{self, registrar_log};
use crate::services::{dashboard, manutencao, planilha, solicitacoes, usuarios};
use crate::utils::datas::parse_data;
use crate::utils::logging::log_info;
use crate::utils::{AppError, AppResult};
use crate::AppState;

const SO_ADMIN: &[Nivel] = &[Nivel::Admin];

// ----------------------------------------------------------------------------
// Usuários
// ----------------------------------------------------------------------------

pub async fn listar_usuarios(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let lista = state.db.call(|conn| usuarios::listar(conn)).await?;
    Ok(Json(json!({ "total": lista.len(), "usuarios": lista })))
}

pub async fn criar_usuario(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Json(novo): Json<NovoUsuario>,
) -> AppResult<(StatusCode, Json<Value>)> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let iteracoes = state.settings.auth.pbkdf2_iterations;
    let admin = sessao.username.clone();

    let id = state
        .db
        .call(move |conn| {
            let id = usuarios::criar(conn, &novo, iteracoes)?;
            registrar_log(
                conn,
                &NovoLog::new(&admin, "criação de usuário")
                    .nivel("admin")
                    .descricao(format!("Usuário {} criado com nível {}", novo.username.trim(), novo.nivel))
                    .origem("admin"),
            )?;
            Ok(id)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id, "message": "Usuário criado com sucesso" }))))
}

#[derive(Debug, Deserialize)]
pub struct AtualizarUsuarioRequest {
    pub nivel: Option<Nivel>,
    pub email: Option<String>,
    /// Nova senha temporária (o usuário troca no próximo login)
    pub nova_senha: Option<String>,
}

pub async fn atualizar_usuario(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
    Json(body): Json<AtualizarUsuarioRequest>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let iteracoes = state.settings.auth.pbkdf2_iterations;
    let admin = sessao.username.clone();

    let usuario = state
        .db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let usuario = usuarios::atualizar(&tx, id, body.nivel, body.email)?;
            let senha_redefinida = match body.nova_senha.as_deref().filter(|s| !s.is_empty()) {
                Some(senha) => {
                    usuarios::alterar_senha(&tx, id, senha, iteracoes, true)?;
                    true
                }
                None => false,
            };
            registrar_log(
                &tx,
                &NovoLog::new(&admin, "edição de usuário")
                    .nivel("admin")
                    .descricao(format!(
                        "Usuário {} atualizado (nível {}{})",
                        usuario.username,
                        usuario.nivel,
                        if senha_redefinida { ", senha redefinida" } else { "" }
                    ))
                    .origem("admin"),
            )?;
            tx.commit()?;
            Ok(usuario)
        })
        .await?;

    Ok(Json(json!({ "message": "Usuário atualizado", "usuario": usuario })))
}

pub async fn excluir_usuario(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let admin = sessao.username.clone();

    let removido = state
        .db
        .call(move |conn| {
            let removido = usuarios::excluir(conn, id, &admin)?;
            registrar_log(
                conn,
                &NovoLog::new(&admin, "exclusão de usuário")
                    .nivel("admin")
                    .descricao(format!("Usuário {} excluído", removido.username))
                    .origem("admin"),
            )?;
            Ok(removido)
        })
        .await?;

    Ok(Json(json!({ "message": format!("Usuário {} excluído", removido.username) })))
}

// ----------------------------------------------------------------------------
// Solicitações
// ----------------------------------------------------------------------------

pub async fn painel_solicitacoes(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<solicitacoes::PainelSolicitacoes>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    Ok(Json(state.db.call(|conn| solicitacoes::painel(conn)).await?))
}

#[derive(Debug, Deserialize)]
pub struct AprovarRegistroRequest {
    pub nivel: Nivel,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejeitarRequest {
    pub motivo: Option<String>,
}

pub async fn aprovar_registro(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
    Json(body): Json<AprovarRegistroRequest>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let iteracoes = state.settings.auth.pbkdf2_iterations;
    let admin = sessao.username.clone();
    let senha = state
        .db
        .call(move |conn| solicitacoes::aprovar_registro(conn, id, body.nivel, &admin, iteracoes))
        .await?;

    // A senha temporária só aparece nesta resposta
    Ok(Json(json!({
        "message": format!("Usuário {} criado", senha.username),
        "username": senha.username,
        "senha_temporaria": senha.senha_temporaria,
    })))
}

pub async fn rejeitar_registro(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
    body: Option<Json<RejeitarRequest>>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let motivo = body.and_then(|Json(b)| b.motivo);
    let admin = sessao.username.clone();
    state
        .db
        .call(move |conn| solicitacoes::rejeitar_registro(conn, id, motivo.as_deref(), &admin))
        .await?;
    Ok(Json(json!({ "message": "Solicitação rejeitada" })))
}

pub async fn aprovar_senha(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let iteracoes = state.settings.auth.pbkdf2_iterations;
    let admin = sessao.username.clone();
    let senha = state
        .db
        .call(move |conn| solicitacoes::aprovar_senha(conn, id, &admin, iteracoes))
        .await?;
    Ok(Json(json!({
        "message": format!("Senha temporária gerada para {}", senha.username),
        "username": senha.username,
        "senha_temporaria": senha.senha_temporaria,
    })))
}

pub async fn rejeitar_senha(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
    body: Option<Json<RejeitarRequest>>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let motivo = body.and_then(|Json(b)| b.motivo);
    let admin = sessao.username.clone();
    state
        .db
        .call(move |conn| solicitacoes::rejeitar_senha(conn, id, motivo.as_deref(), &admin))
        .await?;
    Ok(Json(json!({ "message": "Solicitação rejeitada" })))
}

// ----------------------------------------------------------------------------
// Logs, histórico e estatísticas
// ----------------------------------------------------------------------------

fn filtros_log(query: &HashMap<String, String>) -> AppResult<FiltrosLog> {
    let texto = |chave: &str| {
        query
            .get(chave)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let registro_id = match texto("registro_id") {
        Some(v) => Some(
            v.parse::<i64>()
                .map_err(|_| AppError::ValidationError(format!("registro_id inválido: {}", v)))?,
        ),
        None => None,
    };
    Ok(FiltrosLog {
        usuario: texto("usuario"),
        nivel: texto("nivel"),
        acao: texto("acao"),
        data_inicio: texto("data_inicio"),
        data_fim: texto("data_fim"),
        registro_id,
    })
}

pub async fn listar_logs(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<auditoria::PaginaLogs>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let filtros = filtros_log(&query)?;
    let (pagina, por_pagina) = paginacao(&query, 50);
    let logs = state
        .db
        .call(move |conn| auditoria::obter_logs(conn, &filtros, pagina, por_pagina))
        .await?;
    Ok(Json(logs))
}

pub async fn limpar_logs(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let antes_de = match query.get("antes_de").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => Some(
            parse_data(v).ok_or_else(|| AppError::ValidationError(format!("Data inválida: {}", v)))?,
        ),
        None => None,
    };
    let admin = sessao.username.clone();
    let removidos = state
        .db
        .call(move |conn| auditoria::limpar_logs(conn, antes_de, &admin))
        .await?;
    Ok(Json(json!({ "message": format!("{} registros de log removidos", removidos), "removidos": removidos })))
}

pub async fn listar_historico(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let (pagina, por_pagina) = paginacao(&query, 50);
    let offset = deslocamento(pagina, por_pagina);
    let (entradas, total) = state
        .db
        .call(move |conn| Ok((gravacao::listar(conn, por_pagina, offset)?, gravacao::contar(conn)?)))
        .await?;
    Ok(Json(json!({
        "historico": entradas,
        "total": total,
        "pagina": pagina,
        "por_pagina": por_pagina,
        "total_paginas": total_paginas(total, por_pagina),
    })))
}

pub async fn estatisticas(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<dashboard::Estatisticas>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    Ok(Json(state.db.call(|conn| dashboard::estatisticas(conn)).await?))
}

// ----------------------------------------------------------------------------
// Manutenção
// ----------------------------------------------------------------------------

pub async fn backup(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let destino = PathBuf::from(&state.settings.database.backup_dir);
    let manter = state.settings.database.backups_mantidos;
    let admin = sessao.username.clone();

    let caminho = state
        .db
        .call(move |conn| {
            let caminho = manutencao::backup(conn, &destino, manter)?;
            registrar_log(
                conn,
                &NovoLog::new(&admin, "backup do banco")
                    .nivel("admin")
                    .descricao(format!("Backup realizado: {}", caminho.display()))
                    .origem("admin"),
            )?;
            Ok(caminho)
        })
        .await?;

    Ok(Json(json!({
        "message": "Backup realizado com sucesso",
        "arquivo": caminho.display().to_string(),
    })))
}

pub async fn recarregar_opcoes(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, SO_ADMIN)?;
    let url = state
        .settings
        .planilha
        .onedrive_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("URL da planilha não configurada".into()))?;

    // Falha mantém as opções atuais
    let opcoes = planilha::carregar(&state.http, &url, state.settings.planilha.timeout_seconds).await?;
    let listas = opcoes.combobox.len();
    *state.opcoes.write().await = opcoes;

    log_info(&format!("🔄 Opções do formulário recarregadas por {}", sessao.username));
    Ok(Json(json!({ "message": "Opções recarregadas", "listas": listas })))
}
