//! Ambiente da GR: dashboard, alterações pós SM/AE e histórico

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::access_control::filtrar_visiveis;
use crate::auth::{exigir_nivel, SessaoUsuario};
use crate::historico::pos_aprovacao;
use crate::historico::visualizacao::{obter_historico_alteracoes, HistoricoRegistro};
use crate::models::Nivel;
use crate::services::dashboard;
use crate::utils::AppResult;
use crate::AppState;

const GESTAO: &[Nivel] = &[Nivel::Gr, Nivel::Admin];

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, GESTAO)?;

    let (contagens, tempos, sla, alteracoes) = state
        .db
        .call(|conn| {
            Ok((
                dashboard::contagens_basicas(conn)?,
                dashboard::tempos_medios(conn)?,
                dashboard::sla_medio(conn)?,
                pos_aprovacao::contar_alteracoes_pos_aprovacao(conn)?,
            ))
        })
        .await?;

    Ok(Json(json!({
        "contagens": contagens,
        "tempos_medios": tempos,
        "sla_medio": sla,
        "alteracoes_pos_smae": alteracoes,
    })))
}

/// Registros aprovados que foram editados depois do SM/AE e aguardam revisão
pub async fn alteracoes(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, GESTAO)?;

    let registros = state
        .db
        .call(|conn| pos_aprovacao::registros_com_alteracoes(conn))
        .await?;
    let visiveis: Vec<_> = registros.iter().map(|r| filtrar_visiveis(r, sessao.nivel)).collect();

    Ok(Json(json!({
        "total": visiveis.len(),
        "registros": visiveis,
    })))
}

pub async fn historico(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
) -> AppResult<Json<HistoricoRegistro>> {
    exigir_nivel(&sessao, GESTAO)?;
    let historico = state
        .db
        .call(move |conn| obter_historico_alteracoes(conn, id))
        .await?;
    Ok(Json(historico))
}

pub async fn verificar(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    exigir_nivel(&sessao, GESTAO)?;
    let username = sessao.username.clone();
    state
        .db
        .call(move |conn| pos_aprovacao::marcar_alteracoes_verificadas(conn, id, &username))
        .await?;

    tracing::info!("☑️ Alterações do registro {} verificadas por {}", id, sessao.username);
    Ok(Json(json!({
        "message": "Alterações marcadas como verificadas",
        "id": id,
    })))
}
