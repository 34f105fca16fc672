//! CRUD de registros, busca, contadores e opções do formulário

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{deslocamento, paginacao, total_paginas};
use crate::access_control::{filtrar_visiveis, formulario_para_nivel, secoes_visiveis};
use crate::auth::SessaoUsuario;
use crate::services::{dashboard, registros};
use crate::services::registros::FiltrosRegistro;
use crate::utils::AppResult;
use crate::AppState;

pub async fn opcoes(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<Value>> {
    let opcoes = state.opcoes.read().await.clone();
    let secoes: Vec<Value> = secoes_visiveis(sessao.nivel)
        .iter()
        .map(|s| json!({ "id": s.id(), "titulo": s.titulo(), "icone": s.icone() }))
        .collect();
    Ok(Json(json!({
        "opcoes": opcoes,
        "secoes": secoes,
        "formulario": formulario_para_nivel(sessao.nivel),
    })))
}

pub async fn listar(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let (pagina, por_pagina) = paginacao(&query, 20);
    let filtros = FiltrosRegistro::from_query(&query);

    let (lista, total) = state
        .db
        .call(move |conn| {
            let lista = registros::listar(conn, &filtros, pagina, por_pagina)?;
            let total = registros::contar(conn, &filtros)?;
            Ok((lista, total))
        })
        .await?;

    let visiveis: Vec<_> = lista.iter().map(|r| filtrar_visiveis(r, sessao.nivel)).collect();
    Ok(Json(json!({
        "registros": visiveis,
        "total": total,
        "pagina": pagina,
        "por_pagina": por_pagina,
        "total_paginas": total_paginas(total, por_pagina),
    })))
}

pub async fn criar(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Json(body): Json<Map<String, Value>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let form = registros::formulario_de_json(&body);
    let SessaoUsuario { username, nivel, .. } = sessao;
    let id = state
        .db
        .call(move |conn| registros::criar(conn, &username, nivel, &form))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "message": "Registro criado com sucesso" })),
    ))
}

pub async fn obter(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let registro = state.db.call(move |conn| registros::obter(conn, id)).await?;
    Ok(Json(json!({ "registro": filtrar_visiveis(&registro, sessao.nivel) })))
}

pub async fn atualizar(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
    Json(body): Json<Map<String, Value>>,
) -> AppResult<Json<Value>> {
    let form = registros::formulario_de_json(&body);
    let SessaoUsuario { username, nivel, .. } = sessao;

    let (campos, registro) = state
        .db
        .call(move |conn| {
            let campos = registros::atualizar(conn, id, &form, &username, nivel)?;
            Ok((campos, registros::obter(conn, id)?))
        })
        .await?;

    if campos.is_empty() {
        return Ok(Json(json!({
            "message": "Nenhuma alteração detectada",
            "campos_alterados": [],
            "registro": filtrar_visiveis(&registro, nivel),
        })));
    }

    let nomes: Vec<&str> = campos.iter().map(|c| c.db()).collect();
    Ok(Json(json!({
        "message": "Registro atualizado com sucesso",
        "campos_alterados": nomes,
        "registro": filtrar_visiveis(&registro, nivel),
    })))
}

pub async fn excluir(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let SessaoUsuario { username, nivel, .. } = sessao;
    state
        .db
        .call(move |conn| registros::excluir(conn, id, &username, nivel))
        .await?;
    Ok(Json(json!({ "message": "Registro excluído com sucesso", "id": id })))
}

pub async fn busca(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let termo = query
        .get("q")
        .or_else(|| query.get("termo"))
        .cloned()
        .unwrap_or_default();
    let (pagina, por_pagina) = paginacao(&query, 20);
    let offset = deslocamento(pagina, por_pagina);

    let busca = termo.clone();
    let (lista, total) = state
        .db
        .call(move |conn| {
            let lista = registros::busca_global(conn, &busca, por_pagina, offset)?;
            let total = registros::contar_busca_global(conn, &busca)?;
            Ok((lista, total))
        })
        .await?;

    let visiveis: Vec<_> = lista.iter().map(|r| filtrar_visiveis(r, sessao.nivel)).collect();
    Ok(Json(json!({
        "termo": termo,
        "registros": visiveis,
        "total": total,
        "pagina": pagina,
        "por_pagina": por_pagina,
        "total_paginas": total_paginas(total, por_pagina),
    })))
}

pub async fn contadores(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
) -> AppResult<Json<dashboard::Contadores>> {
    let SessaoUsuario { username, nivel, .. } = sessao;
    let contadores = state
        .db
        .call(move |conn| dashboard::contadores(conn, nivel, &username))
        .await?;
    Ok(Json(contadores))
}
