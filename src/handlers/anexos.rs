//! Upload, download e remoção de anexos (NF, OS e agendamento)

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::access_control::campo_oculto;
use crate::auth::SessaoUsuario;
use crate::services::anexos::{self, TipoAnexo};
use crate::utils::{AppError, AppResult};
use crate::AppState;

fn tipo_anexo(valor: &str) -> AppResult<TipoAnexo> {
    TipoAnexo::parse(valor)
        .ok_or_else(|| AppError::NotFound(format!("Tipo de anexo desconhecido: {}", valor)))
}

fn erro_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::ValidationError(format!("Upload inválido: {}", e))
}

pub async fn enviar(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path((id, tipo)): Path<(i64, String)>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let tipo = tipo_anexo(&tipo)?;

    // Campo "arquivo" ou o primeiro campo com nome de arquivo
    let mut arquivo: Option<(String, Vec<u8>)> = None;
    while let Some(campo) = multipart.next_field().await.map_err(erro_multipart)? {
        let Some(nome) = campo.file_name().map(str::to_string) else {
            continue;
        };
        let preferido = campo.name() == Some("arquivo");
        if arquivo.is_some() && !preferido {
            continue;
        }
        let conteudo = campo.bytes().await.map_err(erro_multipart)?;
        arquivo = Some((nome, conteudo.to_vec()));
        if preferido {
            break;
        }
    }
    let (nome_original, conteudo) =
        arquivo.ok_or_else(|| AppError::ValidationError("Nenhum arquivo enviado".into()))?;

    let dir = PathBuf::from(&state.settings.uploads.dir);
    let permitidas = state.settings.uploads.allowed_extensions.clone();
    let SessaoUsuario { username, nivel, .. } = sessao;

    let armazenado = state
        .db
        .call(move |conn| {
            anexos::salvar(
                conn,
                &dir,
                &permitidas,
                id,
                tipo,
                &nome_original,
                &conteudo,
                &username,
                nivel,
            )
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Arquivo enviado com sucesso",
            "arquivo": armazenado,
            "tipo": tipo.as_str(),
        })),
    ))
}

pub async fn baixar(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path((id, tipo)): Path<(i64, String)>,
) -> AppResult<Response> {
    let tipo = tipo_anexo(&tipo)?;
    if campo_oculto(tipo.campo_arquivo(), sessao.nivel) {
        return Err(AppError::Forbidden("Sem permissão para acessar este anexo".into()));
    }

    let dir = PathBuf::from(&state.settings.uploads.dir);
    let arquivo = state
        .db
        .call(move |conn| anexos::obter(conn, &dir, id, tipo))
        .await?;
    let conteudo = tokio::fs::read(&arquivo.caminho).await?;

    let disposicao = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&arquivo.nome_original)
    );
    Ok((
        [
            (header::CONTENT_TYPE, anexos::content_type(&arquivo.nome_original).to_string()),
            (header::CONTENT_DISPOSITION, disposicao),
        ],
        Body::from(conteudo),
    )
        .into_response())
}

pub async fn remover(
    State(state): State<Arc<AppState>>,
    Extension(sessao): Extension<SessaoUsuario>,
    Path((id, tipo)): Path<(i64, String)>,
) -> AppResult<Json<Value>> {
    let tipo = tipo_anexo(&tipo)?;
    let dir = PathBuf::from(&state.settings.uploads.dir);
    let SessaoUsuario { username, nivel, .. } = sessao;
    state
        .db
        .call(move |conn| anexos::remover(conn, &dir, id, tipo, &username, nivel))
        .await?;
    Ok(Json(json!({ "message": "Anexo removido", "tipo": tipo.as_str() })))
}
