//! Anexos dos registros (NF, OS e agendamento)
//!
//! O arquivo fica no diretório de uploads com nome saneado; o registro
//! guarda o nome em disco (`anexar_*`) e o nome original (`arquivo_*_nome`).

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::access_control::campo_editavel;
use crate::historico::{gravacao, MudancaCampo};
use crate::models::{Campo, Nivel, NovoLog};
use crate::services::auditoria::registrar_log;
use crate::services::registros;
use crate::utils::arquivos::{extensao, extensao_permitida, nome_armazenado, secure_filename};
use crate::utils::datas::agora;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoAnexo {
    Nf,
    Os,
    Agendamento,
}

impl TipoAnexo {
    pub fn parse(valor: &str) -> Option<Self> {
        match valor.trim().to_lowercase().as_str() {
            "nf" => Some(TipoAnexo::Nf),
            "os" => Some(TipoAnexo::Os),
            "agendamento" => Some(TipoAnexo::Agendamento),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TipoAnexo::Nf => "nf",
            TipoAnexo::Os => "os",
            TipoAnexo::Agendamento => "agendamento",
        }
    }

    /// Coluna com o nome do arquivo em disco
    pub fn campo_arquivo(&self) -> Campo {
        match self {
            TipoAnexo::Nf => Campo::AnexarNf,
            TipoAnexo::Os => Campo::AnexarOs,
            TipoAnexo::Agendamento => Campo::AnexarAgendamento,
        }
    }

    /// Coluna com o nome original enviado pelo usuário
    pub fn campo_nome(&self) -> Campo {
        match self {
            TipoAnexo::Nf => Campo::ArquivoNfNome,
            TipoAnexo::Os => Campo::ArquivoOsNome,
            TipoAnexo::Agendamento => Campo::ArquivoAgendamentoNome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArquivoAnexo {
    pub caminho: PathBuf,
    pub nome_original: String,
}

/// Content-Type pelo nome do arquivo
pub fn content_type(nome: &str) -> &'static str {
    match extensao(nome).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn exigir_permissao(tipo: TipoAnexo, nivel: Nivel) -> AppResult<()> {
    if campo_editavel(tipo.campo_arquivo(), nivel) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Perfil {} não gerencia anexos", nivel)))
    }
}

/// Caminho em disco de um nome gravado no registro. O nome é saneado de
/// novo para que valores antigos do banco nunca saiam do diretório.
fn caminho_em(dir: &Path, armazenado: &str) -> AppResult<PathBuf> {
    let seguro = secure_filename(armazenado);
    if seguro.is_empty() {
        return Err(AppError::NotFound("Anexo sem arquivo".into()));
    }
    Ok(dir.join(seguro))
}

fn remover_arquivo(caminho: &Path) {
    match fs::remove_file(caminho) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("⚠️ Não foi possível remover {}: {}", caminho.display(), e),
    }
}

fn gravar_colunas(
    conn: &Connection,
    registro_id: i64,
    tipo: TipoAnexo,
    armazenado: Option<&str>,
    original: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        &format!(
            "UPDATE registros SET {} = ?1, {} = ?2 WHERE id = ?3",
            tipo.campo_arquivo().db(),
            tipo.campo_nome().db()
        ),
        params![armazenado, original, registro_id],
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn salvar(
    conn: &mut Connection,
    dir: &Path,
    permitidas: &[String],
    registro_id: i64,
    tipo: TipoAnexo,
    nome_original: &str,
    conteudo: &[u8],
    usuario: &str,
    nivel: Nivel,
) -> AppResult<String> {
    exigir_permissao(tipo, nivel)?;
    if !extensao_permitida(nome_original, permitidas) {
        return Err(AppError::ValidationError(format!(
            "Tipo de arquivo não permitido. Use: {}",
            permitidas.join(", ")
        )));
    }
    if conteudo.is_empty() {
        return Err(AppError::ValidationError("Arquivo vazio".into()));
    }

    let tx = conn.transaction()?;
    let registro = registros::obter(&tx, registro_id)?;
    registros::exigir_edicao_permitida(&tx, &registro, nivel)?;
    let anterior = registro.valor(tipo.campo_arquivo()).to_string();

    let carimbo = agora().format("%Y%m%d%H%M%S").to_string();
    let armazenado = nome_armazenado(registro_id, tipo.as_str(), nome_original, &carimbo);
    fs::create_dir_all(dir)?;
    let caminho = dir.join(&armazenado);
    fs::write(&caminho, conteudo)?;

    let resultado = (|| -> AppResult<()> {
        gravar_colunas(&tx, registro_id, tipo, Some(&armazenado), Some(nome_original))?;
        let mut mudancas = BTreeMap::new();
        mudancas.insert(
            tipo.campo_arquivo(),
            MudancaCampo { valor_antigo: Some(anterior.clone()), valor_novo: Some(armazenado.clone()) },
        );
        gravacao::registrar_alteracoes(&tx, registro_id, usuario, &mudancas)?;
        registros::marcar_modificacao_comum(&tx, &registro, usuario, nivel)?;
        registrar_log(
            &tx,
            &NovoLog::new(usuario, "upload de anexo")
                .nivel(nivel.as_str())
                .registro(registro_id)
                .descricao(format!("Anexo {} enviado: {}", tipo.as_str(), nome_original))
                .origem("anexos"),
        )?;
        Ok(())
    })();

    match resultado.and_then(|_| tx.commit().map_err(AppError::from)) {
        Ok(()) => {
            if !anterior.is_empty() && anterior != armazenado {
                if let Ok(antigo) = caminho_em(dir, &anterior) {
                    remover_arquivo(&antigo);
                }
            }
            tracing::info!("📎 Anexo {} salvo no registro {}", tipo.as_str(), registro_id);
            Ok(armazenado)
        }
        Err(e) => {
            remover_arquivo(&caminho);
            Err(e)
        }
    }
}

pub fn obter(conn: &Connection, dir: &Path, registro_id: i64, tipo: TipoAnexo) -> AppResult<ArquivoAnexo> {
    let registro = registros::obter(conn, registro_id)?;
    let armazenado = registro.valor(tipo.campo_arquivo());
    if armazenado.trim().is_empty() {
        return Err(AppError::NotFound(format!("Registro {} sem anexo {}", registro_id, tipo.as_str())));
    }
    let caminho = caminho_em(dir, armazenado)?;
    if !caminho.is_file() {
        return Err(AppError::NotFound(format!("Arquivo {} não encontrado", armazenado)));
    }
    let nome_original = match registro.valor(tipo.campo_nome()) {
        "" => armazenado.to_string(),
        nome => nome.to_string(),
    };
    Ok(ArquivoAnexo { caminho, nome_original })
}

pub fn remover(
    conn: &mut Connection,
    dir: &Path,
    registro_id: i64,
    tipo: TipoAnexo,
    usuario: &str,
    nivel: Nivel,
) -> AppResult<()> {
    exigir_permissao(tipo, nivel)?;
    let tx = conn.transaction()?;
    let registro = registros::obter(&tx, registro_id)?;
    registros::exigir_edicao_permitida(&tx, &registro, nivel)?;
    let armazenado = registro.valor(tipo.campo_arquivo()).to_string();
    if armazenado.trim().is_empty() {
        return Err(AppError::NotFound(format!("Registro {} sem anexo {}", registro_id, tipo.as_str())));
    }

    gravar_colunas(&tx, registro_id, tipo, None, None)?;
    let mut mudancas = BTreeMap::new();
    mudancas.insert(
        tipo.campo_arquivo(),
        MudancaCampo { valor_antigo: Some(armazenado.clone()), valor_novo: Some(String::new()) },
    );
    gravacao::registrar_alteracoes(&tx, registro_id, usuario, &mudancas)?;
    registros::marcar_modificacao_comum(&tx, &registro, usuario, nivel)?;
    registrar_log(
        &tx,
        &NovoLog::new(usuario, "exclusão de anexo")
            .nivel(nivel.as_str())
            .registro(registro_id)
            .descricao(format!("Anexo {} removido", tipo.as_str()))
            .origem("anexos"),
    )?;
    tx.commit()?;

    if let Ok(caminho) = caminho_em(dir, &armazenado) {
        remover_arquivo(&caminho);
    }
    Ok(())
}
