//! Leitura e escrita da tabela `historico`

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

use super::conteudo::{ConteudoHistorico, EventoHistorico, MudancaCampo, TipoEvento};
use super::sanitizer::NivelReparo;
use crate::models::Campo;
use crate::utils::datas::{agora_texto, parse_data};
use crate::utils::AppResult;

/// Linha do histórico já interpretada
#[derive(Debug, Clone)]
pub struct EntradaHistorico {
    pub id: i64,
    pub registro_id: i64,
    pub alterado_por: Option<String>,
    pub data_alteracao: Option<String>,
    pub data: Option<NaiveDateTime>,
    pub conteudo: ConteudoHistorico,
    pub reparo: NivelReparo,
}

impl EntradaHistorico {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let bruto: Option<String> = row.get(4)?;
        let data_alteracao: Option<String> = row.get(3)?;
        let (conteudo, reparo) = ConteudoHistorico::from_bruto(bruto.as_deref().unwrap_or(""));
        Ok(Self {
            id: row.get(0)?,
            registro_id: row.get(1)?,
            alterado_por: row.get(2)?,
            data: data_alteracao.as_deref().and_then(parse_data),
            data_alteracao,
            conteudo,
            reparo,
        })
    }
}

/// Grava uma entrada com o horário atual
pub fn inserir(
    conn: &Connection,
    registro_id: i64,
    usuario: &str,
    conteudo: &ConteudoHistorico,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO historico (registro_id, alterado_por, alteracoes, data_alteracao) VALUES (?1, ?2, ?3, ?4)",
        params![registro_id, usuario, conteudo.to_json().to_string(), agora_texto()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn registrar_alteracoes(
    conn: &Connection,
    registro_id: i64,
    usuario: &str,
    mudancas: &BTreeMap<Campo, MudancaCampo>,
) -> AppResult<i64> {
    let campos = mudancas
        .iter()
        .map(|(c, m)| (c.db().to_string(), m.clone()))
        .collect();
    inserir(conn, registro_id, usuario, &ConteudoHistorico::Campos(campos))
}

pub fn registrar_evento(
    conn: &Connection,
    registro_id: i64,
    usuario: &str,
    tipo: TipoEvento,
    campos: &[Campo],
    valores: BTreeMap<String, String>,
) -> AppResult<i64> {
    let evento = EventoHistorico {
        tipo,
        campos: campos.iter().map(|c| c.db().to_string()).collect(),
        usuario: Some(usuario.to_string()),
        valores,
    };
    inserir(conn, registro_id, usuario, &ConteudoHistorico::Evento(evento))
}

pub fn registrar_acao(
    conn: &Connection,
    registro_id: i64,
    usuario: &str,
    acao: &str,
    detalhes: Option<String>,
) -> AppResult<i64> {
    let conteudo = ConteudoHistorico::Acao {
        acao: acao.to_string(),
        tabela: Some("registros".to_string()),
        detalhes,
    };
    inserir(conn, registro_id, usuario, &conteudo)
}

const SELECT_HISTORICO: &str =
    "SELECT id, registro_id, alterado_por, data_alteracao, alteracoes FROM historico";

/// Histórico de um registro, em ordem de gravação
pub fn carregar(conn: &Connection, registro_id: i64) -> AppResult<Vec<EntradaHistorico>> {
    let mut stmt = conn.prepare(&format!("{} WHERE registro_id = ?1 ORDER BY id", SELECT_HISTORICO))?;
    let entradas = stmt
        .query_map([registro_id], EntradaHistorico::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entradas)
}

/// Histórico de vários registros de uma vez, agrupado por registro
pub fn carregar_varios(
    conn: &Connection,
    registro_ids: &[i64],
) -> AppResult<BTreeMap<i64, Vec<EntradaHistorico>>> {
    let mut agrupado: BTreeMap<i64, Vec<EntradaHistorico>> = BTreeMap::new();
    // Limite de variáveis do SQLite
    for lote in registro_ids.chunks(500) {
        let marcadores = vec!["?"; lote.len()].join(", ");
        let sql = format!("{} WHERE registro_id IN ({}) ORDER BY id", SELECT_HISTORICO, marcadores);
        let mut stmt = conn.prepare(&sql)?;
        let linhas = stmt.query_map(rusqlite::params_from_iter(lote.iter()), EntradaHistorico::from_row)?;
        for entrada in linhas {
            let entrada = entrada?;
            agrupado.entry(entrada.registro_id).or_default().push(entrada);
        }
    }
    Ok(agrupado)
}

/// Linha resumida para a listagem geral do histórico (admin)
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResumoHistorico {
    pub id: i64,
    pub registro_id: i64,
    pub alterado_por: Option<String>,
    pub data_alteracao: Option<String>,
    pub campos: Vec<String>,
    pub num_alteracoes: usize,
    pub reparo: NivelReparo,
}

pub fn listar(conn: &Connection, limit: i64, offset: i64) -> AppResult<Vec<ResumoHistorico>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id DESC LIMIT ?1 OFFSET ?2", SELECT_HISTORICO))?;
    let resumos = stmt
        .query_map(params![limit, offset], EntradaHistorico::from_row)?
        .map(|r| {
            r.map(|e| {
                let campos = e.conteudo.campos_tocados();
                ResumoHistorico {
                    id: e.id,
                    registro_id: e.registro_id,
                    alterado_por: e.alterado_por,
                    data_alteracao: e.data_alteracao,
                    num_alteracoes: campos.len(),
                    campos,
                    reparo: e.reparo,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(resumos)
}

pub fn contar(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM historico", [], |r| r.get(0))?)
}
