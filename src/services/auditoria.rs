//! Log de auditoria unificado (`logs_unificados`)

use chrono::{Duration, NaiveDateTime};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::models::{FiltrosLog, LogEntry, NovoLog};
use crate::utils::datas::{agora_texto, formatar_padrao, parse_data};
use crate::utils::{AppError, AppResult};

pub fn registrar_log(conn: &Connection, log: &NovoLog) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO logs_unificados (data_hora, usuario, nivel, acao, descricao, detalhes, registro_id, \
         ip, origem, objeto_tipo, valor_anterior, valor_novo) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            agora_texto(),
            log.usuario,
            log.nivel,
            log.acao,
            log.descricao,
            log.detalhes,
            log.registro_id,
            log.ip,
            log.origem,
            log.objeto_tipo,
            log.valor_anterior,
            log.valor_novo,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginaLogs {
    pub logs: Vec<LogEntry>,
    pub total: i64,
    pub pagina: i64,
    pub por_pagina: i64,
    pub total_paginas: i64,
}

fn limite_data(texto: &str, campo: &str) -> AppResult<NaiveDateTime> {
    parse_data(texto).ok_or_else(|| AppError::ValidationError(format!("Data inválida em {}: {}", campo, texto)))
}

/// WHERE montado a partir dos filtros. As datas da tabela são sempre
/// gravadas no formato padrão, então a comparação textual é cronológica.
fn clausula_filtros(filtros: &FiltrosLog) -> AppResult<(String, Vec<SqlValue>)> {
    let mut condicoes = vec!["1=1".to_string()];
    let mut valores = Vec::new();

    if let Some(usuario) = filtros.usuario.as_deref().filter(|s| !s.trim().is_empty()) {
        condicoes.push("usuario LIKE ?".into());
        valores.push(SqlValue::Text(format!("%{}%", usuario.trim())));
    }
    if let Some(nivel) = filtros.nivel.as_deref().filter(|s| !s.trim().is_empty()) {
        condicoes.push("nivel = ?".into());
        valores.push(SqlValue::Text(nivel.trim().to_string()));
    }
    if let Some(acao) = filtros.acao.as_deref().filter(|s| !s.trim().is_empty()) {
        condicoes.push("acao LIKE ?".into());
        valores.push(SqlValue::Text(format!("%{}%", acao.trim())));
    }
    if let Some(inicio) = filtros.data_inicio.as_deref().filter(|s| !s.trim().is_empty()) {
        let inicio = limite_data(inicio, "data_inicio")?.date().and_hms_opt(0, 0, 0);
        if let Some(inicio) = inicio {
            condicoes.push("data_hora >= ?".into());
            valores.push(SqlValue::Text(formatar_padrao(&inicio)));
        }
    }
    if let Some(fim) = filtros.data_fim.as_deref().filter(|s| !s.trim().is_empty()) {
        // Dia final inclusivo
        let fim = limite_data(fim, "data_fim")?.date().and_hms_opt(0, 0, 0);
        if let Some(fim) = fim {
            condicoes.push("data_hora < ?".into());
            valores.push(SqlValue::Text(formatar_padrao(&(fim + Duration::days(1)))));
        }
    }
    if let Some(registro_id) = filtros.registro_id {
        condicoes.push("registro_id = ?".into());
        valores.push(SqlValue::Integer(registro_id));
    }

    Ok((condicoes.join(" AND "), valores))
}

pub fn obter_logs(
    conn: &Connection,
    filtros: &FiltrosLog,
    pagina: i64,
    por_pagina: i64,
) -> AppResult<PaginaLogs> {
    let pagina = pagina.max(1);
    let por_pagina = por_pagina.clamp(1, 500);
    let (onde, valores) = clausula_filtros(filtros)?;

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM logs_unificados WHERE {}", onde),
        params_from_iter(valores.iter()),
        |r| r.get(0),
    )?;

    let mut valores_pagina = valores;
    valores_pagina.push(SqlValue::Integer(por_pagina));
    valores_pagina.push(SqlValue::Integer((pagina - 1).saturating_mul(por_pagina)));

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM logs_unificados WHERE {} ORDER BY data_hora DESC, id DESC LIMIT ? OFFSET ?",
        LogEntry::COLUNAS,
        onde
    ))?;
    let logs = stmt
        .query_map(params_from_iter(valores_pagina.iter()), LogEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let total_paginas = ((total + por_pagina - 1) / por_pagina).max(1);

    Ok(PaginaLogs { logs, total, pagina, por_pagina, total_paginas })
}

/// Remove entradas anteriores a `antes_de` (todas quando `None`) e registra a limpeza.
pub fn limpar_logs(conn: &Connection, antes_de: Option<NaiveDateTime>, usuario: &str) -> AppResult<usize> {
    let removidos = match antes_de {
        Some(data) => conn.execute(
            "DELETE FROM logs_unificados WHERE data_hora < ?1",
            params![formatar_padrao(&data)],
        )?,
        None => conn.execute("DELETE FROM logs_unificados", [])?,
    };

    let descricao = match antes_de {
        Some(data) => format!("{} entradas anteriores a {} removidas", removidos, formatar_padrao(&data)),
        None => format!("{} entradas removidas", removidos),
    };
    registrar_log(
        conn,
        &NovoLog::new(usuario, "limpeza_logs").nivel("admin").descricao(descricao).origem("admin"),
    )?;

    tracing::info!("🧹 Logs limpos por {}: {} removidos", usuario, removidos);
    Ok(removidos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;

    fn log_em(conn: &Connection, data: &str, usuario: &str, acao: &str) {
        conn.execute(
            "INSERT INTO logs_unificados (data_hora, usuario, nivel, acao) VALUES (?1, ?2, 'comum', ?3)",
            params![data, usuario, acao],
        )
        .unwrap();
    }

    #[test]
    fn test_registrar_e_filtrar() {
        let conn = conexao();
        registrar_log(&conn, &NovoLog::new("ana", "login").nivel("comum").registro(3)).unwrap();
        log_em(&conn, "2024-01-10 10:00:00", "bruno", "edição");
        log_em(&conn, "2024-01-11 23:59:59", "bruno", "exclusão");
        log_em(&conn, "2024-01-12 00:00:00", "bruno", "edição");

        let todos = obter_logs(&conn, &FiltrosLog::default(), 1, 50).unwrap();
        assert_eq!(todos.total, 4);

        let filtros = FiltrosLog {
            usuario: Some("brun".into()),
            data_inicio: Some("2024-01-10".into()),
            data_fim: Some("11/01/2024".into()),
            ..Default::default()
        };
        let pagina = obter_logs(&conn, &filtros, 1, 50).unwrap();
        assert_eq!(pagina.total, 2);
        assert_eq!(pagina.logs[0].acao, "exclusão");

        let por_registro = FiltrosLog { registro_id: Some(3), ..Default::default() };
        let pagina = obter_logs(&conn, &por_registro, 1, 50).unwrap();
        assert_eq!(pagina.logs[0].objeto_tipo.as_deref(), Some("registro"));
    }

    #[test]
    fn test_paginacao_sempre_tem_uma_pagina() {
        let conn = conexao();
        let vazio = obter_logs(&conn, &FiltrosLog::default(), 0, 10).unwrap();
        assert_eq!(vazio.total_paginas, 1);
        assert_eq!(vazio.pagina, 1);

        for i in 0..25 {
            log_em(&conn, &format!("2024-02-01 10:00:{:02}", i), "ana", "x");
        }
        let pagina = obter_logs(&conn, &FiltrosLog::default(), 3, 10).unwrap();
        assert_eq!(pagina.total_paginas, 3);
        assert_eq!(pagina.logs.len(), 5);
    }

    #[test]
    fn test_pagina_enorme_sem_estouro() {
        let conn = conexao();
        log_em(&conn, "2024-02-01 10:00:00", "ana", "x");
        let pagina = obter_logs(&conn, &FiltrosLog::default(), i64::MAX, 500).unwrap();
        assert!(pagina.logs.is_empty());
        assert_eq!(pagina.total, 1);
    }

    #[test]
    fn test_data_invalida_no_filtro() {
        let conn = conexao();
        let filtros = FiltrosLog { data_inicio: Some("ontem".into()), ..Default::default() };
        assert!(matches!(
            obter_logs(&conn, &filtros, 1, 10).unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[test]
    fn test_limpar_logs_registra_limpeza() {
        let conn = conexao();
        log_em(&conn, "2023-01-01 10:00:00", "ana", "antigo");
        log_em(&conn, "2099-01-01 10:00:00", "ana", "futuro");
        let corte = parse_data("2024-01-01").unwrap();
        assert_eq!(limpar_logs(&conn, Some(corte), "admin").unwrap(), 1);

        let restantes = obter_logs(&conn, &FiltrosLog::default(), 1, 10).unwrap();
        assert_eq!(restantes.total, 2);
        assert!(restantes.logs.iter().any(|l| l.acao == "limpeza_logs"));
    }
}
