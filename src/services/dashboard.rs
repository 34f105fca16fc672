//! Contagens e médias dos dashboards

use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::historico::pos_aprovacao::contar_alteracoes_pos_aprovacao;
use crate::models::{Nivel, StatusSolicitacao};
use crate::utils::datas::{dias_entre, parse_data};
use crate::utils::AppResult;

const NAO_EXCLUIDO: &str = "(excluido IS NULL OR excluido = 0)";

const SEM_NF: &str = "(anexar_nf IS NULL OR TRIM(anexar_nf) IN ('', '0'))";
const SEM_OS: &str = "(anexar_os IS NULL OR TRIM(anexar_os) IN ('', '0'))";
const SEM_CONTAINER: &str = "(container_1 IS NULL OR TRIM(container_1) = '')";
const SEM_SM: &str = "(numero_sm IS NULL OR TRIM(numero_sm) = '')";
const SEM_AE: &str = "(numero_ae IS NULL OR TRIM(numero_ae) = '')";

fn contar_onde(conn: &Connection, condicao: &str, parametros: &[&str]) -> AppResult<i64> {
    Ok(conn.query_row(
        &format!("SELECT COUNT(*) FROM registros WHERE {} AND {}", NAO_EXCLUIDO, condicao),
        params_from_iter(parametros.iter()),
        |r| r.get(0),
    )?)
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ContagensBasicas {
    pub registros_pendentes: i64,
    pub registros_andamento: i64,
    pub registros_concluidos: i64,
    pub sem_container: i64,
    pub sem_sm: i64,
    pub sem_ae: i64,
    pub sem_nf: i64,
    pub sem_os: i64,
    pub total: i64,
}

pub fn contagens_basicas(conn: &Connection) -> AppResult<ContagensBasicas> {
    Ok(ContagensBasicas {
        registros_pendentes: contar_onde(conn, "status_sm = 'Pendente'", &[])?,
        registros_andamento: contar_onde(conn, "status_sm = 'Em andamento'", &[])?,
        registros_concluidos: contar_onde(conn, "status_sm = 'Concluído'", &[])?,
        sem_container: contar_onde(conn, SEM_CONTAINER, &[])?,
        sem_sm: contar_onde(conn, SEM_SM, &[])?,
        sem_ae: contar_onde(conn, SEM_AE, &[])?,
        sem_nf: contar_onde(conn, SEM_NF, &[])?,
        sem_os: contar_onde(conn, SEM_OS, &[])?,
        total: contar_onde(conn, "1=1", &[])?,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemposMedios {
    pub tempo_medio_inicio: String,
    pub tempo_medio_conclusao: String,
}

fn media(valores: &[f64]) -> Option<f64> {
    if valores.is_empty() {
        None
    } else {
        Some(valores.iter().sum::<f64>() / valores.len() as f64)
    }
}

fn formatar_dias(valor: Option<f64>) -> String {
    match valor {
        Some(dias) => format!("{:.1} dias", dias),
        None => "N/A".to_string(),
    }
}

/// Médias em dias entre registro → início previsto → on time do cliente
pub fn tempos_medios(conn: &Connection) -> AppResult<TemposMedios> {
    let mut stmt = conn.prepare(&format!(
        "SELECT data_registro, horario_previsto, on_time_cliente FROM registros WHERE {}",
        NAO_EXCLUIDO
    ))?;
    let linhas = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, Option<String>>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut inicio = Vec::new();
    let mut conclusao = Vec::new();
    for (registro, previsto, on_time) in linhas {
        let registro = registro.as_deref().and_then(parse_data);
        let previsto = previsto.as_deref().and_then(parse_data);
        let on_time = on_time.as_deref().and_then(parse_data);
        if let (Some(r), Some(p)) = (registro, previsto) {
            inicio.push(dias_entre(&r, &p));
        }
        if let (Some(p), Some(o)) = (previsto, on_time) {
            conclusao.push(dias_entre(&p, &o));
        }
    }

    Ok(TemposMedios {
        tempo_medio_inicio: formatar_dias(media(&inicio)),
        tempo_medio_conclusao: formatar_dias(media(&conclusao)),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlaMedio {
    pub sla_sm: Option<f64>,
    pub sla_ae: Option<f64>,
}

/// Média das horas de SLA gravadas, ignorando valores não numéricos
pub fn sla_medio(conn: &Connection) -> AppResult<SlaMedio> {
    let mut stmt = conn.prepare(&format!("SELECT sla_sm, sla_ae FROM registros WHERE {}", NAO_EXCLUIDO))?;
    let linhas = stmt
        .query_map([], |r| {
            Ok((
                crate::models::registro::texto_da_celula(r.get_ref(0)?),
                crate::models::registro::texto_da_celula(r.get_ref(1)?),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let numero = |v: &Option<String>| {
        v.as_deref()
            .and_then(|s| s.trim().replace(',', ".").parse::<f64>().ok())
            .filter(|n| n.is_finite())
    };
    let sm: Vec<f64> = linhas.iter().filter_map(|(sm, _)| numero(sm)).collect();
    let ae: Vec<f64> = linhas.iter().filter_map(|(_, ae)| numero(ae)).collect();
    let arredondar = |v: f64| (v * 100.0).round() / 100.0;

    Ok(SlaMedio {
        sla_sm: media(&sm).map(arredondar),
        sla_ae: media(&ae).map(arredondar),
    })
}

/// Contadores dos cards, atualizados pelo front sem recarregar a página
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Contadores {
    pub operacoes_sem_nf: i64,
    pub operacoes_sem_os: i64,
    pub operacoes_sem_container: i64,
    pub operacoes_sem_sm: i64,
    pub operacoes_sem_ae: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alteracoes_pos_smae: Option<usize>,
}

pub fn contadores(conn: &Connection, nivel: Nivel, usuario: &str) -> AppResult<Contadores> {
    // Perfil comum só conta os próprios registros
    let (restricao, parametros): (&str, Vec<&str>) = match nivel {
        Nivel::Comum => ("usuario = ?", vec![usuario]),
        _ => ("1=1", Vec::new()),
    };
    let contar = |condicao: &str| contar_onde(conn, &format!("{} AND {}", condicao, restricao), &parametros);

    Ok(Contadores {
        operacoes_sem_nf: contar(SEM_NF)?,
        operacoes_sem_os: contar(SEM_OS)?,
        operacoes_sem_container: contar(SEM_CONTAINER)?,
        operacoes_sem_sm: contar(SEM_SM)?,
        operacoes_sem_ae: contar(SEM_AE)?,
        alteracoes_pos_smae: if nivel.is_gestao() {
            Some(contar_alteracoes_pos_aprovacao(conn)?)
        } else {
            None
        },
    })
}

/// Visão geral do sistema para o painel do admin
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Estatisticas {
    pub usuarios_por_nivel: BTreeMap<String, i64>,
    pub total_usuarios: i64,
    pub registros_ativos: i64,
    pub registros_excluidos: i64,
    pub entradas_historico: i64,
    pub entradas_log: i64,
    pub sessoes_ativas: i64,
    pub solicitacoes_registro_pendentes: i64,
    pub solicitacoes_senha_pendentes: i64,
}

fn contar_tabela(conn: &Connection, sql: &str) -> AppResult<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

pub fn estatisticas(conn: &Connection) -> AppResult<Estatisticas> {
    let mut stmt = conn.prepare("SELECT nivel, COUNT(*) FROM usuarios GROUP BY nivel")?;
    let mut usuarios_por_nivel = BTreeMap::new();
    for linha in stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))? {
        let (nivel, total) = linha?;
        *usuarios_por_nivel.entry(Nivel::from_db(&nivel).to_string()).or_insert(0) += total;
    }
    let pendente = StatusSolicitacao::Pendente.as_str();

    Ok(Estatisticas {
        total_usuarios: usuarios_por_nivel.values().sum(),
        usuarios_por_nivel,
        registros_ativos: contar_onde(conn, "1=1", &[])?,
        registros_excluidos: contar_tabela(conn, "SELECT COUNT(*) FROM registros WHERE excluido = 1")?,
        entradas_historico: contar_tabela(conn, "SELECT COUNT(*) FROM historico")?,
        entradas_log: contar_tabela(conn, "SELECT COUNT(*) FROM logs_unificados")?,
        sessoes_ativas: contar_tabela(conn, "SELECT COUNT(*) FROM sessoes_ativas")?,
        solicitacoes_registro_pendentes: conn.query_row(
            "SELECT COUNT(*) FROM solicitacoes_registro WHERE status = ?1",
            [pendente],
            |r| r.get(0),
        )?,
        solicitacoes_senha_pendentes: conn.query_row(
            "SELECT COUNT(*) FROM solicitacoes_senha WHERE status = ?1",
            [pendente],
            |r| r.get(0),
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;

    fn popular(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO registros (usuario, status_sm, container_1, numero_sm, anexar_nf, data_registro, horario_previsto, on_time_cliente, sla_sm, sla_ae)
                VALUES ('ana', 'Pendente', 'C1', '10', 'nf.pdf', '2024-01-01 00:00:00', '2024-01-03 00:00:00', '05/01/2024 00:00:00', 2, '1,5');
             INSERT INTO registros (usuario, status_sm, container_1, numero_sm, anexar_nf, data_registro, horario_previsto, sla_sm)
                VALUES ('bia', 'Concluído', NULL, NULL, '0', '2024-01-01 00:00:00', '02-01-2024 00:00:00', '4');
             INSERT INTO registros (usuario, status_sm, excluido) VALUES ('ana', 'Pendente', 1);",
        )
        .unwrap();
    }

    #[test]
    fn test_contagens_ignoram_excluidos() {
        let conn = conexao();
        popular(&conn);
        let c = contagens_basicas(&conn).unwrap();
        assert_eq!(c.total, 2);
        assert_eq!(c.registros_pendentes, 1);
        assert_eq!(c.registros_concluidos, 1);
        assert_eq!(c.sem_container, 1);
        assert_eq!(c.sem_sm, 1);
        assert_eq!(c.sem_ae, 2);
        assert_eq!(c.sem_nf, 1);
        assert_eq!(c.sem_os, 2);
    }

    #[test]
    fn test_tempos_medios_com_formatos_misturados() {
        let conn = conexao();
        assert_eq!(tempos_medios(&conn).unwrap().tempo_medio_inicio, "N/A");
        popular(&conn);
        let t = tempos_medios(&conn).unwrap();
        assert_eq!(t.tempo_medio_inicio, "1.5 dias");
        assert_eq!(t.tempo_medio_conclusao, "2.0 dias");
    }

    #[test]
    fn test_sla_medio() {
        let conn = conexao();
        popular(&conn);
        let sla = sla_medio(&conn).unwrap();
        assert_eq!(sla.sla_sm, Some(3.0));
        assert_eq!(sla.sla_ae, Some(1.5));
    }

    #[test]
    fn test_contadores_por_perfil() {
        let conn = conexao();
        popular(&conn);
        let comum = contadores(&conn, Nivel::Comum, "bia").unwrap();
        assert_eq!(comum.operacoes_sem_container, 1);
        assert_eq!(comum.operacoes_sem_nf, 1);
        assert_eq!(comum.alteracoes_pos_smae, None);

        let gr = contadores(&conn, Nivel::Gr, "gr1").unwrap();
        assert_eq!(gr.operacoes_sem_ae, 2);
        assert_eq!(gr.alteracoes_pos_smae, Some(0));
        let json = serde_json::to_value(&comum).unwrap();
        assert!(json.get("alteracoes_pos_smae").is_none());
    }

    #[test]
    fn test_estatisticas() {
        let conn = conexao();
        popular(&conn);
        conn.execute_batch(
            "INSERT INTO usuarios (username, password_hash, nivel) VALUES ('a', 'x', 'admin'), ('b', 'x', 'comum'), ('c', 'x', 'COMUM');
             INSERT INTO solicitacoes_senha (username, status, data_solicitacao) VALUES ('b', 'pendente', '2024-01-01 00:00:00');",
        )
        .unwrap();
        let e = estatisticas(&conn).unwrap();
        assert_eq!(e.total_usuarios, 3);
        assert_eq!(e.usuarios_por_nivel["comum"], 2);
        assert_eq!(e.registros_ativos, 2);
        assert_eq!(e.registros_excluidos, 1);
        assert_eq!(e.solicitacoes_senha_pendentes, 1);
        assert_eq!(e.solicitacoes_registro_pendentes, 0);
    }
}
