//! Histórico de alterações de um registro, pronto para exibição

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};

use super::conteudo::{ConteudoHistorico, TipoEvento};
use super::gravacao::{self, EntradaHistorico};
use crate::models::registro::colunas_select;
use crate::models::{Campo, Registro, TipoCampo};
use crate::utils::datas::{formatar_exibicao, parse_data, FORMATO_EXIBICAO};
use crate::utils::{AppError, AppResult};

const VAZIO: &str = "Vazio";
const NAO_INFORMADO: &str = "Não informado";
const SEM_VALOR_ANTERIOR: &str = "Valor anterior não disponível";

#[derive(Debug, Clone, Serialize)]
pub struct LinhaAlteracao {
    pub campo: String,
    pub valor_antigo: String,
    pub valor_novo: String,
    pub data_alteracao: String,
    pub usuario: String,
    #[serde(skip)]
    ordem: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricoRegistro {
    pub registro_info: Map<String, Value>,
    pub alteracoes: Vec<LinhaAlteracao>,
}

fn ou_vazio(valor: Option<&str>) -> String {
    match valor {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => VAZIO.to_string(),
    }
}

fn linha(entrada: &EntradaHistorico, campo: &str, antigo: String, novo: String) -> LinhaAlteracao {
    LinhaAlteracao {
        campo: campo.to_string(),
        valor_antigo: antigo,
        valor_novo: novo,
        data_alteracao: entrada
            .data_alteracao
            .as_deref()
            .map(|d| formatar_exibicao(d).unwrap_or_else(|| d.to_string()))
            .unwrap_or_default(),
        usuario: entrada.alterado_por.clone().unwrap_or_else(|| "Sistema".to_string()),
        ordem: entrada.data,
    }
}

/// Valor do campo antes da entrada `idx`, procurando nas entradas anteriores
fn valor_anterior(historico: &[EntradaHistorico], idx: usize, campo: &str) -> Option<String> {
    let atual = &historico[idx];
    let anteriores: Vec<&EntradaHistorico> = historico[..idx]
        .iter()
        .filter(|e| match (e.data, atual.data) {
            (Some(a), Some(b)) => a < b,
            _ => true,
        })
        .rev()
        .collect();

    let mais_recente = anteriores
        .iter()
        .find_map(|e| e.conteudo.mudanca_de(campo))
        .and_then(|m| m.valor_antigo.or(m.valor_novo));
    if mais_recente.is_some() {
        return mais_recente;
    }

    anteriores
        .iter()
        .filter_map(|e| e.conteudo.mudanca_de(campo))
        .find_map(|m| m.valor_novo)
}

/// Valor atual do campo para os eventos da GR sem valores gravados
fn valor_atual(registro: &Registro, campo: &str) -> String {
    let Some(c) = Campo::from_db(campo) else {
        return "Não disponível".to_string();
    };
    if registro.tem(c) {
        return registro.valor(c).to_string();
    }
    match c {
        Campo::NumeroSm | Campo::NumeroAe => "N/A".to_string(),
        Campo::ObservacaoGr => VAZIO.to_string(),
        _ => NAO_INFORMADO.to_string(),
    }
}

/// Monta as linhas de exibição a partir das entradas do histórico
pub fn montar_linhas(registro: &Registro, historico: &[EntradaHistorico]) -> Vec<LinhaAlteracao> {
    let mut linhas = Vec::new();

    for (idx, entrada) in historico.iter().enumerate() {
        match &entrada.conteudo {
            ConteudoHistorico::Campos(mapa) => {
                for (campo, m) in mapa {
                    linhas.push(linha(
                        entrada,
                        campo,
                        ou_vazio(m.valor_antigo.as_deref()),
                        ou_vazio(m.valor_novo.as_deref()),
                    ));
                }
            }
            ConteudoHistorico::Evento(evento) if !evento.valores.is_empty() => {
                for (campo, valor) in &evento.valores {
                    let antigo = valor_anterior(historico, idx, campo)
                        .unwrap_or_else(|| SEM_VALOR_ANTERIOR.to_string());
                    linhas.push(linha(entrada, campo, antigo, ou_vazio(Some(valor))));
                }
            }
            _ => {}
        }
    }

    if linhas.is_empty() {
        for (idx, entrada) in historico.iter().enumerate() {
            let ConteudoHistorico::Evento(evento) = &entrada.conteudo else {
                continue;
            };
            if !matches!(evento.tipo, TipoEvento::EdicaoGr | TipoEvento::VerificacaoAlteracoes) {
                continue;
            }
            for campo in &evento.campos {
                let antigo = valor_anterior(historico, idx, campo)
                    .unwrap_or_else(|| SEM_VALOR_ANTERIOR.to_string());
                linhas.push(linha(entrada, campo, antigo, valor_atual(registro, campo)));
            }
        }
    }

    if linhas.is_empty() {
        for entrada in historico {
            linhas.push(linha(
                entrada,
                "Registro",
                "Não disponível".to_string(),
                "Alteração registrada".to_string(),
            ));
        }
    }

    // Mais recentes primeiro; sem data vão para o fim
    linhas.sort_by(|a, b| b.ordem.cmp(&a.ordem));
    linhas
}

fn data_exibicao(valor: Option<&str>) -> Value {
    match valor {
        Some(v) if !v.trim().is_empty() => {
            Value::String(formatar_exibicao(v).unwrap_or_else(|| v.to_string()))
        }
        _ => Value::String(NAO_INFORMADO.to_string()),
    }
}

fn texto_ou_nao_informado(valor: Option<&str>) -> Value {
    match valor {
        Some(v) if !v.trim().is_empty() => Value::String(v.to_string()),
        _ => Value::String(NAO_INFORMADO.to_string()),
    }
}

/// Dados do registro para o cabeçalho do histórico
pub fn registro_info(registro: &Registro, historico: &[EntradaHistorico]) -> Map<String, Value> {
    let mut info = Map::new();
    info.insert("id".into(), Value::from(registro.id));
    info.insert("usuario".into(), texto_ou_nao_informado(registro.usuario.as_deref()));
    info.insert("data_registro".into(), data_exibicao(registro.data_registro.as_deref()));

    let ultima_alteracao = historico.iter().filter_map(|e| e.data).max();
    let data_modificacao = match ultima_alteracao {
        Some(data) => Value::String(data.format(FORMATO_EXIBICAO).to_string()),
        None => data_exibicao(registro.data_modificacao.as_deref()),
    };
    info.insert("data_modificacao".into(), data_modificacao);
    info.insert("modificado_por".into(), texto_ou_nao_informado(registro.modificado_por.as_deref()));
    info.insert("alteracoes_verificadas".into(), Value::Bool(registro.alteracoes_verificadas));

    for campo in Campo::TODOS {
        let valor = registro.dados.get(&campo).map(|s| s.as_str());
        let json = match campo.tipo() {
            TipoCampo::DataHora if valor.and_then(parse_data).is_some() => data_exibicao(valor),
            _ => texto_ou_nao_informado(valor),
        };
        info.insert(campo.db().to_string(), json);
    }
    info
}

pub fn obter_historico_alteracoes(conn: &Connection, registro_id: i64) -> AppResult<HistoricoRegistro> {
    let sql = format!("SELECT {} FROM registros WHERE id = ?1", colunas_select(None));
    let registro = conn
        .query_row(&sql, [registro_id], Registro::from_row)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Registro {} não encontrado", registro_id)))?;

    let historico = gravacao::carregar(conn, registro_id)?;

    Ok(HistoricoRegistro {
        registro_info: registro_info(&registro, &historico),
        alteracoes: montar_linhas(&registro, &historico),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;
    use rusqlite::params;

    fn historico(conn: &Connection, registro_id: i64, usuario: &str, json: &str, data: &str) {
        conn.execute(
            "INSERT INTO historico (registro_id, alterado_por, alteracoes, data_alteracao) VALUES (?1, ?2, ?3, ?4)",
            params![registro_id, usuario, json, data],
        )
        .unwrap();
    }

    fn registro(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO registros (usuario, data_registro, numero_sm, observacao_gr, placa) \
             VALUES ('ana', '2024-01-01 08:00:00', NULL, NULL, 'CCC3333')",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_linhas_por_campo_ordenadas() {
        let conn = conexao();
        let id = registro(&conn);
        historico(&conn, id, "ana", r#"{"placa": {"valor_antigo": "", "valor_novo": "BBB"}}"#, "2024-01-02 10:00:00");
        historico(&conn, id, "ana", r#"{"placa": {"valor_antigo": "BBB", "valor_novo": "CCC3333"}}"#, "05-01-2024 10:00:00");

        let h = obter_historico_alteracoes(&conn, id).unwrap();
        assert_eq!(h.alteracoes.len(), 2);
        assert_eq!(h.alteracoes[0].valor_novo, "CCC3333");
        assert_eq!(h.alteracoes[0].data_alteracao, "05/01/2024 10:00:00");
        assert_eq!(h.alteracoes[1].valor_antigo, "Vazio");
        assert_eq!(h.registro_info["data_modificacao"], "05/01/2024 10:00:00");
        assert_eq!(h.registro_info["data_registro"], "01/01/2024 08:00:00");
        assert_eq!(h.registro_info["numero_sm"], "Não informado");
    }

    #[test]
    fn test_eventos_gr_usam_valor_atual_e_anterior() {
        let conn = conexao();
        let id = registro(&conn);
        historico(&conn, id, "gr1", r#"{"tipo": "Edição GR", "campos": ["numero_sm", "observacao_gr", "placa"], "usuario": "gr1"}"#, "2024-01-03 10:00:00");

        let h = obter_historico_alteracoes(&conn, id).unwrap();
        let por_campo = |c: &str| h.alteracoes.iter().find(|l| l.campo == c).unwrap().clone();
        assert_eq!(por_campo("numero_sm").valor_novo, "N/A");
        assert_eq!(por_campo("observacao_gr").valor_novo, "Vazio");
        assert_eq!(por_campo("placa").valor_novo, "CCC3333");
        assert_eq!(por_campo("placa").valor_antigo, "Valor anterior não disponível");
    }

    #[test]
    fn test_evento_com_valores_busca_anterior() {
        let conn = conexao();
        let id = registro(&conn);
        historico(&conn, id, "gr1", r#"{"tipo": "Edição GR", "campos": ["numero_sm"], "valores": {"numero_sm": "10"}}"#, "2024-01-03 10:00:00");
        historico(&conn, id, "gr1", r#"{"tipo": "Edição GR", "campos": ["numero_sm"], "valores": {"numero_sm": "11"}}"#, "2024-01-04 10:00:00");

        let h = obter_historico_alteracoes(&conn, id).unwrap();
        assert_eq!(h.alteracoes[0].valor_novo, "11");
        assert_eq!(h.alteracoes[0].valor_antigo, "10");
        assert_eq!(h.alteracoes[1].valor_antigo, "Valor anterior não disponível");
    }

    #[test]
    fn test_sem_campos_vira_linha_generica() {
        let conn = conexao();
        let id = registro(&conn);
        historico(&conn, id, "ana", r#"{"acao": "criação", "tabela": "registros"}"#, "2024-01-01 08:00:00");
        historico(&conn, id, "ana", "lixo total", "2024-01-01 09:00:00");

        let h = obter_historico_alteracoes(&conn, id).unwrap();
        assert_eq!(h.alteracoes.len(), 2);
        assert!(h.alteracoes.iter().all(|l| l.campo == "Registro"));
        assert_eq!(h.alteracoes[0].valor_novo, "Alteração registrada");
    }

    #[test]
    fn test_registro_inexistente() {
        let conn = conexao();
        assert!(matches!(
            obter_historico_alteracoes(&conn, 404).unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
