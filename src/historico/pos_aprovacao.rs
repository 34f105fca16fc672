//! Detecção de alterações feitas depois da aprovação (SM/AE)
//!
//! Um registro entra na fila de revisão da GR quando já tem SM ou AE e
//! alguém de fora da GR mexe em um campo monitorado depois da data da
//! aprovação. Esta é a única implementação da regra: dashboard, filtro de
//! listagem e contadores passam por aqui.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap};

use super::conteudo::TipoEvento;
use super::gravacao::{self, EntradaHistorico};
use crate::models::registro::colunas_select;
use crate::models::{Campo, Nivel, Registro};
use crate::utils::datas::parse_data;
use crate::utils::{AppError, AppResult};

/// Campos cuja alteração após SM/AE precisa de revisão
pub const CAMPOS_MONITORADOS: &[&str] = &[
    "usuario",
    "placa",
    "motorista",
    "cpf",
    "mot_loc",
    "carreta",
    "carreta1",
    "carreta2",
    "carreta_loc",
    "cliente",
    "loc_cliente",
    "arquivo",
    "container_1",
    "container_2",
    "status_sm",
    "tipo_carga",
    "status_container",
    "modalidade",
    "gerenciadora",
    "booking_di",
    "pedido_referencia",
    "lote_cs",
    "on_time_cliente",
    "horario_previsto",
    "observacao_operacional",
    "observacao_gr",
    "destino_intermediario",
    "destino_final",
    "anexar_nf",
    "anexar_os",
    "anexar_agendamento",
    "numero_nf",
    "serie",
    "quantidade",
    "peso_bruto",
    "valor_total_nota",
    "unidade",
    "arquivo_nf_nome",
    "arquivo_os_nome",
    "arquivo_agendamento_nome",
    "origem",
];

const CAMPOS_APROVACAO: [&str; 2] = ["numero_sm", "numero_ae"];

/// Nível de cada usuário, chave em minúsculas
#[derive(Debug, Clone, Default)]
pub struct NiveisUsuarios(HashMap<String, Nivel>);

impl NiveisUsuarios {
    pub fn carregar(conn: &Connection) -> AppResult<Self> {
        let mut stmt = conn.prepare("SELECT username, nivel FROM usuarios")?;
        let mapa = stmt
            .query_map([], |row| {
                let username: String = row.get(0)?;
                let nivel: Option<String> = row.get(1)?;
                Ok((
                    username.trim().to_lowercase(),
                    Nivel::from_db(nivel.as_deref().unwrap_or("")),
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self(mapa))
    }

    pub fn nivel(&self, username: &str) -> Option<Nivel> {
        self.0.get(&username.trim().to_lowercase()).copied()
    }

    /// Usuário desconhecido não conta como GR
    pub fn is_gr(&self, username: Option<&str>) -> bool {
        username.and_then(|u| self.nivel(u)) == Some(Nivel::Gr)
    }
}

#[cfg(test)]
impl NiveisUsuarios {
    pub fn from_pares(pares: &[(&str, Nivel)]) -> Self {
        Self(pares.iter().map(|(u, n)| (u.to_lowercase(), *n)).collect())
    }
}

/// Momento da aprovação: a mais recente entre `data_sm` e `data_ae`
pub fn marco_aprovacao(registro: &Registro) -> Option<NaiveDateTime> {
    [Campo::DataSm, Campo::DataAe]
        .iter()
        .filter_map(|c| parse_data(registro.valor(*c)))
        .max()
}

/// A entrada é uma alteração pós-aprovação que a GR precisa revisar
pub fn entrada_pos_aprovacao(
    entrada: &EntradaHistorico,
    marco: NaiveDateTime,
    niveis: &NiveisUsuarios,
) -> bool {
    let Some(data) = entrada.data else {
        return false;
    };
    if data <= marco {
        return false;
    }
    if niveis.is_gr(entrada.alterado_por.as_deref()) {
        return false;
    }
    if entrada.conteudo.tipo_evento().is_some_and(TipoEvento::interno_gr) {
        return false;
    }

    let campos = entrada.conteudo.campos_tocados();
    if campos.iter().any(|c| CAMPOS_APROVACAO.contains(&c.as_str())) {
        return false;
    }
    campos.iter().any(|c| CAMPOS_MONITORADOS.contains(&c.as_str()))
}

/// Regra completa para um registro e seu histórico
pub fn precisa_revisao(
    registro: &Registro,
    historico: &[EntradaHistorico],
    niveis: &NiveisUsuarios,
) -> bool {
    if registro.excluido || registro.alteracoes_verificadas || !registro.aprovado() {
        return false;
    }
    let Some(marco) = marco_aprovacao(registro) else {
        return false;
    };
    historico
        .iter()
        .any(|entrada| entrada_pos_aprovacao(entrada, marco, niveis))
}

/// Registros aprovados, não excluídos e ainda não verificados
fn candidatos(conn: &Connection) -> AppResult<Vec<Registro>> {
    let sql = format!(
        "SELECT {} FROM registros \
         WHERE (excluido IS NULL OR excluido = 0) \
           AND (alteracoes_verificadas IS NULL OR alteracoes_verificadas = 0) \
           AND ((numero_sm IS NOT NULL AND TRIM(numero_sm) NOT IN ('', '0')) \
             OR (numero_ae IS NOT NULL AND TRIM(numero_ae) NOT IN ('', '0'))) \
         ORDER BY id DESC",
        colunas_select(None)
    );
    let mut stmt = conn.prepare(&sql)?;
    let registros = stmt
        .query_map([], Registro::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(registros)
}

/// Todos os registros que hoje precisam de revisão, mais recentes primeiro
pub fn registros_com_alteracoes(conn: &Connection) -> AppResult<Vec<Registro>> {
    let candidatos = candidatos(conn)?;
    if candidatos.is_empty() {
        return Ok(Vec::new());
    }

    let niveis = NiveisUsuarios::carregar(conn)?;
    let ids: Vec<i64> = candidatos.iter().map(|r| r.id).collect();
    let historicos: BTreeMap<i64, Vec<EntradaHistorico>> = gravacao::carregar_varios(conn, &ids)?;

    Ok(candidatos
        .into_iter()
        .filter(|r| {
            historicos
                .get(&r.id)
                .is_some_and(|h| precisa_revisao(r, h, &niveis))
        })
        .collect())
}

pub fn ids_com_alteracoes(conn: &Connection) -> AppResult<Vec<i64>> {
    Ok(registros_com_alteracoes(conn)?.into_iter().map(|r| r.id).collect())
}

pub fn contar_alteracoes_pos_aprovacao(conn: &Connection) -> AppResult<usize> {
    Ok(registros_com_alteracoes(conn)?.len())
}

/// Marca as alterações do registro como revisadas pela GR
pub fn marcar_alteracoes_verificadas(
    conn: &mut Connection,
    registro_id: i64,
    usuario: &str,
) -> AppResult<()> {
    let tx = conn.transaction()?;
    let atualizados = tx.execute(
        "UPDATE registros SET alteracoes_verificadas = 1 \
         WHERE id = ?1 AND (excluido IS NULL OR excluido = 0)",
        params![registro_id],
    )?;
    if atualizados == 0 {
        return Err(AppError::NotFound(format!("Registro {} não encontrado", registro_id)));
    }
    gravacao::registrar_evento(
        &tx,
        registro_id,
        usuario,
        TipoEvento::VerificacaoAlteracoes,
        &[],
        BTreeMap::new(),
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;

    fn inserir_registro(conn: &Connection, numero_sm: &str, data_sm: &str) -> i64 {
        conn.execute(
            "INSERT INTO registros (usuario, data_registro, numero_sm, data_sm, placa, alteracoes_verificadas, excluido) \
             VALUES ('ana', '2024-01-01 08:00:00', ?1, ?2, 'AAA1111', 0, 0)",
            params![numero_sm, data_sm],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn inserir_historico(conn: &Connection, registro_id: i64, usuario: &str, json: &str, data: &str) {
        conn.execute(
            "INSERT INTO historico (registro_id, alterado_por, alteracoes, data_alteracao) VALUES (?1, ?2, ?3, ?4)",
            params![registro_id, usuario, json, data],
        )
        .unwrap();
    }

    fn usuarios(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO usuarios (username, password_hash, nivel) VALUES ('ana', 'x', 'comum');
             INSERT INTO usuarios (username, password_hash, nivel) VALUES ('gr1', 'x', 'gr');
             INSERT INTO usuarios (username, password_hash, nivel) VALUES ('chefe', 'x', 'admin');",
        )
        .unwrap();
    }

    const EDICAO_PLACA: &str = r#"{"placa": {"valor_antigo": "AAA1111", "valor_novo": "BBB2222"}}"#;

    #[test]
    fn test_edicao_comum_depois_da_sm() {
        let conn = conexao();
        usuarios(&conn);
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(&conn, id, "ana", EDICAO_PLACA, "2024-01-11 09:00:00");
        assert_eq!(ids_com_alteracoes(&conn).unwrap(), vec![id]);
    }

    #[test]
    fn test_edicao_antes_da_aprovacao_nao_conta() {
        let conn = conexao();
        usuarios(&conn);
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(&conn, id, "ana", EDICAO_PLACA, "2024-01-09 09:00:00");
        inserir_historico(&conn, id, "ana", EDICAO_PLACA, "2024-01-10 10:00:00");
        assert!(ids_com_alteracoes(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_datas_legadas_comparadas_como_data() {
        let conn = conexao();
        usuarios(&conn);
        // "09-02-2024" é menor que "2024-01-10" como texto, mas é posterior
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(&conn, id, "ana", EDICAO_PLACA, "09-02-2024 10:00:00");
        assert_eq!(ids_com_alteracoes(&conn).unwrap(), vec![id]);

        // e "2024-01-..." > "10-01-2024" como texto, mas é anterior
        let outro = inserir_registro(&conn, "SM-2", "10/01/2024 10:00:00");
        inserir_historico(&conn, outro, "ana", EDICAO_PLACA, "2024-01-05 10:00:00");
        assert!(!ids_com_alteracoes(&conn).unwrap().contains(&outro));
    }

    #[test]
    fn test_ignora_gr_eventos_internos_e_campos_de_aprovacao() {
        let conn = conexao();
        usuarios(&conn);
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(&conn, id, "gr1", EDICAO_PLACA, "2024-01-11 09:00:00");
        inserir_historico(
            &conn,
            id,
            "chefe",
            r#"{"tipo": "Edição GR", "campos": ["placa"], "usuario": "chefe"}"#,
            "2024-01-11 10:00:00",
        );
        inserir_historico(
            &conn,
            id,
            "ana",
            r#"{"numero_sm": {"valor_antigo": "", "valor_novo": "SM-1"}, "placa": {"valor_antigo": "A", "valor_novo": "B"}}"#,
            "2024-01-11 11:00:00",
        );
        inserir_historico(
            &conn,
            id,
            "ana",
            r#"{"sla_sm": {"valor_antigo": "1", "valor_novo": "2"}}"#,
            "2024-01-11 12:00:00",
        );
        assert!(ids_com_alteracoes(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_usuario_desconhecido_e_admin_contam() {
        let conn = conexao();
        usuarios(&conn);
        let a = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(&conn, a, "removido", EDICAO_PLACA, "2024-01-11 09:00:00");
        let b = inserir_registro(&conn, "", "");
        conn.execute("UPDATE registros SET numero_ae = 'AE-5', data_ae = '2024-01-10 10:00:00' WHERE id = ?1", [b])
            .unwrap();
        inserir_historico(&conn, b, "chefe", EDICAO_PLACA, "2024-01-12 09:00:00");
        let mut ids = ids_com_alteracoes(&conn).unwrap();
        ids.sort();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_json_corrompido_ainda_detecta() {
        let conn = conexao();
        usuarios(&conn);
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(
            &conn,
            id,
            "ana",
            "{'motorista': {'valor_antigo': 'Zé', 'valor_novo': None}",
            "2024-01-11 09:00:00",
        );
        assert_eq!(contar_alteracoes_pos_aprovacao(&conn).unwrap(), 1);
    }

    #[test]
    fn test_sem_data_de_aprovacao_ou_sm_zero() {
        let conn = conexao();
        usuarios(&conn);
        let sem_data = inserir_registro(&conn, "SM-1", "");
        inserir_historico(&conn, sem_data, "ana", EDICAO_PLACA, "2024-01-11 09:00:00");
        let zero = inserir_registro(&conn, "0", "2024-01-10 10:00:00");
        inserir_historico(&conn, zero, "ana", EDICAO_PLACA, "2024-01-11 09:00:00");
        assert!(ids_com_alteracoes(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_marcar_verificadas_tira_da_fila() {
        let mut conn = conexao();
        usuarios(&conn);
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        inserir_historico(&conn, id, "ana", EDICAO_PLACA, "2024-01-11 09:00:00");
        assert_eq!(contar_alteracoes_pos_aprovacao(&conn).unwrap(), 1);

        marcar_alteracoes_verificadas(&mut conn, id, "gr1").unwrap();
        assert_eq!(contar_alteracoes_pos_aprovacao(&conn).unwrap(), 0);

        let historico = gravacao::carregar(&conn, id).unwrap();
        assert_eq!(
            historico.last().unwrap().conteudo.tipo_evento(),
            Some(&TipoEvento::VerificacaoAlteracoes)
        );
    }

    #[test]
    fn test_marcar_registro_excluido() {
        let mut conn = conexao();
        let id = inserir_registro(&conn, "SM-1", "2024-01-10 10:00:00");
        conn.execute("UPDATE registros SET excluido = 1 WHERE id = ?1", [id]).unwrap();
        let erro = marcar_alteracoes_verificadas(&mut conn, id, "gr1").unwrap_err();
        assert!(matches!(erro, AppError::NotFound(_)));
        assert!(matches!(
            marcar_alteracoes_verificadas(&mut conn, 999, "gr1").unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
