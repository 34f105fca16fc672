//! Registros de atendimento: criação, edição por perfil, exclusão lógica,
//! listagem com filtros dos cards e busca global.

use chrono::NaiveDateTime;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{json, Map, Value};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::access_control::{campo_editavel, campo_oculto};
use crate::historico::conteudo::texto_valor;
use crate::historico::diff::diff_campos;
use crate::historico::{gravacao, pos_aprovacao, MudancaCampo, TipoEvento};
use crate::models::campo::mapear_campo_para_db;
use crate::models::registro::colunas_select;
use crate::models::{Campo, Nivel, NovoLog, Registro, TipoCampo};
use crate::services::auditoria::registrar_log;
use crate::utils::datas::{agora, agora_texto, formatar_padrao, horas_entre, normalizar, parse_data};
use crate::utils::logging::{log_registro_alterado, log_validation_error};
use crate::utils::{AppError, AppResult};

/// Formulário recebido: nome do campo (rótulo ou coluna) → valor
pub type Formulario = BTreeMap<String, String>;

/// Colunas usadas pela busca global
const CAMPOS_BUSCA: &[&str] = &[
    "id",
    "usuario",
    "placa",
    "motorista",
    "cpf",
    "mot_loc",
    "carreta",
    "carreta_loc",
    "cliente",
    "loc_cliente",
    "container_1",
    "container_2",
    "numero_sm",
    "numero_ae",
    "arquivo",
    "data_registro",
    "status_sm",
];

const NAO_EXCLUIDO: &str = "(excluido IS NULL OR excluido = 0)";

/// Converte o corpo JSON de um formulário. Valores nulos viram texto vazio.
pub fn formulario_de_json(corpo: &Map<String, Value>) -> Formulario {
    corpo
        .iter()
        .map(|(k, v)| (k.clone(), texto_valor(v).unwrap_or_default()))
        .collect()
}

/// Campos gerenciados pelo upload de anexos, fora do formulário
fn gerenciado_por_anexos(campo: Campo) -> bool {
    matches!(campo.tipo(), TipoCampo::Anexo)
        || matches!(
            campo,
            Campo::ArquivoNfNome | Campo::ArquivoOsNome | Campo::ArquivoAgendamentoNome
        )
}

fn normalizar_valor(campo: Campo, valor: &str) -> AppResult<String> {
    let valor = valor.trim();
    if valor.is_empty() {
        return Ok(String::new());
    }
    match campo.tipo() {
        TipoCampo::Inteiro => {
            let numero = valor
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && n.fract() == 0.0)
                .ok_or_else(|| {
                    log_validation_error(campo.db(), valor);
                    AppError::ValidationError(format!("{} deve ser um número inteiro", campo.rotulo()))
                })?;
            Ok(format!("{}", numero as i64))
        }
        TipoCampo::Decimal => {
            let numero = valor
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| {
                    log_validation_error(campo.db(), valor);
                    AppError::ValidationError(format!("{} deve ser numérico", campo.rotulo()))
                })?;
            Ok(format!("{}", numero))
        }
        TipoCampo::DataHora => Ok(normalizar(valor)),
        _ => Ok(valor.to_string()),
    }
}

/// Mapeia o formulário para colunas do catálogo, validando tipos numéricos.
/// Nomes desconhecidos são ignorados.
pub fn mapear_formulario(form: &Formulario) -> AppResult<BTreeMap<Campo, String>> {
    let mut dados = BTreeMap::new();
    for (nome, valor) in form {
        match mapear_campo_para_db(nome) {
            Some(campo) if !gerenciado_por_anexos(campo) => {
                dados.insert(campo, normalizar_valor(campo, valor)?);
            }
            Some(_) => {}
            None => tracing::debug!("Campo de formulário ignorado: {}", nome),
        }
    }
    Ok(dados)
}

/// Horas entre duas datas em qualquer formato conhecido
pub fn calcular_sla_horas(inicio: &str, fim: &str) -> Option<f64> {
    let inicio = parse_data(inicio)?;
    let fim = parse_data(fim)?;
    Some(horas_entre(&inicio, &fim))
}

/// Valor efetivo depois da edição: o novo quando presente, senão o gravado
fn efetivo<'a>(atual: &'a Registro, novos: &'a BTreeMap<Campo, String>, campo: Campo) -> &'a str {
    novos.get(&campo).map(|s| s.as_str()).unwrap_or_else(|| atual.valor(campo))
}

/// Data de SM/AE quando o número muda, depois recálculo dos SLAs
fn aplicar_marcos_gr(atual: &Registro, novos: &mut BTreeMap<Campo, String>, agora: &NaiveDateTime) {
    for (numero, data) in [(Campo::NumeroSm, Campo::DataSm), (Campo::NumeroAe, Campo::DataAe)] {
        let Some(valor) = novos.get(&numero) else { continue };
        let novo_numero = !valor.is_empty() && valor.trim() != atual.valor(numero).trim();
        let data_informada = novos.get(&data).is_some_and(|d| !d.is_empty());
        if novo_numero && !data_informada {
            novos.insert(data, formatar_padrao(agora));
        }
    }

    let data_registro = atual.data_registro.clone().unwrap_or_default();
    let data_sm = efetivo(atual, novos, Campo::DataSm).to_string();
    let data_ae = efetivo(atual, novos, Campo::DataAe).to_string();

    if let Some(horas) = calcular_sla_horas(&data_registro, &data_sm) {
        novos.insert(Campo::SlaSm, format!("{}", horas));
    }
    let base_ae = if parse_data(&data_sm).is_some() { &data_sm } else { &data_registro };
    if let Some(horas) = calcular_sla_horas(base_ae, &data_ae) {
        novos.insert(Campo::SlaAe, format!("{}", horas));
    }
}

fn valor_sql(valor: &str) -> SqlValue {
    if valor.is_empty() {
        SqlValue::Null
    } else {
        SqlValue::Text(valor.to_string())
    }
}

fn buscar(conn: &Connection, registro_id: i64) -> AppResult<Registro> {
    let sql = format!(
        "SELECT {} FROM registros WHERE id = ?1 AND {}",
        colunas_select(None),
        NAO_EXCLUIDO
    );
    conn.query_row(&sql, [registro_id], Registro::from_row)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("Registro {} não encontrado", registro_id)))
}

pub fn obter(conn: &Connection, registro_id: i64) -> AppResult<Registro> {
    buscar(conn, registro_id)
}

/// Perfil de quem criou o registro; criador desconhecido conta como comum
fn nivel_do_criador(conn: &Connection, registro: &Registro) -> AppResult<Nivel> {
    let Some(usuario) = registro.usuario.as_deref() else {
        return Ok(Nivel::Comum);
    };
    let nivel: Option<String> = conn
        .query_row("SELECT nivel FROM usuarios WHERE username = ?1", [usuario], |r| r.get(0))
        .optional()?;
    Ok(nivel.map(|n| Nivel::from_db(&n)).unwrap_or(Nivel::Comum))
}

/// Perfil comum só altera registros criados por outro usuário comum
pub(crate) fn exigir_edicao_permitida(conn: &Connection, registro: &Registro, nivel: Nivel) -> AppResult<()> {
    if nivel == Nivel::Comum && nivel_do_criador(conn, registro)? != Nivel::Comum {
        return Err(AppError::Forbidden(
            "Registros criados por GR ou administradores não podem ser editados por este perfil".into(),
        ));
    }
    Ok(())
}

/// Edição do perfil comum em registro aprovado: carimba quem alterou e
/// devolve o registro para a fila de revisão da GR.
pub(crate) fn marcar_modificacao_comum(
    conn: &Connection,
    registro: &Registro,
    usuario: &str,
    nivel: Nivel,
) -> AppResult<()> {
    if nivel != Nivel::Comum || !registro.aprovado() {
        return Ok(());
    }
    conn.execute(
        "UPDATE registros SET data_modificacao = ?1, modificado_por = ?2, alteracoes_verificadas = 0 \
         WHERE id = ?3",
        params![agora_texto(), usuario, registro.id],
    )?;
    Ok(())
}

pub fn criar(conn: &mut Connection, usuario: &str, nivel: Nivel, form: &Formulario) -> AppResult<i64> {
    let mut dados: BTreeMap<Campo, String> = mapear_formulario(form)?
        .into_iter()
        .filter(|(c, _)| !campo_oculto(*c, nivel) && (nivel.is_gestao() || !c.is_gr()))
        .collect();

    let faltando: Vec<&str> = Campo::OBRIGATORIOS
        .iter()
        .filter(|c| dados.get(c).map_or(true, |v| v.is_empty()))
        .map(|c| c.rotulo())
        .collect();
    if !faltando.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Campos obrigatórios não preenchidos: {}",
            faltando.join(", ")
        )));
    }

    let agora = agora();
    let data_registro = formatar_padrao(&agora);
    if nivel.is_gestao() {
        let base = Registro { data_registro: Some(data_registro.clone()), ..Default::default() };
        aplicar_marcos_gr(&base, &mut dados, &agora);
    }
    dados.retain(|_, v| !v.is_empty());

    let mut colunas = vec!["usuario", "data_registro", "alteracoes_verificadas", "excluido"];
    let mut valores = vec![
        SqlValue::Text(usuario.to_string()),
        SqlValue::Text(data_registro),
        SqlValue::Integer(0),
        SqlValue::Integer(0),
    ];
    for (campo, valor) in &dados {
        colunas.push(campo.db());
        valores.push(valor_sql(valor));
    }
    let marcadores = vec!["?"; colunas.len()].join(", ");

    let tx = conn.transaction()?;
    tx.execute(
        &format!("INSERT INTO registros ({}) VALUES ({})", colunas.join(", "), marcadores),
        params_from_iter(valores.iter()),
    )?;
    let id = tx.last_insert_rowid();
    gravacao::registrar_acao(&tx, id, usuario, "criação", None)?;
    registrar_log(
        &tx,
        &NovoLog::new(usuario, "criação")
            .nivel(nivel.as_str())
            .registro(id)
            .descricao(format!("Registro {} criado", id))
            .origem("registros"),
    )?;
    tx.commit()?;

    tracing::info!("📝 Registro {} criado por {}", id, usuario);
    Ok(id)
}

/// Aplica uma edição respeitando as regras do perfil. Devolve os campos alterados.
pub fn atualizar(
    conn: &mut Connection,
    registro_id: i64,
    form: &Formulario,
    usuario: &str,
    nivel: Nivel,
) -> AppResult<Vec<Campo>> {
    let tx = conn.transaction()?;
    let atual = buscar(&tx, registro_id)?;

    exigir_edicao_permitida(&tx, &atual, nivel)?;

    let mut novos: BTreeMap<Campo, String> = BTreeMap::new();
    for (campo, valor) in mapear_formulario(form)? {
        if campo_editavel(campo, nivel) {
            novos.insert(campo, valor);
        } else {
            tracing::debug!("Campo {} ignorado na edição por {} ({})", campo, usuario, nivel);
        }
    }

    if nivel.is_gestao() {
        aplicar_marcos_gr(&atual, &mut novos, &agora());
    }

    let mudancas: BTreeMap<Campo, MudancaCampo> = diff_campos(&atual.dados, &novos);
    if mudancas.is_empty() {
        return Ok(Vec::new());
    }

    let mut sets: Vec<String> = Vec::new();
    let mut valores: Vec<SqlValue> = Vec::new();
    for campo in mudancas.keys() {
        sets.push(format!("{} = ?", campo.db()));
        valores.push(valor_sql(novos.get(campo).map(|s| s.as_str()).unwrap_or("")));
    }
    valores.push(SqlValue::Integer(registro_id));
    tx.execute(
        &format!("UPDATE registros SET {} WHERE id = ?", sets.join(", ")),
        params_from_iter(valores.iter()),
    )?;
    marcar_modificacao_comum(&tx, &atual, usuario, nivel)?;

    let campos: Vec<Campo> = mudancas.keys().copied().collect();
    if nivel == Nivel::Gr {
        let valores_gr = mudancas
            .iter()
            .map(|(c, m)| (c.db().to_string(), m.valor_novo.clone().unwrap_or_default()))
            .collect();
        gravacao::registrar_evento(&tx, registro_id, usuario, TipoEvento::EdicaoGr, &campos, valores_gr)?;
    } else {
        gravacao::registrar_alteracoes(&tx, registro_id, usuario, &mudancas)?;
    }

    let anterior: Map<String, Value> = mudancas
        .iter()
        .map(|(c, m)| (c.db().to_string(), json!(m.valor_antigo)))
        .collect();
    let novo: Map<String, Value> = mudancas
        .iter()
        .map(|(c, m)| (c.db().to_string(), json!(m.valor_novo)))
        .collect();
    registrar_log(
        &tx,
        &NovoLog::new(usuario, "edição")
            .nivel(nivel.as_str())
            .registro(registro_id)
            .descricao(format!("{} campo(s) alterado(s)", campos.len()))
            .detalhes(campos.iter().map(|c| c.db()).collect::<Vec<_>>().join(", "))
            .origem("registros")
            .valores(
                Some(Value::Object(anterior).to_string()),
                Some(Value::Object(novo).to_string()),
            ),
    )?;
    tx.commit()?;

    log_registro_alterado(registro_id, usuario, campos.len());
    Ok(campos)
}

/// Exclusão lógica. Admin exclui qualquer registro; comum só os próprios.
pub fn excluir(conn: &mut Connection, registro_id: i64, usuario: &str, nivel: Nivel) -> AppResult<()> {
    let tx = conn.transaction()?;
    let registro = buscar(&tx, registro_id)?;

    let permitido = match nivel {
        Nivel::Admin => true,
        Nivel::Comum => registro.usuario.as_deref() == Some(usuario),
        Nivel::Gr => false,
    };
    if !permitido {
        return Err(AppError::Forbidden("Sem permissão para excluir este registro".into()));
    }

    tx.execute(
        "UPDATE registros SET excluido = 1, data_exclusao = ?1, excluido_por = ?2 WHERE id = ?3",
        params![agora_texto(), usuario, registro_id],
    )?;
    gravacao::registrar_acao(&tx, registro_id, usuario, "exclusão", None)?;
    registrar_log(
        &tx,
        &NovoLog::new(usuario, "exclusão")
            .nivel(nivel.as_str())
            .registro(registro_id)
            .descricao(format!("Registro {} excluído", registro_id))
            .origem("registros"),
    )?;
    tx.commit()?;

    tracing::info!("🗑️ Registro {} excluído por {}", registro_id, usuario);
    Ok(())
}

/// Filtros da listagem (cards do dashboard e filtros por coluna)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiltrosRegistro {
    pub sem_nf: bool,
    pub sem_os: bool,
    pub sem_container: bool,
    pub sem_sm: bool,
    pub sem_ae: bool,
    pub status_pendente: bool,
    pub alteracoes_pos_smae: bool,
    pub usuario: Option<String>,
    pub iguais: BTreeMap<Campo, String>,
}

fn ligado(valor: &str) -> bool {
    matches!(valor.trim().to_lowercase().as_str(), "1" | "true" | "on" | "sim")
}

impl FiltrosRegistro {
    /// Interpreta a query string. Chaves fora do catálogo são ignoradas.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let mut filtros = FiltrosRegistro::default();
        for (chave, valor) in query {
            if valor.trim().is_empty() {
                continue;
            }
            match chave.as_str() {
                "sem_nf" => filtros.sem_nf = ligado(valor),
                "sem_os" => filtros.sem_os = ligado(valor),
                "sem_container" => filtros.sem_container = ligado(valor),
                "sem_sm" => filtros.sem_sm = ligado(valor),
                "sem_ae" => filtros.sem_ae = ligado(valor),
                "alteracoes_pos_smae" => filtros.alteracoes_pos_smae = ligado(valor),
                "status_sm" if valor.trim() == "Pendente" => filtros.status_pendente = true,
                "usuario" => filtros.usuario = Some(valor.trim().to_string()),
                outro => {
                    if let Some(campo) = Campo::from_db(outro) {
                        filtros.iguais.insert(campo, valor.trim().to_string());
                    }
                }
            }
        }
        filtros
    }

    fn clausula(&self, conn: &Connection) -> AppResult<(String, Vec<SqlValue>)> {
        let mut condicoes = vec![NAO_EXCLUIDO.to_string()];
        let mut valores = Vec::new();

        let vazio = |coluna: &str| format!("({0} IS NULL OR TRIM({0}) = '')", coluna);
        if self.sem_nf {
            condicoes.push(vazio("anexar_nf"));
        }
        if self.sem_os {
            condicoes.push(vazio("anexar_os"));
        }
        if self.sem_container {
            condicoes.push(vazio("container_1"));
        }
        if self.sem_sm {
            condicoes.push(vazio("numero_sm"));
        }
        if self.sem_ae {
            condicoes.push(vazio("numero_ae"));
        }
        if self.status_pendente {
            condicoes.push("(status_sm = 'Pendente' OR status_sm IS NULL OR TRIM(status_sm) = '')".into());
        }
        if self.alteracoes_pos_smae {
            let ids = pos_aprovacao::ids_com_alteracoes(conn)?;
            if ids.is_empty() {
                condicoes.push("0".into());
            } else {
                let lista = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
                condicoes.push(format!("id IN ({})", lista));
            }
        }
        if let Some(usuario) = &self.usuario {
            condicoes.push("usuario = ?".into());
            valores.push(SqlValue::Text(usuario.clone()));
        }
        for (campo, valor) in &self.iguais {
            condicoes.push(format!("{} = ?", campo.db()));
            valores.push(SqlValue::Text(valor.clone()));
        }

        Ok((condicoes.join(" AND "), valores))
    }
}

type ChaveOrdem = (u8, Option<NaiveDateTime>, Reverse<Option<NaiveDateTime>>);

/// Chave de ordenação: horário previsto futuro primeiro (o mais próximo antes),
/// depois sem horário, depois horário passado, esses dois pela data de
/// registro mais recente. Data de registro ilegível vai para o fim do grupo.
fn chave_ordem(registro: &Registro, agora: &NaiveDateTime) -> ChaveOrdem {
    let data_registro = registro.data_registro.as_deref().and_then(parse_data);
    match parse_data(registro.valor(Campo::HorarioPrevisto)) {
        Some(previsto) if previsto >= *agora => (0, Some(previsto), Reverse(None)),
        Some(_) => (2, None, Reverse(data_registro)),
        None => (1, None, Reverse(data_registro)),
    }
}

pub fn listar(
    conn: &Connection,
    filtros: &FiltrosRegistro,
    pagina: i64,
    por_pagina: i64,
) -> AppResult<Vec<Registro>> {
    let (onde, valores) = filtros.clausula(conn)?;
    let sql = format!("SELECT {} FROM registros WHERE {}", colunas_select(None), onde);
    let mut stmt = conn.prepare(&sql)?;
    let mut registros = stmt
        .query_map(params_from_iter(valores.iter()), Registro::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    // Datas legadas em vários formatos: ordenação feita após o parse
    let agora = agora();
    registros.sort_by_cached_key(|r| chave_ordem(r, &agora));

    let por_pagina = usize::try_from(por_pagina.max(1)).unwrap_or(usize::MAX);
    let inicio = usize::try_from(pagina.max(1) - 1)
        .unwrap_or(usize::MAX)
        .saturating_mul(por_pagina);
    Ok(registros.into_iter().skip(inicio).take(por_pagina).collect())
}

pub fn contar(conn: &Connection, filtros: &FiltrosRegistro) -> AppResult<i64> {
    let (onde, valores) = filtros.clausula(conn)?;
    Ok(conn.query_row(
        &format!("SELECT COUNT(*) FROM registros WHERE {}", onde),
        params_from_iter(valores.iter()),
        |r| r.get(0),
    )?)
}

fn clausula_busca(termo: &str) -> (String, Vec<SqlValue>) {
    let padrao = format!("%{}%", termo);
    let condicoes = CAMPOS_BUSCA
        .iter()
        .map(|c| format!("{} LIKE ?", c))
        .collect::<Vec<_>>()
        .join(" OR ");
    let valores = CAMPOS_BUSCA.iter().map(|_| SqlValue::Text(padrao.clone())).collect();
    (format!("{} AND ({})", NAO_EXCLUIDO, condicoes), valores)
}

/// Busca em várias colunas ao mesmo tempo, mais recentes primeiro
pub fn busca_global(conn: &Connection, termo: &str, limit: i64, offset: i64) -> AppResult<Vec<Registro>> {
    let termo = termo.trim();
    if termo.is_empty() {
        return Ok(Vec::new());
    }
    let (onde, valores) = clausula_busca(termo);
    let sql = format!("SELECT {} FROM registros WHERE {}", colunas_select(None), onde);
    let mut stmt = conn.prepare(&sql)?;
    let mut registros = stmt
        .query_map(params_from_iter(valores.iter()), Registro::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    registros.sort_by_cached_key(|r| {
        Reverse(r.data_registro.as_deref().and_then(parse_data))
    });
    Ok(registros
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect())
}

pub fn contar_busca_global(conn: &Connection, termo: &str) -> AppResult<i64> {
    let termo = termo.trim();
    if termo.is_empty() {
        return Ok(0);
    }
    let (onde, valores) = clausula_busca(termo);
    Ok(conn.query_row(
        &format!("SELECT COUNT(*) FROM registros WHERE {}", onde),
        params_from_iter(valores.iter()),
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;
    use crate::historico::pos_aprovacao::ids_com_alteracoes;

    fn form(pares: &[(&str, &str)]) -> Formulario {
        pares.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn usuario(conn: &Connection, nome: &str, nivel: &str) {
        conn.execute(
            "INSERT INTO usuarios (username, password_hash, nivel) VALUES (?1, 'x', ?2)",
            params![nome, nivel],
        )
        .unwrap();
    }

    fn base() -> Formulario {
        form(&[
            ("UNIDADE", "Santos"),
            ("CLIENTE", "ACME"),
            ("MOTORISTA", "João"),
            ("CPF MOTORISTA", "01234567890"),
            ("CAVALO", "ABC1D23"),
        ])
    }

    fn contar_historico(conn: &Connection, id: i64) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM historico WHERE registro_id = ?1", [id], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_criar_valida_obrigatorios_e_numeros() {
        let mut conn = conexao();
        let err = criar(&mut conn, "ana", Nivel::Comum, &form(&[("CLIENTE", "ACME")])).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m.contains("CAVALO")));

        let mut f = base();
        f.insert("QUANTIDADE".into(), "doze".into());
        assert!(matches!(
            criar(&mut conn, "ana", Nivel::Comum, &f).unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[test]
    fn test_criar_grava_historico_e_log() {
        let mut conn = conexao();
        let mut f = base();
        f.insert("PESO BRUTO".into(), "1500,5".into());
        f.insert("NUMERO SM".into(), "999".into());
        f.insert("campo_inexistente".into(), "x".into());
        let id = criar(&mut conn, "ana", Nivel::Comum, &f).unwrap();

        let r = obter(&conn, id).unwrap();
        assert_eq!(r.valor(Campo::Cpf), "01234567890");
        assert_eq!(r.valor(Campo::PesoBruto), "1500.5");
        // Comum não preenche campos da GR
        assert!(!r.tem(Campo::NumeroSm));
        assert_eq!(r.usuario.as_deref(), Some("ana"));
        assert_eq!(contar_historico(&conn, id), 1);

        let logs: i64 = conn
            .query_row("SELECT COUNT(*) FROM logs_unificados WHERE registro_id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(logs, 1);
    }

    #[test]
    fn test_comum_nao_edita_registro_da_gr() {
        let mut conn = conexao();
        usuario(&conn, "gr1", "gr");
        let id = criar(&mut conn, "gr1", Nivel::Gr, &base()).unwrap();
        let err = atualizar(&mut conn, id, &form(&[("CLIENTE", "Outro")]), "ana", Nivel::Comum).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_comum_nao_grava_campos_gr() {
        let mut conn = conexao();
        let id = criar(&mut conn, "ana", Nivel::Comum, &base()).unwrap();
        let alterados = atualizar(
            &mut conn,
            id,
            &form(&[("NUMERO SM", "123"), ("observacao_gr", "x"), ("CLIENTE", "Nova")]),
            "ana",
            Nivel::Comum,
        )
        .unwrap();
        assert_eq!(alterados, vec![Campo::Cliente]);
        assert!(!obter(&conn, id).unwrap().tem(Campo::NumeroSm));
    }

    #[test]
    fn test_gr_carimba_datas_e_calcula_sla() {
        let mut conn = conexao();
        conn.execute(
            "INSERT INTO registros (usuario, data_registro, cliente, placa) VALUES ('ana', '01-01-2024 08:00:00', 'ACME', 'AAA')",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();

        let alterados = atualizar(
            &mut conn,
            id,
            &form(&[("NUMERO SM", "123"), ("DT CRIACAO SM", "2024-01-01 10:30:00"), ("CLIENTE", "ignorado")]),
            "gr1",
            Nivel::Gr,
        )
        .unwrap();
        assert!(alterados.contains(&Campo::SlaSm));
        assert!(!alterados.contains(&Campo::Cliente));

        let r = obter(&conn, id).unwrap();
        assert_eq!(r.valor(Campo::SlaSm), "2.5");
        assert_eq!(r.valor(Campo::Cliente), "ACME");

        atualizar(&mut conn, id, &form(&[("NUMERO AE", "9"), ("DATA AE", "2024-01-01 12:00:00")]), "gr1", Nivel::Gr)
            .unwrap();
        let r = obter(&conn, id).unwrap();
        assert_eq!(r.valor(Campo::SlaAe), "1.5");

        // Evento de GR com os valores novos
        let historico = gravacao::carregar(&conn, id).unwrap();
        assert_eq!(historico.last().unwrap().conteudo.tipo_evento(), Some(&TipoEvento::EdicaoGr));
    }

    #[test]
    fn test_numero_sm_sem_data_usa_agora() {
        let mut conn = conexao();
        let id = criar(&mut conn, "ana", Nivel::Comum, &base()).unwrap();
        atualizar(&mut conn, id, &form(&[("NUMERO SM", "55")]), "gr1", Nivel::Gr).unwrap();
        let r = obter(&conn, id).unwrap();
        assert!(parse_data(r.valor(Campo::DataSm)).is_some());
        assert!(r.tem(Campo::SlaSm));
    }

    #[test]
    fn test_edicao_sem_mudanca_nao_grava() {
        let mut conn = conexao();
        let id = criar(&mut conn, "ana", Nivel::Comum, &base()).unwrap();
        let alterados = atualizar(&mut conn, id, &form(&[("CLIENTE", " ACME ")]), "ana", Nivel::Comum).unwrap();
        assert!(alterados.is_empty());
        assert_eq!(contar_historico(&conn, id), 1);
    }

    #[test]
    fn test_edicao_pos_aprovacao_vai_para_revisao() {
        let mut conn = conexao();
        usuario(&conn, "ana", "comum");
        usuario(&conn, "gr1", "gr");
        let id = criar(&mut conn, "ana", Nivel::Comum, &base()).unwrap();
        atualizar(
            &mut conn,
            id,
            &form(&[("NUMERO SM", "123"), ("DATA SM", "2024-01-01 10:00:00")]),
            "gr1",
            Nivel::Gr,
        )
        .unwrap();
        assert!(ids_com_alteracoes(&conn).unwrap().is_empty());

        atualizar(&mut conn, id, &form(&[("MOTORISTA", "Pedro")]), "ana", Nivel::Comum).unwrap();
        let r = obter(&conn, id).unwrap();
        assert_eq!(r.modificado_por.as_deref(), Some("ana"));
        assert!(!r.alteracoes_verificadas);
        assert_eq!(ids_com_alteracoes(&conn).unwrap(), vec![id]);

        let filtros = FiltrosRegistro { alteracoes_pos_smae: true, ..Default::default() };
        assert_eq!(contar(&conn, &filtros).unwrap(), 1);
    }

    #[test]
    fn test_excluir_regras_e_invisibilidade() {
        let mut conn = conexao();
        let id = criar(&mut conn, "ana", Nivel::Comum, &base()).unwrap();
        assert!(matches!(
            excluir(&mut conn, id, "bruno", Nivel::Comum).unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            excluir(&mut conn, id, "gr1", Nivel::Gr).unwrap_err(),
            AppError::Forbidden(_)
        ));
        excluir(&mut conn, id, "ana", Nivel::Comum).unwrap();

        assert!(matches!(obter(&conn, id).unwrap_err(), AppError::NotFound(_)));
        assert_eq!(contar(&conn, &FiltrosRegistro::default()).unwrap(), 0);
        assert_eq!(contar_busca_global(&conn, "ACME").unwrap(), 0);
        assert!(matches!(
            excluir(&mut conn, id, "admin", Nivel::Admin).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_filtros_dos_cards() {
        let conn = conexao();
        conn.execute_batch(
            "INSERT INTO registros (usuario, cliente, container_1, numero_sm, status_sm) VALUES ('ana', 'A', 'C1', '1', 'Concluído');
             INSERT INTO registros (usuario, cliente, container_1, numero_sm, status_sm) VALUES ('ana', 'B', '', NULL, NULL);
             INSERT INTO registros (usuario, cliente, container_1, numero_sm, status_sm) VALUES ('bia', 'B', NULL, '', 'Pendente');",
        )
        .unwrap();

        let query = |pares: &[(&str, &str)]| {
            let q: HashMap<String, String> = pares.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            contar(&conn, &FiltrosRegistro::from_query(&q)).unwrap()
        };
        assert_eq!(query(&[]), 3);
        assert_eq!(query(&[("sem_container", "1")]), 2);
        assert_eq!(query(&[("sem_sm", "true")]), 2);
        assert_eq!(query(&[("status_sm", "Pendente")]), 2);
        assert_eq!(query(&[("cliente", "B"), ("usuario", "bia")]), 1);
        assert_eq!(query(&[("coluna_estranha", "x"), ("pagina", "2")]), 3);
    }

    #[test]
    fn test_ordenacao_por_horario_previsto() {
        let conn = conexao();
        conn.execute_batch(
            "INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (1, 'passado', '2024-01-03 00:00:00', '2020-01-01 10:00:00');
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (2, 'sem', '2024-01-02 00:00:00', NULL);
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (3, 'longe', '2024-01-01 00:00:00', '2099-06-01 10:00:00');
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (4, 'perto', '2024-01-01 00:00:00', '01/01/2098 10:00:00');",
        )
        .unwrap();
        let ids: Vec<i64> = listar(&conn, &FiltrosRegistro::default(), 1, 10)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);

        let segunda: Vec<i64> = listar(&conn, &FiltrosRegistro::default(), 2, 3)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(segunda, vec![1]);
    }

    #[test]
    fn test_sem_horario_e_passados_mais_recentes_primeiro() {
        let conn = conexao();
        conn.execute_batch(
            "INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (1, 'velho', '2024-01-01 00:00:00', NULL);
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (2, 'novo', '2024-06-01 00:00:00', NULL);
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (3, 'ilegivel', 'ontem', NULL);
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (4, 'passado velho', '2023-01-01 00:00:00', '2020-01-01 10:00:00');
             INSERT INTO registros (id, cliente, data_registro, horario_previsto) VALUES (5, 'passado novo', '2023-09-01 00:00:00', '2019-01-01 10:00:00');",
        )
        .unwrap();
        let ids: Vec<i64> = listar(&conn, &FiltrosRegistro::default(), 1, 10)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![2, 1, 3, 5, 4]);
    }

    #[test]
    fn test_pagina_enorme_retorna_vazio() {
        let conn = conexao();
        conn.execute("INSERT INTO registros (usuario, cliente) VALUES ('ana', 'ACME')", [])
            .unwrap();
        assert!(listar(&conn, &FiltrosRegistro::default(), i64::MAX, 200).unwrap().is_empty());
        assert!(busca_global(&conn, "ACME", 200, i64::MAX).unwrap().is_empty());
        assert_eq!(listar(&conn, &FiltrosRegistro::default(), 1, 200).unwrap().len(), 1);
    }

    #[test]
    fn test_busca_global() {
        let conn = conexao();
        conn.execute_batch(
            "INSERT INTO registros (usuario, placa, data_registro) VALUES ('ana', 'XYZ9A99', '2024-01-01 10:00:00');
             INSERT INTO registros (usuario, motorista, data_registro) VALUES ('bia', 'Xyzabel', '05-01-2024 10:00:00');
             INSERT INTO registros (usuario, cliente, data_registro) VALUES ('caio', 'Outro', '2024-01-02 10:00:00');",
        )
        .unwrap();
        assert!(busca_global(&conn, "   ", 10, 0).unwrap().is_empty());
        assert_eq!(contar_busca_global(&conn, "").unwrap(), 0);

        let achados = busca_global(&conn, "xyz", 10, 0).unwrap();
        assert_eq!(achados.len(), 2);
        assert_eq!(achados[0].usuario.as_deref(), Some("bia"));
        assert_eq!(contar_busca_global(&conn, "xyz").unwrap(), 2);
        assert_eq!(busca_global(&conn, "xyz", 1, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_calcular_sla_horas() {
        assert_eq!(calcular_sla_horas("2024-01-01 08:00:00", "01/01/2024 09:15:00"), Some(1.25));
        assert_eq!(calcular_sla_horas("", "2024-01-01 09:00:00"), None);
    }
}
