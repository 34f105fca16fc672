//! Solicitações de acesso e de redefinição de senha

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::auth::senha::texto_aleatorio;
use crate::models::{
    Nivel, NovaSolicitacaoRegistro, NovoLog, NovoUsuario, SolicitacaoRegistro, SolicitacaoSenha,
    StatusSolicitacao,
};
use crate::services::auditoria::registrar_log;
use crate::services::usuarios;
use crate::utils::datas::agora_texto;
use crate::utils::{AppError, AppResult};

const TAMANHO_SENHA_TEMPORARIA: usize = 10;

/// Senha gerada na aprovação. Só é devolvida uma vez, para o admin repassar.
#[derive(Debug, Clone, Serialize)]
pub struct SenhaTemporaria {
    pub username: String,
    pub senha_temporaria: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PainelSolicitacoes {
    pub registro_pendentes: Vec<SolicitacaoRegistro>,
    pub registro_processadas: Vec<SolicitacaoRegistro>,
    pub senha_pendentes: Vec<SolicitacaoSenha>,
    pub senha_processadas: Vec<SolicitacaoSenha>,
    pub total_pendentes: usize,
}

fn pendente() -> &'static str {
    StatusSolicitacao::Pendente.as_str()
}

pub fn solicitar_registro(conn: &Connection, nova: &NovaSolicitacaoRegistro) -> AppResult<i64> {
    let campos = [
        ("nome", &nova.nome),
        ("username", &nova.username),
        ("email", &nova.email),
        ("setor", &nova.setor),
        ("justificativa", &nova.justificativa),
    ];
    let faltando: Vec<&str> = campos
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(nome, _)| *nome)
        .collect();
    if !faltando.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Preencha todos os campos: {}",
            faltando.join(", ")
        )));
    }

    let username = nova.username.trim();
    if usuarios::obter_por_username(conn, username)?.is_some() {
        return Err(AppError::Conflict(format!("Usuário '{}' já existe", username)));
    }
    let ja_pendente: Option<i64> = conn
        .query_row(
            "SELECT id FROM solicitacoes_registro WHERE username = ?1 AND status = ?2",
            params![username, pendente()],
            |r| r.get(0),
        )
        .optional()?;
    if ja_pendente.is_some() {
        return Err(AppError::Conflict(format!(
            "Já existe uma solicitação pendente para '{}'",
            username
        )));
    }

    conn.execute(
        "INSERT INTO solicitacoes_registro (nome, username, email, setor, justificativa, status, data_solicitacao) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            nova.nome.trim(),
            username,
            nova.email.trim(),
            nova.setor.trim(),
            nova.justificativa.trim(),
            pendente(),
            agora_texto()
        ],
    )?;
    tracing::info!("📨 Solicitação de acesso recebida para {}", username);
    Ok(conn.last_insert_rowid())
}

fn solicitacao_registro(conn: &Connection, id: i64) -> AppResult<SolicitacaoRegistro> {
    conn.query_row(
        &format!("SELECT {} FROM solicitacoes_registro WHERE id = ?1", SolicitacaoRegistro::COLUNAS),
        [id],
        SolicitacaoRegistro::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Solicitação {} não encontrada", id)))
}

fn solicitacao_senha(conn: &Connection, id: i64) -> AppResult<SolicitacaoSenha> {
    conn.query_row(
        &format!("SELECT {} FROM solicitacoes_senha WHERE id = ?1", SolicitacaoSenha::COLUNAS),
        [id],
        SolicitacaoSenha::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Solicitação {} não encontrada", id)))
}

fn exigir_pendente(status: StatusSolicitacao, id: i64) -> AppResult<()> {
    if status != StatusSolicitacao::Pendente {
        return Err(AppError::Conflict(format!(
            "Solicitação {} já foi processada ({})",
            id,
            status.as_str()
        )));
    }
    Ok(())
}

fn processar(
    conn: &Connection,
    tabela: &str,
    id: i64,
    status: StatusSolicitacao,
    admin: &str,
    observacao: &str,
) -> AppResult<()> {
    conn.execute(
        &format!(
            "UPDATE {} SET status = ?1, data_processamento = ?2, processado_por = ?3, observacao = ?4 WHERE id = ?5",
            tabela
        ),
        params![status.as_str(), agora_texto(), admin, observacao, id],
    )?;
    Ok(())
}

/// Cria a conta pedida com uma senha temporária
pub fn aprovar_registro(
    conn: &mut Connection,
    id: i64,
    nivel: Nivel,
    admin: &str,
    iteracoes: u32,
) -> AppResult<SenhaTemporaria> {
    let tx = conn.transaction()?;
    let solicitacao = solicitacao_registro(&tx, id)?;
    exigir_pendente(solicitacao.status, id)?;

    let senha = texto_aleatorio(TAMANHO_SENHA_TEMPORARIA);
    let novo = NovoUsuario {
        username: solicitacao.username.clone(),
        password: senha.clone(),
        nivel,
        email: Some(solicitacao.email.clone()),
    };
    usuarios::criar(&tx, &novo, iteracoes)?;
    processar(
        &tx,
        "solicitacoes_registro",
        id,
        StatusSolicitacao::Aprovada,
        admin,
        &format!("Aprovado com nível: {}", nivel),
    )?;
    registrar_log(
        &tx,
        &NovoLog::new(admin, "aprovação de acesso")
            .nivel("admin")
            .descricao(format!("Solicitação {} aprovada para {} ({})", id, solicitacao.username, nivel))
            .origem("solicitacoes"),
    )?;
    tx.commit()?;

    tracing::info!("✅ Acesso aprovado para {} por {}", solicitacao.username, admin);
    Ok(SenhaTemporaria { username: solicitacao.username, senha_temporaria: senha })
}

pub fn rejeitar_registro(conn: &mut Connection, id: i64, motivo: Option<&str>, admin: &str) -> AppResult<()> {
    let motivo = motivo.filter(|m| !m.trim().is_empty()).unwrap_or("Não especificado");
    let tx = conn.transaction()?;
    let solicitacao = solicitacao_registro(&tx, id)?;
    exigir_pendente(solicitacao.status, id)?;

    processar(
        &tx,
        "solicitacoes_registro",
        id,
        StatusSolicitacao::Rejeitada,
        admin,
        &format!("Motivo: {}", motivo),
    )?;
    registrar_log(
        &tx,
        &NovoLog::new(admin, "rejeição de acesso")
            .nivel("admin")
            .descricao(format!("Solicitação {} de {} rejeitada: {}", id, solicitacao.username, motivo))
            .origem("solicitacoes"),
    )?;
    tx.commit()?;
    Ok(())
}

pub fn solicitar_senha(conn: &Connection, username: &str) -> AppResult<i64> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::ValidationError("Informe o usuário".into()));
    }
    if usuarios::obter_por_username(conn, username)?.is_none() {
        return Err(AppError::NotFound(format!("Usuário '{}' não encontrado", username)));
    }
    let ja_pendente: Option<i64> = conn
        .query_row(
            "SELECT id FROM solicitacoes_senha WHERE username = ?1 AND status = ?2",
            params![username, pendente()],
            |r| r.get(0),
        )
        .optional()?;
    if ja_pendente.is_some() {
        return Err(AppError::Conflict(
            "Já existe uma solicitação de senha pendente para este usuário".into(),
        ));
    }

    conn.execute(
        "INSERT INTO solicitacoes_senha (username, status, data_solicitacao) VALUES (?1, ?2, ?3)",
        params![username, pendente(), agora_texto()],
    )?;
    tracing::info!("🔑 Solicitação de nova senha para {}", username);
    Ok(conn.last_insert_rowid())
}

/// Gera uma senha temporária para o usuário da solicitação
pub fn aprovar_senha(conn: &mut Connection, id: i64, admin: &str, iteracoes: u32) -> AppResult<SenhaTemporaria> {
    let tx = conn.transaction()?;
    let solicitacao = solicitacao_senha(&tx, id)?;
    exigir_pendente(solicitacao.status, id)?;

    let usuario = usuarios::obter_por_username(&tx, &solicitacao.username)?.ok_or_else(|| {
        AppError::NotFound(format!("Usuário '{}' não existe mais", solicitacao.username))
    })?;
    let senha = texto_aleatorio(TAMANHO_SENHA_TEMPORARIA);
    usuarios::alterar_senha(&tx, usuario.id, &senha, iteracoes, true)?;
    processar(
        &tx,
        "solicitacoes_senha",
        id,
        StatusSolicitacao::Aprovada,
        admin,
        "Senha temporária gerada",
    )?;
    registrar_log(
        &tx,
        &NovoLog::new(admin, "redefinição de senha")
            .nivel("admin")
            .descricao(format!("Senha temporária gerada para {}", usuario.username))
            .origem("solicitacoes"),
    )?;
    tx.commit()?;

    Ok(SenhaTemporaria { username: usuario.username, senha_temporaria: senha })
}

pub fn rejeitar_senha(conn: &mut Connection, id: i64, motivo: Option<&str>, admin: &str) -> AppResult<()> {
    let motivo = motivo.filter(|m| !m.trim().is_empty()).unwrap_or("Não especificado");
    let tx = conn.transaction()?;
    let solicitacao = solicitacao_senha(&tx, id)?;
    exigir_pendente(solicitacao.status, id)?;

    processar(
        &tx,
        "solicitacoes_senha",
        id,
        StatusSolicitacao::Rejeitada,
        admin,
        &format!("Motivo: {}", motivo),
    )?;
    registrar_log(
        &tx,
        &NovoLog::new(admin, "rejeição de senha")
            .nivel("admin")
            .descricao(format!("Pedido de senha de {} rejeitado: {}", solicitacao.username, motivo))
            .origem("solicitacoes"),
    )?;
    tx.commit()?;
    Ok(())
}

fn listar_registro(conn: &Connection, pendentes: bool) -> AppResult<Vec<SolicitacaoRegistro>> {
    let operador = if pendentes { "=" } else { "<>" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM solicitacoes_registro WHERE status {} ?1 ORDER BY data_solicitacao DESC, id DESC",
        SolicitacaoRegistro::COLUNAS,
        operador
    ))?;
    let lista = stmt
        .query_map([pendente()], SolicitacaoRegistro::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lista)
}

fn listar_senha(conn: &Connection, pendentes: bool) -> AppResult<Vec<SolicitacaoSenha>> {
    let operador = if pendentes { "=" } else { "<>" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM solicitacoes_senha WHERE status {} ?1 ORDER BY data_solicitacao DESC, id DESC",
        SolicitacaoSenha::COLUNAS,
        operador
    ))?;
    let lista = stmt
        .query_map([pendente()], SolicitacaoSenha::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lista)
}

pub fn painel(conn: &Connection) -> AppResult<PainelSolicitacoes> {
    let registro_pendentes = listar_registro(conn, true)?;
    let senha_pendentes = listar_senha(conn, true)?;
    Ok(PainelSolicitacoes {
        total_pendentes: registro_pendentes.len() + senha_pendentes.len(),
        registro_pendentes,
        registro_processadas: listar_registro(conn, false)?,
        senha_pendentes,
        senha_processadas: listar_senha(conn, false)?,
    })
}

pub fn contar_pendentes(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM solicitacoes_registro WHERE status = ?1) + \
                (SELECT COUNT(*) FROM solicitacoes_senha WHERE status = ?1)",
        [pendente()],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;

    const ITER: u32 = 1000;

    fn pedido(username: &str) -> NovaSolicitacaoRegistro {
        NovaSolicitacaoRegistro {
            nome: "Ana Souza".into(),
            username: username.into(),
            email: "ana@empresa.com".into(),
            setor: "Operações".into(),
            justificativa: "Acompanhar embarques".into(),
        }
    }

    #[test]
    fn test_fluxo_de_aprovacao_de_acesso() {
        let mut conn = conexao();
        let id = solicitar_registro(&conn, &pedido("ana")).unwrap();
        assert!(matches!(
            solicitar_registro(&conn, &pedido("ana")).unwrap_err(),
            AppError::Conflict(_)
        ));
        assert_eq!(contar_pendentes(&conn).unwrap(), 1);

        let senha = aprovar_registro(&mut conn, id, Nivel::Gr, "admin", ITER).unwrap();
        assert_eq!(senha.senha_temporaria.len(), 10);
        let usuario = usuarios::verificar(&conn, "ana", &senha.senha_temporaria).unwrap().unwrap();
        assert_eq!(usuario.nivel, Nivel::Gr);
        assert!(usuario.deve_trocar_senha());

        // Já processada
        assert!(matches!(
            rejeitar_registro(&mut conn, id, None, "admin").unwrap_err(),
            AppError::Conflict(_)
        ));
        // Usuário agora existe
        assert!(matches!(
            solicitar_registro(&conn, &pedido("ana")).unwrap_err(),
            AppError::Conflict(_)
        ));

        let p = painel(&conn).unwrap();
        assert_eq!(p.total_pendentes, 0);
        assert_eq!(p.registro_processadas[0].status, StatusSolicitacao::Aprovada);
    }

    #[test]
    fn test_campos_obrigatorios() {
        let conn = conexao();
        let mut p = pedido("bia");
        p.setor = "  ".into();
        assert!(matches!(
            solicitar_registro(&conn, &p).unwrap_err(),
            AppError::ValidationError(m) if m.contains("setor")
        ));
    }

    #[test]
    fn test_rejeicao_guarda_motivo() {
        let mut conn = conexao();
        let id = solicitar_registro(&conn, &pedido("caio")).unwrap();
        rejeitar_registro(&mut conn, id, Some("Sem vínculo"), "admin").unwrap();
        let s = solicitacao_registro(&conn, id).unwrap();
        assert_eq!(s.status, StatusSolicitacao::Rejeitada);
        assert_eq!(s.observacao.as_deref(), Some("Motivo: Sem vínculo"));
        assert_eq!(s.processado_por.as_deref(), Some("admin"));
    }

    #[test]
    fn test_fluxo_de_senha() {
        let mut conn = conexao();
        assert!(matches!(solicitar_senha(&conn, "dani").unwrap_err(), AppError::NotFound(_)));

        let novo = NovoUsuario {
            username: "dani".into(),
            password: "antiga-senha".into(),
            nivel: Nivel::Comum,
            email: None,
        };
        let user_id = usuarios::criar(&conn, &novo, ITER).unwrap();
        usuarios::alterar_senha(&conn, user_id, "antiga-senha", ITER, false).unwrap();

        let id = solicitar_senha(&conn, "dani").unwrap();
        assert!(matches!(solicitar_senha(&conn, "dani").unwrap_err(), AppError::Conflict(_)));

        let senha = aprovar_senha(&mut conn, id, "admin", ITER).unwrap();
        assert!(usuarios::verificar(&conn, "dani", "antiga-senha").unwrap().is_none());
        let u = usuarios::verificar(&conn, "dani", &senha.senha_temporaria).unwrap().unwrap();
        assert!(u.senha_temporaria);

        let id2 = solicitar_senha(&conn, "dani").unwrap();
        rejeitar_senha(&mut conn, id2, None, "admin").unwrap();
        assert_eq!(
            solicitacao_senha(&conn, id2).unwrap().observacao.as_deref(),
            Some("Motivo: Não especificado")
        );
        assert!(matches!(
            aprovar_senha(&mut conn, 999, "admin", ITER).unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
