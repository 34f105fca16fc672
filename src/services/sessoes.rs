//! Sessões ativas (tabela `sessoes_ativas`)
//!
//! Cada login gera um id aleatório guardado no cookie. A sessão fica presa
//! ao dispositivo (`User-Agent|ip`) e expira por inatividade. O perfil vem
//! sempre do cadastro atual do usuário, não do momento do login.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::models::Nivel;
use crate::utils::datas::agora_texto;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessaoAtiva {
    pub session_id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub device_id: String,
    pub nivel: Nivel,
    pub last_activity: i64,
    pub created_at: String,
}

impl SessaoAtiva {
    /// Perfil lido de `usuarios`; `u.id` nulo indica usuário removido
    const COLUNAS: &'static str =
        "s.session_id, s.username, s.device_id, u.nivel, s.last_activity, s.created_at, u.id";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let nivel: String = row.get::<_, Option<String>>(3)?.unwrap_or_default();
        Ok(Self {
            session_id: row.get(0)?,
            username: row.get(1)?,
            device_id: row.get(2)?,
            nivel: Nivel::from_db(&nivel),
            last_activity: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// Identificador do dispositivo a partir do navegador e do IP
pub fn device_id(user_agent: &str, ip: &str) -> String {
    format!("{}|{}", user_agent, ip)
}

fn agora_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn criar(conn: &Connection, username: &str, nivel: Nivel, device_id: &str) -> AppResult<String> {
    let session_id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sessoes_ativas (session_id, username, device_id, nivel, last_activity, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![session_id, username, device_id, nivel.as_str(), agora_unix(), agora_texto()],
    )?;
    tracing::info!("🔐 Nova sessão para {}", username);
    Ok(session_id)
}

pub fn validar(conn: &Connection, session_id: &str, device_id: &str, timeout_seconds: i64) -> AppResult<SessaoAtiva> {
    validar_em(conn, session_id, device_id, timeout_seconds, agora_unix())
}

/// Valida a sessão no instante `agora` e renova a última atividade
pub fn validar_em(
    conn: &Connection,
    session_id: &str,
    device_id: &str,
    timeout_seconds: i64,
    agora: i64,
) -> AppResult<SessaoAtiva> {
    let (sessao, usuario_id) = conn
        .query_row(
            &format!(
                "SELECT {} FROM sessoes_ativas s LEFT JOIN usuarios u ON u.username = s.username \
                 WHERE s.session_id = ?1",
                SessaoAtiva::COLUNAS
            ),
            [session_id],
            |row| Ok((SessaoAtiva::from_row(row)?, row.get::<_, Option<i64>>(6)?)),
        )
        .optional()?
        .ok_or_else(|| AppError::Unauthorized("Sessão inválida".into()))?;

    if usuario_id.is_none() {
        remover(conn, session_id)?;
        tracing::warn!("⚠️ Sessão de {} sem usuário cadastrado", sessao.username);
        return Err(AppError::Unauthorized("Usuário da sessão não existe mais".into()));
    }

    if sessao.device_id != device_id {
        tracing::warn!("⚠️ Sessão de {} usada em outro dispositivo", sessao.username);
        return Err(AppError::Unauthorized("Sessão iniciada em outro dispositivo".into()));
    }

    if agora - sessao.last_activity > timeout_seconds {
        remover(conn, session_id)?;
        tracing::info!("⌛ Sessão de {} expirada por inatividade", sessao.username);
        return Err(AppError::Unauthorized("Sessão expirada".into()));
    }

    conn.execute(
        "UPDATE sessoes_ativas SET last_activity = ?1 WHERE session_id = ?2",
        params![agora, session_id],
    )?;
    Ok(SessaoAtiva { last_activity: agora, ..sessao })
}

pub fn remover(conn: &Connection, session_id: &str) -> AppResult<bool> {
    Ok(conn.execute("DELETE FROM sessoes_ativas WHERE session_id = ?1", [session_id])? > 0)
}

/// Encerra todas as sessões do usuário (troca de perfil, senha redefinida, exclusão)
pub fn encerrar_do_usuario(conn: &Connection, username: &str) -> AppResult<usize> {
    let removidas = conn.execute("DELETE FROM sessoes_ativas WHERE username = ?1", [username])?;
    if removidas > 0 {
        tracing::info!("🔒 {} sessão(ões) de {} encerrada(s)", removidas, username);
    }
    Ok(removidas)
}

pub fn limpar_inativas(conn: &Connection, timeout_seconds: i64) -> AppResult<usize> {
    limpar_inativas_em(conn, timeout_seconds, agora_unix())
}

pub fn limpar_inativas_em(conn: &Connection, timeout_seconds: i64, agora: i64) -> AppResult<usize> {
    Ok(conn.execute(
        "DELETE FROM sessoes_ativas WHERE last_activity < ?1",
        [agora - timeout_seconds],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testes::conexao;

    const DISPOSITIVO: &str = "Mozilla/5.0|10.0.0.1";

    fn conexao_com_usuarios() -> Connection {
        let conn = conexao();
        conn.execute_batch(
            "INSERT INTO usuarios (username, password_hash, nivel) VALUES ('ana', 'x', 'comum');
             INSERT INTO usuarios (username, password_hash, nivel) VALUES ('bia', 'x', 'comum');
             INSERT INTO usuarios (username, password_hash, nivel) VALUES ('gil', 'x', 'gr');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_sessao_valida_renova_atividade() {
        let conn = conexao_com_usuarios();
        let id = criar(&conn, "ana", Nivel::Comum, DISPOSITIVO).unwrap();
        let agora = agora_unix();

        let sessao = validar_em(&conn, &id, DISPOSITIVO, 300, agora + 200).unwrap();
        assert_eq!(sessao.username, "ana");
        assert_eq!(sessao.nivel, Nivel::Comum);

        // 200s depois da renovação ainda vale
        assert!(validar_em(&conn, &id, DISPOSITIVO, 300, agora + 400).is_ok());
    }

    #[test]
    fn test_outro_dispositivo_recusado() {
        let conn = conexao_com_usuarios();
        let id = criar(&conn, "ana", Nivel::Comum, DISPOSITIVO).unwrap();
        let err = validar(&conn, &id, &device_id("curl/8.0", "10.0.0.2"), 300).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        // A sessão continua existindo para o dispositivo original
        assert!(validar(&conn, &id, DISPOSITIVO, 300).is_ok());
    }

    #[test]
    fn test_sessao_expirada_e_removida() {
        let conn = conexao_com_usuarios();
        let id = criar(&conn, "gil", Nivel::Gr, DISPOSITIVO).unwrap();
        let err = validar_em(&conn, &id, DISPOSITIVO, 300, agora_unix() + 301).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(m) if m.contains("expirada")));
        assert!(matches!(
            validar(&conn, &id, DISPOSITIVO, 300).unwrap_err(),
            AppError::Unauthorized(m) if m.contains("inválida")
        ));
    }

    #[test]
    fn test_logout_e_limpeza() {
        let conn = conexao_com_usuarios();
        let a = criar(&conn, "ana", Nivel::Comum, DISPOSITIVO).unwrap();
        criar(&conn, "bia", Nivel::Comum, DISPOSITIVO).unwrap();
        assert!(remover(&conn, &a).unwrap());
        assert!(!remover(&conn, &a).unwrap());

        assert_eq!(limpar_inativas_em(&conn, 300, agora_unix()).unwrap(), 0);
        assert_eq!(limpar_inativas_em(&conn, 300, agora_unix() + 1000).unwrap(), 1);
    }

    #[test]
    fn test_perfil_vem_do_cadastro_atual() {
        let conn = conexao_com_usuarios();
        let id = criar(&conn, "gil", Nivel::Gr, DISPOSITIVO).unwrap();
        conn.execute("UPDATE usuarios SET nivel = 'comum' WHERE username = 'gil'", [])
            .unwrap();
        assert_eq!(validar(&conn, &id, DISPOSITIVO, 300).unwrap().nivel, Nivel::Comum);
    }

    #[test]
    fn test_usuario_removido_derruba_sessao() {
        let conn = conexao_com_usuarios();
        let id = criar(&conn, "bia", Nivel::Comum, DISPOSITIVO).unwrap();
        conn.execute("DELETE FROM usuarios WHERE username = 'bia'", []).unwrap();
        assert!(matches!(
            validar(&conn, &id, DISPOSITIVO, 300).unwrap_err(),
            AppError::Unauthorized(_)
        ));
        let restantes: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessoes_ativas", [], |r| r.get(0))
            .unwrap();
        assert_eq!(restantes, 0);
    }

    #[test]
    fn test_encerrar_do_usuario() {
        let conn = conexao_com_usuarios();
        let a = criar(&conn, "ana", Nivel::Comum, DISPOSITIVO).unwrap();
        criar(&conn, "ana", Nivel::Comum, "curl/8.0|10.0.0.2").unwrap();
        let b = criar(&conn, "bia", Nivel::Comum, DISPOSITIVO).unwrap();
        assert_eq!(encerrar_do_usuario(&conn, "ana").unwrap(), 2);
        assert!(validar(&conn, &a, DISPOSITIVO, 300).is_err());
        assert!(validar(&conn, &b, DISPOSITIVO, 300).is_ok());
    }
}
