//! Cadastro de usuários e senhas

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::auth::senha::{gerar_hash, texto_aleatorio, verificar_hash};
use crate::models::{Nivel, NovoUsuario, Usuario};
use crate::services::sessoes;
use crate::utils::datas::agora_texto;
use crate::utils::{AppError, AppResult};

pub const TAMANHO_MINIMO_SENHA: usize = 8;

fn violacao_unique(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

pub fn criar(conn: &Connection, novo: &NovoUsuario, iteracoes: u32) -> AppResult<i64> {
    let username = novo.username.trim();
    if username.is_empty() || novo.password.is_empty() {
        return Err(AppError::ValidationError("Usuário e senha são obrigatórios".into()));
    }

    let hash = gerar_hash(&novo.password, iteracoes)?;
    let resultado = conn.execute(
        "INSERT INTO usuarios (username, password_hash, nivel, email, created_at, primeiro_login, senha_temporaria) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, 1)",
        params![username, hash, novo.nivel.as_str(), novo.email, agora_texto()],
    );
    match resultado {
        Ok(_) => {
            tracing::info!("👤 Usuário {} criado ({})", username, novo.nivel);
            Ok(conn.last_insert_rowid())
        }
        Err(e) if violacao_unique(&e) => {
            Err(AppError::Conflict(format!("Usuário '{}' já existe", username)))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn obter_por_username(conn: &Connection, username: &str) -> AppResult<Option<Usuario>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM usuarios WHERE username = ?1", Usuario::COLUNAS),
            [username.trim()],
            Usuario::from_row,
        )
        .optional()?)
}

pub fn obter_por_id(conn: &Connection, id: i64) -> AppResult<Usuario> {
    conn.query_row(
        &format!("SELECT {} FROM usuarios WHERE id = ?1", Usuario::COLUNAS),
        [id],
        Usuario::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Usuário {} não encontrado", id)))
}

/// Admins primeiro, depois GR e comuns, cada grupo por nome
pub fn listar(conn: &Connection) -> AppResult<Vec<Usuario>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM usuarios ORDER BY \
         CASE LOWER(nivel) WHEN 'admin' THEN 0 WHEN 'gr' THEN 1 ELSE 2 END, username",
        Usuario::COLUNAS
    ))?;
    let usuarios = stmt
        .query_map([], Usuario::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(usuarios)
}

pub fn atualizar(
    conn: &Connection,
    id: i64,
    nivel: Option<Nivel>,
    email: Option<String>,
) -> AppResult<Usuario> {
    let atual = obter_por_id(conn, id)?;
    let nivel = nivel.unwrap_or(atual.nivel);
    let email = email.or(atual.email);
    conn.execute(
        "UPDATE usuarios SET nivel = ?1, email = ?2 WHERE id = ?3",
        params![nivel.as_str(), email, id],
    )?;
    if nivel != atual.nivel {
        sessoes::encerrar_do_usuario(conn, &atual.username)?;
    }
    obter_por_id(conn, id)
}

/// Define uma nova senha. Senhas temporárias obrigam a troca no próximo login
/// e derrubam as sessões abertas do usuário.
pub fn alterar_senha(
    conn: &Connection,
    id: i64,
    nova: &str,
    iteracoes: u32,
    temporaria: bool,
) -> AppResult<()> {
    if nova.is_empty() {
        return Err(AppError::ValidationError("A senha não pode ser vazia".into()));
    }
    let hash = gerar_hash(nova, iteracoes)?;
    let alterados = conn.execute(
        "UPDATE usuarios SET password_hash = ?1, senha_temporaria = ?2, primeiro_login = ?2 WHERE id = ?3",
        params![hash, temporaria as i64, id],
    )?;
    if alterados == 0 {
        return Err(AppError::NotFound(format!("Usuário {} não encontrado", id)));
    }
    if temporaria {
        let username = obter_por_id(conn, id)?.username;
        sessoes::encerrar_do_usuario(conn, &username)?;
    }
    Ok(())
}

pub fn trocar_senha_primeiro_login(
    conn: &Connection,
    username: &str,
    nova: &str,
    confirmacao: &str,
    iteracoes: u32,
) -> AppResult<()> {
    if nova != confirmacao {
        return Err(AppError::ValidationError("As senhas não coincidem".into()));
    }
    if nova.chars().count() < TAMANHO_MINIMO_SENHA {
        return Err(AppError::ValidationError(format!(
            "A senha deve ter pelo menos {} caracteres",
            TAMANHO_MINIMO_SENHA
        )));
    }
    let usuario = obter_por_username(conn, username)?
        .ok_or_else(|| AppError::NotFound(format!("Usuário '{}' não encontrado", username)))?;
    alterar_senha(conn, usuario.id, nova, iteracoes, false)
}

/// Usuário quando a senha confere; `None` para usuário inexistente ou senha errada
pub fn verificar(conn: &Connection, username: &str, senha: &str) -> AppResult<Option<Usuario>> {
    Ok(obter_por_username(conn, username)?.filter(|u| verificar_hash(&u.password_hash, senha)))
}

pub fn atualizar_ultimo_login(conn: &Connection, username: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE usuarios SET last_login = ?1 WHERE username = ?2",
        params![agora_texto(), username],
    )?;
    Ok(())
}

/// Remove o usuário e as sessões dele. Ninguém exclui a própria conta.
pub fn excluir(conn: &mut Connection, id: i64, solicitante: &str) -> AppResult<Usuario> {
    let usuario = obter_por_id(conn, id)?;
    if usuario.username == solicitante {
        return Err(AppError::Conflict("Não é possível excluir o próprio usuário".into()));
    }
    let tx = conn.transaction()?;
    sessoes::encerrar_do_usuario(&tx, &usuario.username)?;
    tx.execute("DELETE FROM usuarios WHERE id = ?1", [id])?;
    tx.commit()?;
    tracing::info!("👤 Usuário {} excluído por {}", usuario.username, solicitante);
    Ok(usuario)
}

/// Cria os usuários de teste que ainda não existem, com senhas aleatórias.
/// Só roda com `auth.seed_test_users` ligado.
pub fn semear_usuarios_teste(conn: &Connection, iteracoes: u32) -> AppResult<Vec<(String, String)>> {
    let mut criados = Vec::new();
    for (username, nivel) in [
        ("teste_admin", Nivel::Admin),
        ("teste_gr", Nivel::Gr),
        ("teste_comum", Nivel::Comum),
    ] {
        if obter_por_username(conn, username)?.is_some() {
            continue;
        }
        let senha = texto_aleatorio(12);
        let novo = NovoUsuario {
            username: username.to_string(),
            password: senha.clone(),
            nivel,
            email: None,
        };
        criar(conn, &novo, iteracoes)?;
        tracing::warn!("⚠️ Usuário de teste '{}' criado com senha temporária {}", username, senha);
        criados.push((username.to_string(), senha));
    }
    Ok(criados)
}
