use serde::{Deserialize, Serialize};

use super::nivel::Nivel;

/// Usuário do sistema. O hash da senha nunca é serializado.
#[derive(Debug, Clone, Serialize)]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nivel: Nivel,
    pub email: Option<String>,
    pub last_login: Option<String>,
    pub created_at: Option<String>,
    pub primeiro_login: bool,
    pub senha_temporaria: bool,
}

impl Usuario {
    pub const COLUNAS: &'static str =
        "id, username, password_hash, nivel, email, last_login, created_at, primeiro_login, senha_temporaria";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let nivel: Option<String> = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            nivel: Nivel::from_db(nivel.as_deref().unwrap_or("comum")),
            email: row.get(4)?,
            last_login: row.get(5)?,
            created_at: row.get(6)?,
            primeiro_login: row.get::<_, Option<i64>>(7)?.unwrap_or(0) != 0,
            senha_temporaria: row.get::<_, Option<i64>>(8)?.unwrap_or(0) != 0,
        })
    }

    /// Precisa trocar a senha antes de usar o sistema
    pub fn deve_trocar_senha(&self) -> bool {
        self.primeiro_login || self.senha_temporaria
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NovoUsuario {
    pub username: String,
    pub password: String,
    pub nivel: Nivel,
    pub email: Option<String>,
}
