//! Acesso ao SQLite
//!
//! Cada operação abre uma conexão curta numa thread de bloqueio. O
//! `busy_timeout` da conexão cuida de esperas por lock do arquivo.

pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::AppResult;

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, busy_timeout_ms: u64) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn abrir(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// Cria/migra as tabelas. Chamado uma vez no startup.
    pub fn inicializar(&self) -> AppResult<()> {
        let conn = self.abrir()?;
        // WAL permite leituras enquanto outra conexão grava
        let _modo: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        schema::inicializar(&conn)?;
        Ok(())
    }

    /// Executa `f` com uma conexão própria, fora do runtime assíncrono.
    pub async fn call<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.abrir()?;
            f(&mut conn)
        })
        .await?
    }
}

#[cfg(test)]
pub(crate) mod testes {
    use rusqlite::Connection;

    /// Banco em memória com o schema completo
    pub fn conexao() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        super::schema::inicializar(&conn).unwrap();
        conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_em_arquivo() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("teste.db"), 1000);
        db.inicializar().unwrap();

        let total: i64 = db
            .call(|conn| {
                conn.execute(
                    "INSERT INTO usuarios (username, password_hash, nivel) VALUES ('a', 'x', 'comum')",
                    [],
                )?;
                Ok(conn.query_row("SELECT COUNT(*) FROM usuarios", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
    }
}
