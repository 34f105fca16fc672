use rusqlite::Connection;
use std::collections::HashSet;

use crate::models::Campo;
use crate::utils::logging::log_info;
use crate::utils::AppResult;

const TABELAS: &str = r#"
CREATE TABLE IF NOT EXISTS usuarios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    nivel TEXT NOT NULL DEFAULT 'comum',
    email TEXT,
    last_login TEXT,
    created_at TEXT,
    primeiro_login INTEGER DEFAULT 0,
    senha_temporaria INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS historico (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    registro_id INTEGER NOT NULL,
    alterado_por TEXT,
    alteracoes TEXT,
    data_alteracao TEXT
);
CREATE INDEX IF NOT EXISTS idx_historico_registro ON historico (registro_id);

CREATE TABLE IF NOT EXISTS solicitacoes_senha (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pendente',
    data_solicitacao TEXT NOT NULL,
    processado_por TEXT,
    data_processamento TEXT,
    observacao TEXT
);

CREATE TABLE IF NOT EXISTS solicitacoes_registro (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nome TEXT NOT NULL,
    username TEXT NOT NULL,
    email TEXT NOT NULL,
    setor TEXT NOT NULL,
    justificativa TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pendente',
    data_solicitacao TEXT NOT NULL,
    processado_por TEXT,
    data_processamento TEXT,
    observacao TEXT
);

CREATE TABLE IF NOT EXISTS logs_unificados (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    data_hora TEXT NOT NULL,
    usuario TEXT NOT NULL,
    nivel TEXT,
    acao TEXT NOT NULL,
    descricao TEXT,
    detalhes TEXT,
    registro_id INTEGER,
    ip TEXT,
    origem TEXT,
    objeto_tipo TEXT,
    valor_anterior TEXT,
    valor_novo TEXT
);
CREATE INDEX IF NOT EXISTS idx_logs_data ON logs_unificados (data_hora);

CREATE TABLE IF NOT EXISTS sessoes_ativas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT UNIQUE NOT NULL,
    username TEXT NOT NULL,
    device_id TEXT NOT NULL,
    nivel TEXT NOT NULL,
    last_activity INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessoes_username ON sessoes_ativas (username);
"#;

/// Colunas de controle de `registros` além do catálogo de campos
const CONTROLE_REGISTROS: &[(&str, &str)] = &[
    ("usuario", "TEXT"),
    ("data_registro", "TEXT"),
    ("data_modificacao", "TEXT"),
    ("modificado_por", "TEXT"),
    ("alteracoes_verificadas", "INTEGER DEFAULT 0"),
    ("excluido", "INTEGER DEFAULT 0"),
    ("data_exclusao", "TEXT"),
    ("excluido_por", "TEXT"),
];

const COLUNAS_USUARIOS: &[(&str, &str)] = &[
    ("email", "TEXT"),
    ("last_login", "TEXT"),
    ("created_at", "TEXT"),
    ("primeiro_login", "INTEGER DEFAULT 0"),
    ("senha_temporaria", "INTEGER DEFAULT 0"),
];

fn ddl_registros() -> String {
    let colunas: Vec<String> = CONTROLE_REGISTROS
        .iter()
        .map(|(nome, tipo)| format!("    {} {}", nome, tipo))
        .chain(
            Campo::TODOS
                .iter()
                .map(|c| format!("    {} {}", c.db(), c.tipo().tipo_sql())),
        )
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS registros (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n{}\n)",
        colunas.join(",\n")
    )
}

fn colunas_existentes(conn: &Connection, tabela: &str) -> AppResult<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", tabela))?;
    let nomes = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(nomes)
}

fn adicionar_faltantes<'a>(
    conn: &Connection,
    tabela: &str,
    colunas: impl Iterator<Item = (&'a str, &'a str)>,
) -> AppResult<usize> {
    let existentes = colunas_existentes(conn, tabela)?;
    let mut adicionadas = 0;
    for (nome, tipo) in colunas {
        if !existentes.contains(nome) {
            conn.execute(&format!("ALTER TABLE {} ADD COLUMN {} {}", tabela, nome, tipo), [])?;
            adicionadas += 1;
        }
    }
    Ok(adicionadas)
}

/// Cria as tabelas e acrescenta colunas que bases antigas não têm.
pub fn inicializar(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(TABELAS)?;
    conn.execute_batch(&ddl_registros())?;

    let adicionadas = adicionar_faltantes(
        conn,
        "registros",
        CONTROLE_REGISTROS
            .iter()
            .copied()
            .chain(Campo::TODOS.iter().map(|c| (c.db(), c.tipo().tipo_sql()))),
    )? + adicionar_faltantes(conn, "usuarios", COLUNAS_USUARIOS.iter().copied())?;

    if adicionadas > 0 {
        log_info(&format!("🔧 Migração: {} colunas adicionadas", adicionadas));
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_registros_excluido ON registros (excluido);",
    )?;
    Ok(())
}
