//! Backup do banco

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::datas::agora;
use crate::utils::{AppError, AppResult};

const PREFIXO: &str = "usuarios_";
const SUFIXO: &str = ".db";

fn destino_livre(dir: &Path, carimbo: &str) -> PathBuf {
    let base = dir.join(format!("{}{}{}", PREFIXO, carimbo, SUFIXO));
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| dir.join(format!("{}{}_{}{}", PREFIXO, carimbo, n, SUFIXO)))
        .find(|p| !p.exists())
        .unwrap_or(base)
}

/// Cópias existentes, da mais antiga para a mais nova
pub fn listar_backups(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut arquivos: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(PREFIXO) && n.ends_with(SUFIXO))
                .unwrap_or(false)
        })
        .collect();
    arquivos.sort();
    Ok(arquivos)
}

/// Copia o banco com `VACUUM INTO` e apaga as cópias excedentes.
/// `manter = 0` mantém todas.
pub fn backup(conn: &Connection, destino_dir: &Path, manter: usize) -> AppResult<PathBuf> {
    fs::create_dir_all(destino_dir)?;
    let carimbo = agora().format("%Y%m%d_%H%M%S").to_string();
    let destino = destino_livre(destino_dir, &carimbo);
    let caminho = destino
        .to_str()
        .ok_or_else(|| AppError::InternalError("caminho de backup não é UTF-8".into()))?;

    conn.execute("VACUUM INTO ?1", [caminho])?;
    tracing::info!("💾 Backup criado em {}", destino.display());

    if manter > 0 {
        let existentes = listar_backups(destino_dir)?;
        let excedentes = existentes.len().saturating_sub(manter);
        for antigo in existentes.into_iter().take(excedentes) {
            match fs::remove_file(&antigo) {
                Ok(()) => tracing::info!("🗑️ Backup antigo removido: {}", antigo.display()),
                Err(e) => tracing::warn!("⚠️ Não foi possível remover {}: {}", antigo.display(), e),
            }
        }
    }

    Ok(destino)
}
