use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub uploads: UploadSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub planilha: PlanilhaSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 5000 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub path: String,
    pub busy_timeout_ms: u64,
    #[serde(default = "backup_dir_padrao")]
    pub backup_dir: String,
    #[serde(default = "backups_mantidos_padrao")]
    pub backups_mantidos: usize,  // 0 = manter todos
}

fn backup_dir_padrao() -> String {
    "backups".into()
}

fn backups_mantidos_padrao() -> usize {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "usuarios.db".into(),
            busy_timeout_ms: 5000,
            backup_dir: backup_dir_padrao(),
            backups_mantidos: backups_mantidos_padrao(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadSettings {
    pub dir: String,
    pub allowed_extensions: Vec<String>,
    pub max_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: "uploads".into(),
            allowed_extensions: ["pdf", "png", "jpg", "jpeg", "docx"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionSettings {
    pub timeout_seconds: i64,
    pub cookie_name: String,
    pub cleanup_interval_seconds: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            cookie_name: "gr_session".into(),
            cleanup_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthSettings {
    pub pbkdf2_iterations: u32,
    pub seed_test_users: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self { pbkdf2_iterations: 260_000, seed_test_users: false }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlanilhaSettings {
    pub onedrive_url: Option<String>,  // Link de compartilhamento da planilha de opções
    pub timeout_seconds: u64,
}

impl Default for PlanilhaSettings {
    fn default() -> Self {
        Self { onedrive_url: None, timeout_seconds: 15 }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            uploads: UploadSettings::default(),
            session: SessionSettings::default(),
            auth: AuthSettings::default(),
            planilha: PlanilhaSettings::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // Variáveis herdadas do deploy antigo
        if let Ok(url) = std::env::var("ONEDRIVE_URL") {
            builder = builder.set_override("planilha.onedrive_url", url)?;
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            builder = builder.set_override("database.path", path)?;
        }

        builder = builder.add_source(
            Environment::with_prefix("ATENDIMENTO_GR")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("uploads.allowed_extensions")
                .try_parsing(true),
        );

        let s = builder.build()?;

        s.try_deserialize()
    }

    /// Porta efetiva: `PORT` (plataformas de deploy) tem precedência.
    pub fn porta(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.database.path, "usuarios.db");
        assert_eq!(settings.session.timeout_seconds, 300);
        assert!(settings.uploads.allowed_extensions.contains(&"docx".to_string()));
        assert!(settings.planilha.onedrive_url.is_none());
    }

    #[test]
    fn test_secoes_ausentes_usam_default() {
        let settings: Settings = Config::builder()
            .set_override("server.port", 8080)
            .unwrap()
            .set_override("server.host", "127.0.0.1")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.session.cookie_name, "gr_session");
        assert_eq!(settings.auth.pbkdf2_iterations, 260_000);
    }
}
