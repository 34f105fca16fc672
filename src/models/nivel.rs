use serde::{Deserialize, Serialize};
use std::fmt;

/// Perfil do usuário
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nivel {
    Admin,
    Gr,
    Comum,
}

impl Nivel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Nivel::Admin => "admin",
            Nivel::Gr => "gr",
            Nivel::Comum => "comum",
        }
    }

    /// Valor gravado no banco. Qualquer coisa desconhecida é tratada como `comum`.
    pub fn from_db(valor: &str) -> Self {
        Self::parse(valor).unwrap_or(Nivel::Comum)
    }

    /// Parse estrito, para entrada de formulários administrativos.
    pub fn parse(valor: &str) -> Option<Self> {
        match valor.trim().to_lowercase().as_str() {
            "admin" => Some(Nivel::Admin),
            "gr" => Some(Nivel::Gr),
            "comum" => Some(Nivel::Comum),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Nivel::Admin)
    }

    /// Admin e GR enxergam os dados de SM/AE e revisam alterações.
    pub fn is_gestao(&self) -> bool {
        matches!(self, Nivel::Admin | Nivel::Gr)
    }

    /// Rota inicial do perfil após o login
    pub fn destino_inicial(&self) -> &'static str {
        match self {
            Nivel::Admin => "/admin/dashboard",
            Nivel::Gr => "/gr/ambiente",
            Nivel::Comum => "/dashboard",
        }
    }
}

impl fmt::Display for Nivel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
