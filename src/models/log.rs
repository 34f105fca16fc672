use serde::{Deserialize, Serialize};

/// Linha da tabela `logs_unificados`
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub data_hora: String,
    pub usuario: String,
    pub nivel: Option<String>,
    pub acao: String,
    pub descricao: Option<String>,
    pub detalhes: Option<String>,
    pub registro_id: Option<i64>,
    pub ip: Option<String>,
    pub origem: Option<String>,
    pub objeto_tipo: Option<String>,
    pub valor_anterior: Option<String>,
    pub valor_novo: Option<String>,
}

impl LogEntry {
    pub const COLUNAS: &'static str = "id, data_hora, usuario, nivel, acao, descricao, detalhes, \
        registro_id, ip, origem, objeto_tipo, valor_anterior, valor_novo";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            data_hora: row.get(1)?,
            usuario: row.get(2)?,
            nivel: row.get(3)?,
            acao: row.get(4)?,
            descricao: row.get(5)?,
            detalhes: row.get(6)?,
            registro_id: row.get(7)?,
            ip: row.get(8)?,
            origem: row.get(9)?,
            objeto_tipo: row.get(10)?,
            valor_anterior: row.get(11)?,
            valor_novo: row.get(12)?,
        })
    }
}

/// Entrada a ser gravada no log unificado
#[derive(Debug, Clone, Default)]
pub struct NovoLog {
    pub usuario: String,
    pub nivel: Option<String>,
    pub acao: String,
    pub descricao: Option<String>,
    pub detalhes: Option<String>,
    pub registro_id: Option<i64>,
    pub ip: Option<String>,
    pub origem: Option<String>,
    pub objeto_tipo: Option<String>,
    pub valor_anterior: Option<String>,
    pub valor_novo: Option<String>,
}

impl NovoLog {
    pub fn new(usuario: &str, acao: &str) -> Self {
        Self {
            usuario: usuario.to_string(),
            acao: acao.to_string(),
            ..Default::default()
        }
    }

    pub fn nivel(mut self, nivel: &str) -> Self {
        self.nivel = Some(nivel.to_string());
        self
    }

    pub fn descricao(mut self, descricao: impl Into<String>) -> Self {
        self.descricao = Some(descricao.into());
        self
    }

    pub fn detalhes(mut self, detalhes: impl Into<String>) -> Self {
        self.detalhes = Some(detalhes.into());
        self
    }

    pub fn registro(mut self, registro_id: i64) -> Self {
        self.registro_id = Some(registro_id);
        self.objeto_tipo = Some("registro".to_string());
        self
    }

    pub fn ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }

    pub fn origem(mut self, origem: &str) -> Self {
        self.origem = Some(origem.to_string());
        self
    }

    pub fn valores(mut self, anterior: Option<String>, novo: Option<String>) -> Self {
        self.valor_anterior = anterior;
        self.valor_novo = novo;
        self
    }
}

/// Filtros da tela de logs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltrosLog {
    pub usuario: Option<String>,
    pub nivel: Option<String>,
    pub acao: Option<String>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub registro_id: Option<i64>,
}
