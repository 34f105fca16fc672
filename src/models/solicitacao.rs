use serde::{Deserialize, Serialize};

/// Situação de uma solicitação de acesso ou de senha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSolicitacao {
    Pendente,
    Aprovada,
    Rejeitada,
}

impl StatusSolicitacao {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSolicitacao::Pendente => "pendente",
            StatusSolicitacao::Aprovada => "aprovada",
            StatusSolicitacao::Rejeitada => "rejeitada",
        }
    }

    pub fn from_db(valor: &str) -> Self {
        match valor.trim().to_lowercase().as_str() {
            "aprovada" | "aprovado" => StatusSolicitacao::Aprovada,
            "rejeitada" | "rejeitado" => StatusSolicitacao::Rejeitada,
            _ => StatusSolicitacao::Pendente,
        }
    }
}

/// Pedido de criação de conta feito na tela de login
#[derive(Debug, Clone, Serialize)]
pub struct SolicitacaoRegistro {
    pub id: i64,
    pub nome: String,
    pub username: String,
    pub email: String,
    pub setor: String,
    pub justificativa: String,
    pub status: StatusSolicitacao,
    pub data_solicitacao: String,
    pub processado_por: Option<String>,
    pub data_processamento: Option<String>,
    pub observacao: Option<String>,
}

impl SolicitacaoRegistro {
    pub const COLUNAS: &'static str = "id, nome, username, email, setor, justificativa, status, \
        data_solicitacao, processado_por, data_processamento, observacao";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            nome: row.get(1)?,
            username: row.get(2)?,
            email: row.get(3)?,
            setor: row.get(4)?,
            justificativa: row.get(5)?,
            status: StatusSolicitacao::from_db(&status),
            data_solicitacao: row.get(7)?,
            processado_por: row.get(8)?,
            data_processamento: row.get(9)?,
            observacao: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NovaSolicitacaoRegistro {
    pub nome: String,
    pub username: String,
    pub email: String,
    pub setor: String,
    pub justificativa: String,
}

/// Pedido de nova senha
#[derive(Debug, Clone, Serialize)]
pub struct SolicitacaoSenha {
    pub id: i64,
    pub username: String,
    pub status: StatusSolicitacao,
    pub data_solicitacao: String,
    pub processado_por: Option<String>,
    pub data_processamento: Option<String>,
    pub observacao: Option<String>,
}

impl SolicitacaoSenha {
    pub const COLUNAS: &'static str =
        "id, username, status, data_solicitacao, processado_por, data_processamento, observacao";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            status: StatusSolicitacao::from_db(&status),
            data_solicitacao: row.get(3)?,
            processado_por: row.get(4)?,
            data_processamento: row.get(5)?,
            observacao: row.get(6)?,
        })
    }
}
