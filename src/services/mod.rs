pub mod anexos;
pub mod auditoria;
pub mod dashboard;
pub mod manutencao;
pub mod planilha;
pub mod registros;
pub mod sessoes;
pub mod solicitacoes;
pub mod usuarios;

pub use planilha::OpcoesFormulario;
