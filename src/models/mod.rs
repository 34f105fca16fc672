pub mod campo;
pub mod log;
pub mod nivel;
pub mod registro;
pub mod solicitacao;
pub mod usuario;

pub use campo::{Campo, Secao, TipoCampo};
pub use log::{FiltrosLog, LogEntry, NovoLog};
pub use nivel::Nivel;
pub use registro::Registro;
pub use solicitacao::{
    NovaSolicitacaoRegistro, SolicitacaoRegistro, SolicitacaoSenha, StatusSolicitacao,
};
pub use usuario::{NovoUsuario, Usuario};
