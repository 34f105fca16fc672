//! Histórico de alterações dos registros
//!
//! - `sanitizer`: reparo do JSON legado
//! - `conteudo`: leitura tipada de cada entrada
//! - `diff`: comparação campo a campo
//! - `gravacao`: tabela `historico`
//! - `pos_aprovacao`: fila de revisão da GR
//! - `visualizacao`: histórico formatado para a tela

pub mod conteudo;
pub mod diff;
pub mod gravacao;
pub mod pos_aprovacao;
pub mod sanitizer;
pub mod visualizacao;

pub use conteudo::{ConteudoHistorico, MudancaCampo, TipoEvento};
pub use sanitizer::{sanitize_json_string, sanitizar, JsonSanitizado, NivelReparo};
