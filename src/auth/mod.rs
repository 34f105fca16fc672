//! # Autenticação
//!
//! - `senha.rs`: hash de senha compatível com werkzeug
//! - `sessao.rs`: middleware de sessão e guardas de perfil

pub mod senha;
pub mod sessao;

pub use sessao::{exigir_nivel, require_session, SessaoUsuario};
