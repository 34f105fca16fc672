pub mod arquivos;
pub mod datas;
pub mod error;
pub mod logging;

pub use error::*;
