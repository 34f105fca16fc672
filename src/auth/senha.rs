//! Hash de senhas no formato `pbkdf2:sha256:<iterações>$<salt>$<hex>`
//!
//! É o formato do werkzeug, então hashes gravados pelo sistema antigo
//! continuam válidos. Qualquer outro formato nunca é aceito.

use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;

use crate::utils::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Iterações assumidas quando o hash não informa (formato antigo do werkzeug)
const ITERACOES_PADRAO: u32 = 260_000;
const TAMANHO_SALT: usize = 16;
const TAMANHO_CHAVE: usize = 32;

/// PBKDF2-HMAC-SHA256 (RFC 8018)
fn pbkdf2_sha256(senha: &[u8], salt: &[u8], iteracoes: u32, tamanho: usize) -> AppResult<Vec<u8>> {
    let prf = HmacSha256::new_from_slice(senha)
        .map_err(|e| AppError::InternalError(format!("chave HMAC inválida: {}", e)))?;

    let mut saida = Vec::with_capacity(tamanho);
    let mut bloco: u32 = 1;
    while saida.len() < tamanho {
        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&bloco.to_be_bytes());
        let mut u = mac.finalize().into_bytes();
        let mut t = u.clone();

        for _ in 1..iteracoes {
            let mut mac = prf.clone();
            mac.update(&u);
            u = mac.finalize().into_bytes();
            t.iter_mut().zip(u.iter()).for_each(|(a, b)| *a ^= b);
        }

        saida.extend_from_slice(&t);
        bloco += 1;
    }
    saida.truncate(tamanho);
    Ok(saida)
}

/// Texto alfanumérico aleatório (salts e senhas temporárias)
pub fn texto_aleatorio(tamanho: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(tamanho)
        .map(char::from)
        .collect()
}

pub fn gerar_hash(senha: &str, iteracoes: u32) -> AppResult<String> {
    let salt = texto_aleatorio(TAMANHO_SALT);
    let chave = pbkdf2_sha256(senha.as_bytes(), salt.as_bytes(), iteracoes, TAMANHO_CHAVE)?;
    Ok(format!("pbkdf2:sha256:{}${}${}", iteracoes, salt, hex::encode(chave)))
}

fn iguais_tempo_constante(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Confere a senha contra o hash gravado. Formatos desconhecidos dão `false`.
pub fn verificar_hash(hash: &str, senha: &str) -> bool {
    let mut partes = hash.splitn(3, '$');
    let (Some(metodo), Some(salt), Some(esperado)) = (partes.next(), partes.next(), partes.next()) else {
        return false;
    };

    let iteracoes = match metodo.split(':').collect::<Vec<_>>().as_slice() {
        ["pbkdf2", "sha256"] => ITERACOES_PADRAO,
        ["pbkdf2", "sha256", n] => match n.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => return false,
        },
        _ => return false,
    };

    let Ok(esperado) = hex::decode(esperado) else {
        return false;
    };
    if esperado.is_empty() {
        return false;
    }

    match pbkdf2_sha256(senha.as_bytes(), salt.as_bytes(), iteracoes, esperado.len()) {
        Ok(calculado) => iguais_tempo_constante(&calculado, &esperado),
        Err(_) => false,
    }
}
