//! Datas e horários
//!
//! O banco acumulou vários formatos ao longo do tempo. Tudo que é gravado
//! agora usa [`FORMATO_PADRAO`]; a leitura aceita também os formatos legados.
//! Comparações de data sempre acontecem depois do parse.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

pub const FORMATO_PADRAO: &str = "%Y-%m-%d %H:%M:%S";
pub const FORMATO_EXIBICAO: &str = "%d/%m/%Y %H:%M:%S";

const FORMATOS_DATA_HORA: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%H:%M:%S %d-%m-%Y",
    "%H:%M:%S %d/%m/%Y",
];

const FORMATOS_DATA: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

pub fn agora() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn agora_texto() -> String {
    formatar_padrao(&agora())
}

pub fn formatar_padrao(data: &NaiveDateTime) -> String {
    data.format(FORMATO_PADRAO).to_string()
}

/// Interpreta uma data em qualquer um dos formatos conhecidos.
///
/// Datas sem horário são tratadas como meia-noite. Texto vazio ou
/// irreconhecível resulta em `None`.
pub fn parse_data(texto: &str) -> Option<NaiveDateTime> {
    let texto = texto.trim().trim_end_matches('Z');
    if texto.is_empty() {
        return None;
    }

    for formato in FORMATOS_DATA_HORA {
        if let Ok(data) = NaiveDateTime::parse_from_str(texto, formato) {
            return Some(data);
        }
    }

    FORMATOS_DATA
        .iter()
        .find_map(|formato| NaiveDate::parse_from_str(texto, formato).ok())
        .map(|data| data.and_time(NaiveTime::MIN))
}

/// Converte para `dd/mm/YYYY HH:MM:SS`; `None` quando a data não é reconhecida.
pub fn formatar_exibicao(texto: &str) -> Option<String> {
    parse_data(texto).map(|d| d.format(FORMATO_EXIBICAO).to_string())
}

/// Normaliza uma data vinda de formulário para o formato padrão.
/// Valores irreconhecíveis são devolvidos sem alteração.
pub fn normalizar(texto: &str) -> String {
    match parse_data(texto) {
        Some(data) => formatar_padrao(&data),
        None => texto.trim().to_string(),
    }
}

/// Horas entre duas datas, com duas casas decimais.
pub fn horas_entre(inicio: &NaiveDateTime, fim: &NaiveDateTime) -> f64 {
    let segundos = (*fim - *inicio).num_seconds() as f64;
    (segundos / 3600.0 * 100.0).round() / 100.0
}

/// Dias (fracionários) entre duas datas.
pub fn dias_entre(inicio: &NaiveDateTime, fim: &NaiveDateTime) -> f64 {
    (*fim - *inicio).num_seconds() as f64 / 86_400.0
}
