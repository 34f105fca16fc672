//! Saneamento do JSON gravado na coluna `historico.alteracoes`
//!
//! Versões antigas gravaram `str(dict)` do Python, aspas simples, barras
//! soltas e objetos truncados. O saneamento tenta níveis de reparo cada vez
//! mais agressivos e para no primeiro que produz um objeto JSON:
//!
//! 1. [`NivelReparo::Original`]: parse direto (desfazendo dupla codificação)
//! 2. [`NivelReparo::Regex`]: literais Python, aspas simples, vírgulas finais
//! 3. [`NivelReparo::Agressivo`]: caracteres de controle, escapes inválidos,
//!    strings e chaves não fechadas
//! 4. [`NivelReparo::Extremo`]: garimpa pares `"campo": {...}` e `"chave": "valor"`
//! 5. [`NivelReparo::Vazio`]: `{}`
//!
//! Nunca falha.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NivelReparo {
    Original,
    Regex,
    Agressivo,
    Extremo,
    Vazio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonSanitizado {
    pub valor: Map<String, Value>,
    pub nivel: NivelReparo,
}

const VALOR: &str = r#"("(?:[^"\\]|\\.)*"|null|true|false|-?\d+(?:\.\d+)?)"#;

static PAR_MUDANCA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#""([^"\\]+)"\s*:\s*\{{\s*"(?:valor_antigo|anterior)"\s*:\s*{v}\s*,\s*"(?:valor_novo|novo)"\s*:\s*{v}\s*\}}"#,
        v = VALOR
    ))
    .unwrap()
});

static PAR_SIMPLES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#""([^"\\]+)"\s*:\s*{}"#, VALOR)).unwrap()
});

/// Saneia o texto bruto e informa qual nível de reparo foi necessário.
pub fn sanitizar(bruto: &str) -> JsonSanitizado {
    let texto = bruto.trim();
    if texto.is_empty() {
        return vazio();
    }

    if let Some(valor) = parse_objeto(texto) {
        return JsonSanitizado { valor, nivel: NivelReparo::Original };
    }

    let corrigido = corrigir_estilo_python(texto);
    if let Some(valor) = parse_objeto(&corrigido) {
        return JsonSanitizado { valor, nivel: NivelReparo::Regex };
    }

    let agressivo = correcao_agressiva(&corrigido);
    if let Some(valor) = parse_objeto(&agressivo) {
        return JsonSanitizado { valor, nivel: NivelReparo::Agressivo };
    }

    let garimpado = garimpar_pares(&corrigido);
    if !garimpado.is_empty() {
        return JsonSanitizado { valor: garimpado, nivel: NivelReparo::Extremo };
    }

    vazio()
}

/// Versão texto de [`sanitizar`]: sempre um objeto JSON válido.
pub fn sanitize_json_string(bruto: &str) -> String {
    Value::Object(sanitizar(bruto).valor).to_string()
}

fn vazio() -> JsonSanitizado {
    JsonSanitizado { valor: Map::new(), nivel: NivelReparo::Vazio }
}

/// Objeto JSON, aceitando até duas camadas de string com JSON dentro.
fn parse_objeto(texto: &str) -> Option<Map<String, Value>> {
    let mut valor: Value = serde_json::from_str(texto).ok()?;
    for _ in 0..2 {
        match valor {
            Value::Object(mapa) => return Some(mapa),
            Value::String(interno) => valor = serde_json::from_str(interno.trim()).ok()?,
            _ => return None,
        }
    }
    match valor {
        Value::Object(mapa) => Some(mapa),
        _ => None,
    }
}

/// Converte `True/False/None` e strings com aspas simples, e remove
/// vírgulas antes de `}`/`]`.
fn corrigir_estilo_python(texto: &str) -> String {
    let mut saida = String::with_capacity(texto.len());
    let mut chars = texto.chars().peekable();
    let mut palavra = String::new();

    let despejar = |palavra: &mut String, saida: &mut String| {
        match palavra.as_str() {
            "True" => saida.push_str("true"),
            "False" => saida.push_str("false"),
            "None" => saida.push_str("null"),
            _ => saida.push_str(palavra),
        }
        palavra.clear();
    };

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() || c == '_' {
            palavra.push(c);
            continue;
        }
        despejar(&mut palavra, &mut saida);

        match c {
            '"' => {
                saida.push('"');
                while let Some(d) = chars.next() {
                    saida.push(d);
                    if d == '\\' {
                        if let Some(e) = chars.next() {
                            saida.push(e);
                        }
                    } else if d == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                saida.push('"');
                while let Some(d) = chars.next() {
                    match d {
                        '\\' => match chars.next() {
                            Some('\'') => saida.push('\''),
                            Some(e) => {
                                saida.push('\\');
                                saida.push(e);
                            }
                            None => saida.push('\\'),
                        },
                        '"' => saida.push_str("\\\""),
                        '\'' => {
                            saida.push('"');
                            break;
                        }
                        outro => saida.push(outro),
                    }
                }
            }
            outro => saida.push(outro),
        }
    }
    despejar(&mut palavra, &mut saida);

    sem_virgulas_finais(&saida)
}

/// Troca caracteres de controle por espaço, escapa barras inválidas,
/// fecha string aberta e completa `}`/`]` que faltam.
fn correcao_agressiva(texto: &str) -> String {
    let mut saida = String::with_capacity(texto.len() + 8);
    let mut pilha: Vec<char> = Vec::new();
    let mut em_string = false;
    let mut chars = texto.chars().peekable();

    while let Some(c) = chars.next() {
        let c = if c.is_control() { ' ' } else { c };

        if em_string {
            match c {
                '\\' => match chars.peek().copied() {
                    Some(e) if matches!(e, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                        saida.push('\\');
                        saida.push(e);
                        chars.next();
                    }
                    Some('u') if escape_unicode_valido(&chars) => saida.push('\\'),
                    _ => saida.push_str("\\\\"),
                },
                '"' => {
                    em_string = false;
                    saida.push('"');
                }
                outro => saida.push(outro),
            }
            continue;
        }

        match c {
            '"' => em_string = true,
            '{' => pilha.push('}'),
            '[' => pilha.push(']'),
            '}' | ']' => {
                if pilha.last() == Some(&c) {
                    pilha.pop();
                }
            }
            _ => {}
        }
        saida.push(c);
    }

    if em_string {
        saida.push('"');
    }
    while let Some(fecha) = pilha.pop() {
        saida.push(fecha);
    }

    sem_virgulas_finais(&saida)
}

/// Remove vírgulas antes de `}`/`]` fora de strings; o texto entre
/// aspas passa intacto.
fn sem_virgulas_finais(texto: &str) -> String {
    let mut saida = String::with_capacity(texto.len());
    let mut em_string = false;
    let mut escapado = false;
    let mut chars = texto.chars().peekable();

    while let Some(c) = chars.next() {
        if em_string {
            saida.push(c);
            if escapado {
                escapado = false;
            } else if c == '\\' {
                escapado = true;
            } else if c == '"' {
                em_string = false;
            }
            continue;
        }
        if c == ',' {
            let proximo = chars.clone().find(|d| !d.is_whitespace());
            if matches!(proximo, Some('}') | Some(']')) {
                continue;
            }
        }
        if c == '"' {
            em_string = true;
        }
        saida.push(c);
    }
    saida
}

fn escape_unicode_valido(chars: &std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    let resto: String = chars.clone().skip(1).take(4).collect();
    resto.len() == 4 && resto.chars().all(|c| c.is_ascii_hexdigit())
}

fn valor_literal(token: &str) -> Value {
    serde_json::from_str(token)
        .unwrap_or_else(|_| Value::String(token.trim_matches('"').to_string()))
}

/// Último recurso: recolhe o que der para reconhecer.
fn garimpar_pares(texto: &str) -> Map<String, Value> {
    let mut mapa = Map::new();

    for cap in PAR_MUDANCA.captures_iter(texto) {
        let mut mudanca = Map::new();
        mudanca.insert("valor_antigo".into(), valor_literal(&cap[2]));
        mudanca.insert("valor_novo".into(), valor_literal(&cap[3]));
        mapa.insert(cap[1].to_string(), Value::Object(mudanca));
    }
    if !mapa.is_empty() {
        return mapa;
    }

    for cap in PAR_SIMPLES.captures_iter(texto) {
        mapa.insert(cap[1].to_string(), valor_literal(&cap[2]));
    }
    mapa
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_valido_passa_intacto() {
        let bruto = r#"{"placa": {"valor_antigo": "AAA1111", "valor_novo": "BBB2222"}}"#;
        let r = sanitizar(bruto);
        assert_eq!(r.nivel, NivelReparo::Original);
        assert_eq!(
            Value::Object(r.valor),
            json!({"placa": {"valor_antigo": "AAA1111", "valor_novo": "BBB2222"}})
        );
    }

    #[test]
    fn test_dupla_codificacao() {
        let bruto = r#""{\"cliente\": {\"anterior\": \"A\", \"novo\": \"B\"}}""#;
        let r = sanitizar(bruto);
        assert_eq!(r.nivel, NivelReparo::Original);
        assert_eq!(r.valor["cliente"]["novo"], "B");
    }

    #[test]
    fn test_dicionario_python() {
        let bruto = "{'placa': {'anterior': 'AAA', 'novo': None}, 'ok': True, 'obs': 'd\\'água \"x\"'}";
        let r = sanitizar(bruto);
        assert_eq!(r.nivel, NivelReparo::Regex);
        assert_eq!(r.valor["placa"]["novo"], Value::Null);
        assert_eq!(r.valor["ok"], Value::Bool(true));
        assert_eq!(r.valor["obs"], "d'água \"x\"");
    }

    #[test]
    fn test_palavras_dentro_de_string_nao_mudam() {
        let bruto = "{'obs': 'None of True', 'x': 1,}";
        let r = sanitizar(bruto);
        assert_eq!(r.nivel, NivelReparo::Regex);
        assert_eq!(r.valor["obs"], "None of True");
    }

    #[test]
    fn test_virgula_final() {
        let r = sanitizar(r#"{"a": "b", "c": [1, 2,],}"#);
        assert_eq!(r.nivel, NivelReparo::Regex);
        assert_eq!(Value::Object(r.valor), json!({"a": "b", "c": [1, 2]}));
    }

    #[test]
    fn test_virgula_dentro_de_string_preservada() {
        let r = sanitizar("{'obs': 'a, }', 'lista': 'x,]', 'n': [1,],}");
        assert_eq!(r.nivel, NivelReparo::Regex);
        assert_eq!(r.valor["obs"], "a, }");
        assert_eq!(r.valor["lista"], "x,]");
        assert_eq!(r.valor["n"], json!([1]));

        let r = sanitizar(r#"{"obs": "fim, ]", "escapada": "\", }", "a": [1,"#);
        assert_eq!(r.nivel, NivelReparo::Agressivo);
        assert_eq!(r.valor["obs"], "fim, ]");
        assert_eq!(r.valor["escapada"], "\", }");
        assert_eq!(r.valor["a"], json!([1]));
    }

    #[test]
    fn test_caractere_de_controle() {
        let r = sanitizar("{\"obs\": \"linha1\nlinha2\"}");
        assert_eq!(r.nivel, NivelReparo::Agressivo);
        assert_eq!(r.valor["obs"], "linha1 linha2");
    }

    #[test]
    fn test_barra_invalida_preservada() {
        let r = sanitizar(r#"{"caminho": "C:\pasta\nova"}"#);
        assert_eq!(r.nivel, NivelReparo::Agressivo);
        assert_eq!(r.valor["caminho"], "C:\\pasta\nova");
    }

    #[test]
    fn test_chave_nao_fechada() {
        let r = sanitizar(r#"{"cpf": {"valor_antigo": "1", "valor_novo": "2"}"#);
        assert_eq!(r.nivel, NivelReparo::Agressivo);
        assert_eq!(r.valor["cpf"]["valor_novo"], "2");
    }

    #[test]
    fn test_string_truncada() {
        let r = sanitizar(r#"{"observacao_gr": "texto cort"#);
        assert_eq!(r.nivel, NivelReparo::Agressivo);
        assert_eq!(r.valor["observacao_gr"], "texto cort");
    }

    #[test]
    fn test_garimpo_de_mudancas() {
        let bruto = r#"lixo "placa": {"valor_antigo": "AAA", "valor_novo": "BBB"} ### "cpf": {'anterior': '1', 'novo': '2'} fim"#;
        let r = sanitizar(bruto);
        assert_eq!(r.nivel, NivelReparo::Extremo);
        assert_eq!(r.valor["placa"]["valor_novo"], "BBB");
        assert_eq!(r.valor["cpf"]["valor_antigo"], "1");
    }

    #[test]
    fn test_garimpo_de_pares_simples() {
        let r = sanitizar(r#"<<"tipo": "Edição GR" ... "usuario": "maria">>"#);
        assert_eq!(r.nivel, NivelReparo::Extremo);
        assert_eq!(r.valor["tipo"], "Edição GR");
        assert_eq!(r.valor["usuario"], "maria");
    }

    #[test]
    fn test_irrecuperavel_vira_objeto_vazio() {
        for bruto in ["", "   ", "nada aqui", "[1, 2, 3]", "42"] {
            let r = sanitizar(bruto);
            assert_eq!(r.nivel, NivelReparo::Vazio, "entrada: {:?}", bruto);
            assert!(r.valor.is_empty());
        }
        assert_eq!(sanitize_json_string("nada aqui"), "{}");
    }

    #[test]
    fn test_sanitize_json_string_sempre_valido() {
        let entradas = [
            "{'a': 'b'",
            "{\"a\": \"\\q\"}",
            "\"\"",
            "{{{{",
            "}}}",
            "{\"a\": {\"b\": [1, {\"c\": 'x'",
        ];
        for bruto in entradas {
            let texto = sanitize_json_string(bruto);
            let valor: Value = serde_json::from_str(&texto).unwrap();
            assert!(valor.is_object(), "entrada: {:?}", bruto);
        }
    }
}
