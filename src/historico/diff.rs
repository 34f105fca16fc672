use std::collections::BTreeMap;

use super::conteudo::MudancaCampo;
use crate::models::{Campo, TipoCampo};

/// Forma canônica para comparação: trim e, nos campos numéricos, o valor
/// (`"12"`, `"12.0"` e `"12,0"` são iguais). CPF e placas seguem como texto.
fn canonico(campo: Campo, valor: &str) -> String {
    let valor = valor.trim();
    if !matches!(campo.tipo(), TipoCampo::Inteiro | TipoCampo::Decimal) {
        return valor.to_string();
    }
    match valor.replace(',', ".").parse::<f64>() {
        Ok(n) if n.is_finite() && !valor.is_empty() => format!("{}", n),
        _ => valor.to_string(),
    }
}

/// Compara os campos presentes em `novo` com o estado atual.
///
/// Ausente e vazio são equivalentes. Só campos efetivamente alterados
/// entram no resultado.
pub fn diff_campos(
    atual: &BTreeMap<Campo, String>,
    novo: &BTreeMap<Campo, String>,
) -> BTreeMap<Campo, MudancaCampo> {
    novo.iter()
        .filter_map(|(campo, valor_novo)| {
            let valor_antigo = atual.get(campo).map(|s| s.as_str()).unwrap_or("");
            if canonico(*campo, valor_antigo) == canonico(*campo, valor_novo) {
                return None;
            }
            Some((
                *campo,
                MudancaCampo {
                    valor_antigo: Some(valor_antigo.to_string()),
                    valor_novo: Some(valor_novo.clone()),
                },
            ))
        })
        .collect()
}
