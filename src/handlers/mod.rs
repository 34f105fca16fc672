pub mod admin;
pub mod anexos;
pub mod auth;
pub mod gr;
pub mod health;
pub mod registros;

use std::collections::HashMap;

const MAX_POR_PAGINA: i64 = 200;

/// Lê `pagina` e `por_pagina` da query string. Página começa em 1.
pub(crate) fn paginacao(query: &HashMap<String, String>, padrao: i64) -> (i64, i64) {
    let ler = |chave: &str| query.get(chave).and_then(|v| v.trim().parse::<i64>().ok());
    let pagina = ler("pagina").unwrap_or(1).max(1);
    let por_pagina = ler("por_pagina").unwrap_or(padrao).clamp(1, MAX_POR_PAGINA);
    (pagina, por_pagina)
}

/// Deslocamento da página para OFFSET; satura em vez de estourar.
pub(crate) fn deslocamento(pagina: i64, por_pagina: i64) -> i64 {
    (pagina.max(1) - 1).saturating_mul(por_pagina.max(1))
}

pub(crate) fn total_paginas(total: i64, por_pagina: i64) -> i64 {
    if por_pagina <= 0 {
        return 1;
    }
    ((total + por_pagina - 1) / por_pagina).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pares: &[(&str, &str)]) -> HashMap<String, String> {
        pares.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_paginacao_padrao_e_limites() {
        assert_eq!(paginacao(&query(&[]), 20), (1, 20));
        assert_eq!(paginacao(&query(&[("pagina", "0"), ("por_pagina", "5000")]), 20), (1, 200));
        assert_eq!(paginacao(&query(&[("pagina", "3"), ("por_pagina", "abc")]), 50), (3, 50));
    }

    #[test]
    fn test_pagina_enorme_nao_estoura() {
        let (pagina, por_pagina) = paginacao(&query(&[("pagina", "9223372036854775807")]), 20);
        assert_eq!(pagina, i64::MAX);
        assert_eq!(deslocamento(pagina, por_pagina), i64::MAX);
        assert_eq!(deslocamento(1, 20), 0);
        assert_eq!(deslocamento(3, 20), 40);
    }

    #[test]
    fn test_total_paginas() {
        assert_eq!(total_paginas(0, 20), 1);
        assert_eq!(total_paginas(20, 20), 1);
        assert_eq!(total_paginas(21, 20), 2);
    }
}
