/// Utilitários para nomes de arquivo enviados pelos usuários

/// Reduz um nome de arquivo a um nome seguro para gravar em disco.
///
/// Acentos viram ASCII, separadores de diretório viram espaço e só
/// sobram `[A-Za-z0-9._-]`; espaços são unidos por `_` e pontos/underscores
/// nas pontas são removidos. Pode devolver string vazia.
pub fn secure_filename(nome: &str) -> String {
    let ascii = deunicode::deunicode(nome);

    let partes: Vec<String> = ascii
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .map(|parte| {
            parte
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
                .collect::<String>()
        })
        .filter(|parte| !parte.is_empty())
        .collect();

    partes.join("_").trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Extensão em minúsculas, sem o ponto.
pub fn extensao(nome: &str) -> Option<String> {
    let (base, ext) = nome.rsplit_once('.')?;
    if base.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn extensao_permitida(nome: &str, permitidas: &[String]) -> bool {
    match extensao(nome) {
        Some(ext) => permitidas.iter().any(|p| p.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Nome final no disco: `<registro>_<tipo>_<timestamp>_<nome seguro>`.
pub fn nome_armazenado(registro_id: i64, tipo: &str, nome_original: &str, carimbo: &str) -> String {
    let seguro = secure_filename(nome_original);
    let seguro = if seguro.is_empty() { "arquivo".to_string() } else { seguro };
    format!("{}_{}_{}_{}", registro_id, tipo, carimbo, seguro)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename_remove_caminho_e_acentos() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("Relatório Fiscal 123.pdf"), "Relatorio_Fiscal_123.pdf");
        assert_eq!(secure_filename("C:\\Users\\joão\\agendamento.docx"), "C_Users_joao_agendamento.docx");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn test_extensao_permitida() {
        let permitidas = vec!["pdf".to_string(), "png".to_string(), "jpg".to_string()];
        assert!(extensao_permitida("nf.PDF", &permitidas));
        assert!(extensao_permitida("foto.final.jpg", &permitidas));
        assert!(!extensao_permitida("script.exe", &permitidas));
        assert!(!extensao_permitida("semextensao", &permitidas));
        assert!(!extensao_permitida(".pdf", &permitidas));
    }

    #[test]
    fn test_nome_armazenado() {
        assert_eq!(
            nome_armazenado(7, "nf", "nota.pdf", "20240101120000"),
            "7_nf_20240101120000_nota.pdf"
        );
        assert_eq!(
            nome_armazenado(7, "os", "???", "20240101120000"),
            "7_os_20240101120000_arquivo"
        );
    }
}
