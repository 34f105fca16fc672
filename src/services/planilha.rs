//! Opções dos dropdowns do formulário, vindas da planilha do OneDrive
//!
//! A primeira aba alimenta `TIPO DE CARGA`; a aba `PLACAS` alimenta cavalos,
//! carretas, motoristas e o mapa motorista → CPF. Sem planilha (ou com
//! qualquer falha) ficam só as opções fixas.

use calamine::{Data, Reader, Xlsx};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;

use crate::models::{Campo, TipoCampo};
use crate::utils::logging::log_warning;
use crate::utils::{AppError, AppResult};

const ABA_PLACAS: &str = "PLACAS";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OpcoesFormulario {
    pub combobox: BTreeMap<String, Vec<String>>,
    pub motorista_cpf: BTreeMap<String, String>,
    pub campos_obrigatorios: Vec<String>,
    pub tipos_de_dados: BTreeMap<String, String>,
}

impl Default for OpcoesFormulario {
    fn default() -> Self {
        let mut combobox = BTreeMap::new();
        combobox.insert(
            "UNIDADE".to_string(),
            vec!["Rio de Janeiro".into(), "Floriano".into(), "Suzano".into()],
        );
        combobox.insert(
            "MODALIDADE".to_string(),
            vec!["IMPORTAÇÃO".into(), "EXPORTAÇÃO".into(), "CABOTAGEM".into(), "CST".into()],
        );
        combobox.insert("STATUS CONTAINER".to_string(), vec!["CHEIO".into(), "VAZIO".into()]);

        Self {
            combobox,
            motorista_cpf: BTreeMap::new(),
            campos_obrigatorios: Campo::OBRIGATORIOS.iter().map(|c| c.rotulo().to_string()).collect(),
            tipos_de_dados: tipos_de_dados(),
        }
    }
}

fn tipos_de_dados() -> BTreeMap<String, String> {
    Campo::TODOS
        .iter()
        .filter(|c| c.secao().is_some())
        .map(|c| {
            let tipo = match c {
                Campo::Cpf => "cpf",
                Campo::DataSm | Campo::DataAe => "date",
                _ => match c.tipo() {
                    TipoCampo::DataHora => "datetime",
                    TipoCampo::Anexo => "file",
                    _ => "text",
                },
            };
            (c.rotulo().to_string(), tipo.to_string())
        })
        .collect()
}

/// Garante `download=1` no link de compartilhamento
pub fn url_download(url: &str) -> String {
    if url.contains("download=1") {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&download=1", url)
    } else {
        format!("{}?download=1", url)
    }
}

fn texto_celula(celula: &Data) -> String {
    match celula {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Empty | Data::Error(_) => String::new(),
    }
}

/// Aba como tabela: primeira linha é o cabeçalho
#[derive(Debug, Clone, Default)]
pub struct Aba {
    pub cabecalho: Vec<String>,
    pub linhas: Vec<Vec<String>>,
}

impl Aba {
    pub fn from_linhas(mut linhas: Vec<Vec<String>>) -> Self {
        if linhas.is_empty() {
            return Self::default();
        }
        let cabecalho = linhas.remove(0).into_iter().map(|c| c.trim().to_string()).collect();
        Self { cabecalho, linhas }
    }

    fn indice(&self, coluna: &str) -> Option<usize> {
        self.cabecalho.iter().position(|c| c.eq_ignore_ascii_case(coluna))
    }

    /// Valores não vazios da coluna, sem repetição, na ordem da planilha
    pub fn valores_unicos(&self, coluna: &str) -> Option<Vec<String>> {
        let idx = self.indice(coluna)?;
        let mut vistos = Vec::new();
        for linha in &self.linhas {
            let valor = linha.get(idx).map(|v| v.trim()).unwrap_or("");
            if !valor.is_empty() && !vistos.iter().any(|v: &String| v == valor) {
                vistos.push(valor.to_string());
            }
        }
        Some(vistos)
    }

    fn pares(&self, chave: &str, valor: &str) -> Vec<(String, String)> {
        let (Some(i), Some(j)) = (self.indice(chave), self.indice(valor)) else {
            return Vec::new();
        };
        self.linhas
            .iter()
            .map(|l| {
                (
                    l.get(i).map(|v| v.trim().to_string()).unwrap_or_default(),
                    l.get(j).map(|v| v.trim().to_string()).unwrap_or_default(),
                )
            })
            .collect()
    }
}

fn limpar_cpf(cpf: &str) -> String {
    cpf.chars().filter(|c| !matches!(c, '.' | '-' | ' ')).collect()
}

/// Monta as opções a partir das abas já lidas
pub fn processar(principal: &Aba, placas: Option<&Aba>) -> OpcoesFormulario {
    let mut opcoes = OpcoesFormulario::default();

    if let Some(placas) = placas {
        if let Some(cavalos) = placas.valores_unicos("PLACA") {
            opcoes.combobox.insert("CAVALO".into(), cavalos);
        }
        if let Some(carretas) = placas.valores_unicos("CARRETA") {
            opcoes.combobox.insert("CARRETA 1".into(), carretas.clone());
            opcoes.combobox.insert("CARRETA 2".into(), carretas);
        }
        if let Some(motoristas) = placas.valores_unicos("MOTORISTA") {
            opcoes.combobox.insert("MOTORISTA".into(), motoristas);
            for (motorista, cpf) in placas.pares("MOTORISTA", "CPF") {
                let cpf = limpar_cpf(&cpf);
                if !motorista.is_empty() && !cpf.is_empty() {
                    opcoes.motorista_cpf.insert(motorista, cpf);
                }
            }
        }
    }

    if let Some(tipos) = principal.valores_unicos("TIPO DE CARGA") {
        opcoes.combobox.insert("TIPO DE CARGA".into(), tipos);
    }

    opcoes
}

fn ler_aba<R>(workbook: &mut Xlsx<R>, nome: &str) -> AppResult<Aba>
where
    R: std::io::Read + std::io::Seek,
{
    let range = workbook
        .worksheet_range(nome)
        .map_err(|e| AppError::Planilha(format!("aba {}: {}", nome, e)))?;
    let linhas = range
        .rows()
        .map(|linha| linha.iter().map(texto_celula).collect())
        .collect();
    Ok(Aba::from_linhas(linhas))
}

/// Lê o `.xlsx` em memória
pub fn interpretar(bytes: Vec<u8>) -> AppResult<OpcoesFormulario> {
    let mut workbook: Xlsx<Cursor<Vec<u8>>> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| AppError::Planilha(e.to_string()))?;

    let nomes = workbook.sheet_names();
    let primeira = nomes
        .first()
        .cloned()
        .ok_or_else(|| AppError::Planilha("planilha sem abas".into()))?;
    tracing::debug!("Abas da planilha: {:?}", nomes);

    let principal = ler_aba(&mut workbook, &primeira)?;
    let placas = if nomes.iter().any(|n| n == ABA_PLACAS) {
        Some(ler_aba(&mut workbook, ABA_PLACAS)?)
    } else {
        tracing::warn!("⚠️ Planilha sem aba {}", ABA_PLACAS);
        None
    };

    Ok(processar(&principal, placas.as_ref()))
}

/// Baixa e interpreta a planilha
pub async fn carregar(client: &reqwest::Client, url: &str, timeout_seconds: u64) -> AppResult<OpcoesFormulario> {
    let url = url_download(url);
    tracing::info!("📥 Baixando planilha de opções");

    let resposta = client
        .get(&url)
        .timeout(Duration::from_secs(timeout_seconds))
        .send()
        .await?
        .error_for_status()?;
    let bytes = resposta.bytes().await?.to_vec();

    let opcoes = tokio::task::spawn_blocking(move || interpretar(bytes)).await??;
    tracing::info!(
        "✅ Planilha carregada: {} listas, {} motoristas com CPF",
        opcoes.combobox.len(),
        opcoes.motorista_cpf.len()
    );
    Ok(opcoes)
}

/// Como [`carregar`], mas qualquer falha devolve as opções padrão
pub async fn carregar_ou_padrao(client: &reqwest::Client, url: Option<&str>, timeout_seconds: u64) -> OpcoesFormulario {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        tracing::info!("ℹ️ Sem URL de planilha configurada, usando opções padrão");
        return OpcoesFormulario::default();
    };
    match carregar(client, url, timeout_seconds).await {
        Ok(opcoes) => opcoes,
        Err(e) => {
            log_warning(&format!("⚠️ Falha ao carregar planilha, usando opções padrão: {}", e));
            OpcoesFormulario::default()
        }
    }
}
