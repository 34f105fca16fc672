//! Interpretação tipada do JSON de uma linha do histórico

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::sanitizer::{sanitizar, NivelReparo};

pub const TIPO_EDICAO_GR: &str = "Edição GR";
pub const TIPO_VERIFICACAO: &str = "Verificação de Alterações";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MudancaCampo {
    pub valor_antigo: Option<String>,
    pub valor_novo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipoEvento {
    EdicaoGr,
    VerificacaoAlteracoes,
    Outro(String),
}

impl TipoEvento {
    pub fn from_texto(texto: &str) -> Self {
        match texto {
            TIPO_EDICAO_GR => TipoEvento::EdicaoGr,
            TIPO_VERIFICACAO => TipoEvento::VerificacaoAlteracoes,
            outro => TipoEvento::Outro(outro.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TipoEvento::EdicaoGr => TIPO_EDICAO_GR,
            TipoEvento::VerificacaoAlteracoes => TIPO_VERIFICACAO,
            TipoEvento::Outro(s) => s,
        }
    }

    /// Eventos gerados pela própria GR, ignorados na detecção
    pub fn interno_gr(&self) -> bool {
        matches!(self, TipoEvento::EdicaoGr | TipoEvento::VerificacaoAlteracoes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventoHistorico {
    pub tipo: TipoEvento,
    pub campos: Vec<String>,
    pub usuario: Option<String>,
    pub valores: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConteudoHistorico {
    /// Mudanças campo a campo
    Campos(BTreeMap<String, MudancaCampo>),
    Evento(EventoHistorico),
    /// Marcadores de criação/exclusão
    Acao {
        acao: String,
        tabela: Option<String>,
        detalhes: Option<String>,
    },
    Vazio,
}

/// Texto de um valor JSON; `null` vira `None`.
pub fn texto_valor(valor: &Value) -> Option<String> {
    match valor {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        outro => Some(outro.to_string()),
    }
}

fn mudanca(valor: &Value) -> Option<MudancaCampo> {
    let obj = valor.as_object()?;
    let antigo = obj.get("valor_antigo").or_else(|| obj.get("anterior"));
    let novo = obj.get("valor_novo").or_else(|| obj.get("novo"));
    if antigo.is_none() && novo.is_none() {
        return None;
    }
    Some(MudancaCampo {
        valor_antigo: antigo.and_then(texto_valor),
        valor_novo: novo.and_then(texto_valor),
    })
}

impl ConteudoHistorico {
    pub fn from_bruto(bruto: &str) -> (Self, NivelReparo) {
        let sanitizado = sanitizar(bruto);
        (Self::from_mapa(&sanitizado.valor), sanitizado.nivel)
    }

    pub fn from_mapa(mapa: &Map<String, Value>) -> Self {
        if mapa.is_empty() {
            return ConteudoHistorico::Vazio;
        }

        if let Some(tipo) = mapa.get("tipo").and_then(Value::as_str) {
            let campos = match mapa.get("campos") {
                Some(Value::Array(itens)) => itens.iter().filter_map(texto_valor).collect(),
                Some(Value::String(s)) => s
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
                _ => Vec::new(),
            };
            let valores = match mapa.get("valores") {
                Some(Value::Object(v)) => v
                    .iter()
                    .map(|(k, v)| (k.clone(), texto_valor(v).unwrap_or_default()))
                    .collect(),
                _ => BTreeMap::new(),
            };
            return ConteudoHistorico::Evento(EventoHistorico {
                tipo: TipoEvento::from_texto(tipo),
                campos,
                usuario: mapa.get("usuario").and_then(texto_valor),
                valores,
            });
        }

        if let Some(acao) = mapa.get("acao").and_then(Value::as_str) {
            return ConteudoHistorico::Acao {
                acao: acao.to_string(),
                tabela: mapa.get("tabela").and_then(texto_valor),
                detalhes: mapa.get("detalhes").and_then(texto_valor),
            };
        }

        let campos: BTreeMap<String, MudancaCampo> = mapa
            .iter()
            .filter_map(|(campo, valor)| mudanca(valor).map(|m| (campo.clone(), m)))
            .collect();

        if campos.is_empty() {
            // Pares soltos "campo": "valor" (garimpo) contam como campo tocado
            let soltos: BTreeMap<String, MudancaCampo> = mapa
                .iter()
                .filter(|(_, v)| !v.is_object() && !v.is_array())
                .map(|(campo, v)| {
                    (
                        campo.clone(),
                        MudancaCampo { valor_antigo: None, valor_novo: texto_valor(v) },
                    )
                })
                .collect();
            if soltos.is_empty() {
                return ConteudoHistorico::Vazio;
            }
            return ConteudoHistorico::Campos(soltos);
        }

        ConteudoHistorico::Campos(campos)
    }

    /// Campos que a entrada altera ou menciona
    pub fn campos_tocados(&self) -> Vec<String> {
        match self {
            ConteudoHistorico::Campos(mapa) => mapa.keys().cloned().collect(),
            ConteudoHistorico::Evento(evento) => {
                let mut campos = evento.campos.clone();
                for chave in evento.valores.keys() {
                    if !campos.contains(chave) {
                        campos.push(chave.clone());
                    }
                }
                campos
            }
            ConteudoHistorico::Acao { .. } | ConteudoHistorico::Vazio => Vec::new(),
        }
    }

    pub fn toca(&self, campo: &str) -> bool {
        self.campos_tocados().iter().any(|c| c == campo)
    }

    pub fn tipo_evento(&self) -> Option<&TipoEvento> {
        match self {
            ConteudoHistorico::Evento(e) => Some(&e.tipo),
            _ => None,
        }
    }

    /// Mudança registrada para o campo, quando a entrada guarda valores
    pub fn mudanca_de(&self, campo: &str) -> Option<MudancaCampo> {
        match self {
            ConteudoHistorico::Campos(mapa) => mapa.get(campo).cloned(),
            ConteudoHistorico::Evento(e) => e.valores.get(campo).map(|v| MudancaCampo {
                valor_antigo: None,
                valor_novo: Some(v.clone()),
            }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ConteudoHistorico::Campos(mapa) => {
                let obj: Map<String, Value> = mapa
                    .iter()
                    .map(|(campo, m)| {
                        (
                            campo.clone(),
                            json!({"valor_antigo": m.valor_antigo, "valor_novo": m.valor_novo}),
                        )
                    })
                    .collect();
                Value::Object(obj)
            }
            ConteudoHistorico::Evento(e) => {
                let mut obj = json!({
                    "tipo": e.tipo.as_str(),
                    "campos": e.campos,
                    "usuario": e.usuario,
                });
                if !e.valores.is_empty() {
                    obj["valores"] = json!(e.valores);
                }
                obj
            }
            ConteudoHistorico::Acao { acao, tabela, detalhes } => {
                json!({"acao": acao, "tabela": tabela, "detalhes": detalhes})
            }
            ConteudoHistorico::Vazio => json!({}),
        }
    }
}
