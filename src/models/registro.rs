use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use super::campo::Campo;

/// Registro de atendimento (linha da tabela `registros`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registro {
    pub id: i64,
    pub usuario: Option<String>,
    pub data_registro: Option<String>,
    pub data_modificacao: Option<String>,
    pub modificado_por: Option<String>,
    pub alteracoes_verificadas: bool,
    pub excluido: bool,
    /// Apenas campos com valor não vazio
    pub dados: BTreeMap<Campo, String>,
}

/// Colunas de controle lidas antes dos campos do catálogo
const COLUNAS_CONTROLE: [&str; 7] = [
    "id",
    "usuario",
    "data_registro",
    "data_modificacao",
    "modificado_por",
    "alteracoes_verificadas",
    "excluido",
];

/// Lista de colunas para `SELECT`, na ordem esperada por [`Registro::from_row`].
pub fn colunas_select(alias: Option<&str>) -> String {
    let prefixo = alias.map(|a| format!("{}.", a)).unwrap_or_default();
    COLUNAS_CONTROLE
        .iter()
        .copied()
        .chain(Campo::TODOS.iter().map(|c| c.db()))
        .map(|c| format!("{}{}", prefixo, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Texto de uma célula SQLite, independente da afinidade da coluna.
///
/// Bases antigas gravaram números em colunas TEXT e vice-versa.
pub fn texto_da_celula(valor: ValueRef<'_>) -> Option<String> {
    match valor {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

fn flag(valor: ValueRef<'_>) -> bool {
    match valor {
        ValueRef::Integer(i) => i != 0,
        ValueRef::Real(f) => f != 0.0,
        ValueRef::Text(t) => matches!(t, b"1" | b"true" | b"True"),
        _ => false,
    }
}

impl Registro {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut dados = BTreeMap::new();
        for (i, campo) in Campo::TODOS.iter().enumerate() {
            if let Some(valor) = texto_da_celula(row.get_ref(COLUNAS_CONTROLE.len() + i)?) {
                if !valor.trim().is_empty() {
                    dados.insert(*campo, valor);
                }
            }
        }

        Ok(Self {
            id: row.get(0)?,
            usuario: texto_da_celula(row.get_ref(1)?),
            data_registro: texto_da_celula(row.get_ref(2)?),
            data_modificacao: texto_da_celula(row.get_ref(3)?),
            modificado_por: texto_da_celula(row.get_ref(4)?),
            alteracoes_verificadas: flag(row.get_ref(5)?),
            excluido: flag(row.get_ref(6)?),
            dados,
        })
    }

    /// Valor do campo, vazio quando ausente
    pub fn valor(&self, campo: Campo) -> &str {
        self.dados.get(&campo).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn tem(&self, campo: Campo) -> bool {
        !self.valor(campo).trim().is_empty()
    }

    /// SM ou AE preenchidos (e diferentes de "0")
    pub fn aprovado(&self) -> bool {
        [Campo::NumeroSm, Campo::NumeroAe].iter().any(|c| {
            let v = self.valor(*c).trim();
            !v.is_empty() && v != "0"
        })
    }

    /// Projeção do registro só com os campos indicados pelo filtro
    pub fn projetar<F>(&self, mut filtro: F) -> Registro
    where
        F: FnMut(Campo) -> bool,
    {
        Registro {
            dados: self
                .dados
                .iter()
                .filter(|(c, _)| filtro(**c))
                .map(|(c, v)| (*c, v.clone()))
                .collect(),
            ..self.clone()
        }
    }
}

impl Serialize for Registro {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("usuario", &self.usuario)?;
        map.serialize_entry("data_registro", &self.data_registro)?;
        map.serialize_entry("data_modificacao", &self.data_modificacao)?;
        map.serialize_entry("modificado_por", &self.modificado_por)?;
        map.serialize_entry("alteracoes_verificadas", &self.alteracoes_verificadas)?;
        for (campo, valor) in &self.dados {
            map.serialize_entry(campo.db(), valor)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registro(pares: &[(Campo, &str)]) -> Registro {
        Registro {
            id: 1,
            dados: pares.iter().map(|(c, v)| (*c, v.to_string())).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_aprovado() {
        assert!(!registro(&[]).aprovado());
        assert!(!registro(&[(Campo::NumeroSm, "0")]).aprovado());
        assert!(!registro(&[(Campo::NumeroSm, "  ")]).aprovado());
        assert!(registro(&[(Campo::NumeroAe, "AE-9")]).aprovado());
        assert!(registro(&[(Campo::NumeroSm, "0"), (Campo::NumeroAe, "12")]).aprovado());
    }

    #[test]
    fn test_colunas_select() {
        let colunas = colunas_select(Some("r"));
        assert!(colunas.starts_with("r.id, r.usuario"));
        assert!(colunas.ends_with("r.arquivo"));
    }

    #[test]
    fn test_serializa_campos_pelo_nome_da_coluna() {
        let json = serde_json::to_value(registro(&[(Campo::Placa, "ABC1D23")])).unwrap();
        assert_eq!(json["placa"], "ABC1D23");
        assert_eq!(json["id"], 1);
    }

    #[test]
    fn test_from_row_com_tipos_misturados() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::schema::inicializar(&conn).unwrap();
        conn.execute(
            "INSERT INTO registros (usuario, data_registro, quantidade, sla_sm, cliente, numero_sm) \
             VALUES ('ana', '2024-01-01 10:00:00', 12, 1.5, 'ACME', '')",
            [],
        )
        .unwrap();
        let sql = format!("SELECT {} FROM registros", colunas_select(None));
        let r = conn.query_row(&sql, [], Registro::from_row).unwrap();
        assert_eq!(r.valor(Campo::Quantidade), "12");
        assert_eq!(r.valor(Campo::SlaSm), "1.5");
        assert_eq!(r.valor(Campo::Cliente), "ACME");
        assert!(!r.tem(Campo::NumeroSm));
        assert!(!r.excluido);
    }
}
