//! Controle de acesso aos campos do registro por perfil
//!
//! Tabelas estáticas de campos permitidos, ocultos e somente leitura para
//! cada [`Nivel`], mais as seções do formulário visíveis a cada perfil.

use serde::Serialize;

use crate::models::{Campo, Nivel, Registro, Secao};

const PERMITIDOS_GR: &[Campo] = &[
    Campo::Cliente,
    Campo::PedidoReferencia,
    Campo::BookingDi,
    Campo::Container1,
    Campo::Container2,
    Campo::LoteCs,
    Campo::Origem,
    Campo::DestinoIntermediario,
    Campo::DestinoFinal,
    Campo::OnTimeCliente,
    Campo::HorarioPrevisto,
    Campo::ObservacaoOperacional,
    Campo::NumeroSm,
    Campo::NumeroAe,
    Campo::StatusContainer,
    Campo::Modalidade,
    Campo::Motorista,
    Campo::Cpf,
    Campo::Placa,
    Campo::Carreta1,
    Campo::Carreta2,
    Campo::TipoCarga,
    Campo::DataAe,
    Campo::DataSm,
    Campo::ObservacaoGr,
    Campo::SlaSm,
    Campo::SlaAe,
    Campo::StatusSm,
    Campo::Gerenciadora,
];

const PERMITIDOS_COMUM: &[Campo] = &[
    Campo::Cliente,
    Campo::PedidoReferencia,
    Campo::BookingDi,
    Campo::Container1,
    Campo::Container2,
    Campo::LoteCs,
    Campo::Origem,
    Campo::DestinoIntermediario,
    Campo::DestinoFinal,
    Campo::OnTimeCliente,
    Campo::HorarioPrevisto,
    Campo::ObservacaoOperacional,
    Campo::NumeroSm,
    Campo::NumeroAe,
    Campo::StatusContainer,
    Campo::Modalidade,
];

const OCULTOS_GR: &[Campo] = &[
    Campo::TipoCarga,
    Campo::Modalidade,
    Campo::NumeroNf,
    Campo::Serie,
    Campo::Quantidade,
    Campo::PesoBruto,
    Campo::ValorTotalNota,
    Campo::AnexarNf,
    Campo::AnexarOs,
    Campo::AnexarAgendamento,
];

/// Para o perfil comum, ocultos e somente leitura são o mesmo conjunto
const RESTRITOS_COMUM: &[Campo] = &[
    Campo::ObservacaoGr,
    Campo::StatusSm,
    Campo::SlaSm,
    Campo::SlaAe,
    Campo::Gerenciadora,
];

const SOMENTE_LEITURA_GR: &[Campo] = &[
    Campo::Cliente,
    Campo::PedidoReferencia,
    Campo::BookingDi,
    Campo::Container1,
    Campo::Container2,
    Campo::LoteCs,
    Campo::Origem,
    Campo::DestinoIntermediario,
    Campo::DestinoFinal,
    Campo::OnTimeCliente,
    Campo::HorarioPrevisto,
    Campo::ObservacaoOperacional,
    Campo::Motorista,
    Campo::Cpf,
    Campo::StatusContainer,
    Campo::TipoCarga,
    Campo::Modalidade,
    Campo::NumeroNf,
    Campo::Serie,
    Campo::Quantidade,
    Campo::PesoBruto,
    Campo::ValorTotalNota,
    Campo::AnexarNf,
    Campo::AnexarOs,
    Campo::AnexarAgendamento,
];

fn ocultos(nivel: Nivel) -> &'static [Campo] {
    match nivel {
        Nivel::Admin => &[],
        Nivel::Gr => OCULTOS_GR,
        Nivel::Comum => RESTRITOS_COMUM,
    }
}

fn somente_leitura(nivel: Nivel) -> &'static [Campo] {
    match nivel {
        Nivel::Admin => &[],
        Nivel::Gr => SOMENTE_LEITURA_GR,
        Nivel::Comum => RESTRITOS_COMUM,
    }
}

/// Campos listados no formulário do perfil. Admin recebe o catálogo inteiro.
pub fn campos_permitidos(nivel: Nivel) -> &'static [Campo] {
    match nivel {
        Nivel::Admin => &Campo::TODOS,
        Nivel::Gr => PERMITIDOS_GR,
        Nivel::Comum => PERMITIDOS_COMUM,
    }
}

pub fn campo_oculto(campo: Campo, nivel: Nivel) -> bool {
    ocultos(nivel).contains(&campo)
}

pub fn campo_somente_leitura(campo: Campo, nivel: Nivel) -> bool {
    somente_leitura(nivel).contains(&campo)
}

/// Campo aparece no formulário do perfil
pub fn campo_visivel(campo: Campo, nivel: Nivel) -> bool {
    if nivel.is_admin() {
        return true;
    }
    if campo_oculto(campo, nivel) {
        return false;
    }
    campos_permitidos(nivel).contains(&campo)
}

/// Campo pode ser gravado pelo perfil.
///
/// GR só grava os campos da seção GR; o perfil comum grava todo o resto.
pub fn campo_editavel(campo: Campo, nivel: Nivel) -> bool {
    match nivel {
        Nivel::Admin => true,
        Nivel::Gr | Nivel::Comum => {
            !campo_oculto(campo, nivel)
                && !campo_somente_leitura(campo, nivel)
                && campo.is_gr() == (nivel == Nivel::Gr)
        }
    }
}

pub fn secoes_visiveis(nivel: Nivel) -> &'static [Secao] {
    match nivel {
        Nivel::Admin => &Secao::TODAS,
        Nivel::Gr => &[
            Secao::Unidade,
            Secao::Cliente,
            Secao::Transporte,
            Secao::Cargas,
            Secao::Gr,
            Secao::Observacoes,
        ],
        Nivel::Comum => &[
            Secao::Unidade,
            Secao::Cliente,
            Secao::Transporte,
            Secao::Cargas,
            Secao::Observacoes,
            Secao::Documentos,
        ],
    }
}

pub fn campos_da_secao(secao: Secao) -> Vec<Campo> {
    Campo::TODOS
        .iter()
        .copied()
        .filter(|c| c.secao() == Some(secao))
        .collect()
}

/// Registro só com os campos que o perfil pode ler
pub fn filtrar_visiveis(registro: &Registro, nivel: Nivel) -> Registro {
    registro.projetar(|campo| !campo_oculto(campo, nivel))
}

#[derive(Debug, Clone, Serialize)]
pub struct CampoFormulario {
    pub campo: Campo,
    pub rotulo: &'static str,
    pub visivel: bool,
    pub editavel: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecaoFormulario {
    pub id: &'static str,
    pub titulo: &'static str,
    pub icone: &'static str,
    pub campos: Vec<CampoFormulario>,
}

/// Layout do formulário de registro para o perfil
pub fn formulario_para_nivel(nivel: Nivel) -> Vec<SecaoFormulario> {
    secoes_visiveis(nivel)
        .iter()
        .map(|secao| SecaoFormulario {
            id: secao.id(),
            titulo: secao.titulo(),
            icone: secao.icone(),
            campos: campos_da_secao(*secao)
                .into_iter()
                .filter(|c| !campo_oculto(*c, nivel))
                .map(|campo| CampoFormulario {
                    campo,
                    rotulo: campo.rotulo(),
                    visivel: campo_visivel(campo, nivel),
                    editavel: campo_editavel(campo, nivel),
                })
                .collect(),
        })
        .collect()
}
