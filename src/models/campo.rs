//! Catálogo de campos da tabela `registros`
//!
//! Cada coluna de dados do registro de atendimento é um [`Campo`]. O catálogo
//! concentra o nome da coluna, o rótulo usado nos formulários e na planilha,
//! a seção do formulário e o tipo do valor.

use serde::{Serialize, Serializer};
use std::fmt;

/// Seções do formulário de registro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Secao {
    Unidade,
    Cliente,
    Transporte,
    Cargas,
    Observacoes,
    Documentos,
    Gr,
}

impl Secao {
    pub const TODAS: [Secao; 7] = [
        Secao::Unidade,
        Secao::Cliente,
        Secao::Transporte,
        Secao::Cargas,
        Secao::Observacoes,
        Secao::Documentos,
        Secao::Gr,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Secao::Unidade => "unidade",
            Secao::Cliente => "cliente",
            Secao::Transporte => "transporte",
            Secao::Cargas => "cargas",
            Secao::Observacoes => "observacoes",
            Secao::Documentos => "documentos",
            Secao::Gr => "gr",
        }
    }

    pub fn titulo(&self) -> &'static str {
        match self {
            Secao::Unidade => "Dados da Unidade",
            Secao::Cliente => "Dados do Cliente",
            Secao::Transporte => "Dados da Operação",
            Secao::Cargas => "Dados da Carga",
            Secao::Observacoes => "Observações",
            Secao::Documentos => "Anexos",
            Secao::Gr => "Dados de GR",
        }
    }

    pub fn icone(&self) -> &'static str {
        match self {
            Secao::Unidade => "building",
            Secao::Cliente => "user",
            Secao::Transporte => "truck",
            Secao::Cargas => "box",
            Secao::Observacoes => "comment",
            Secao::Documentos => "file-alt",
            Secao::Gr => "clipboard-list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoCampo {
    Texto,
    Inteiro,
    Decimal,
    DataHora,
    Anexo,
}

impl TipoCampo {
    pub fn tipo_sql(&self) -> &'static str {
        match self {
            TipoCampo::Inteiro => "INTEGER",
            TipoCampo::Decimal => "REAL",
            _ => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Campo {
    Unidade,
    Cliente,
    PedidoReferencia,
    BookingDi,
    Motorista,
    Cpf,
    Placa,
    Carreta1,
    Carreta2,
    TipoCarga,
    HorarioPrevisto,
    OnTimeCliente,
    Container1,
    Container2,
    StatusContainer,
    Modalidade,
    Origem,
    DestinoIntermediario,
    DestinoFinal,
    LoteCs,
    ObservacaoOperacional,
    AnexarNf,
    AnexarOs,
    AnexarAgendamento,
    NumeroSm,
    DataSm,
    StatusSm,
    NumeroAe,
    DataAe,
    ObservacaoGr,
    SlaSm,
    SlaAe,
    Gerenciadora,
    NumeroNf,
    Serie,
    Quantidade,
    PesoBruto,
    ValorTotalNota,
    ArquivoNfNome,
    ArquivoOsNome,
    ArquivoAgendamentoNome,
    MotLoc,
    Carreta,
    CarretaLoc,
    LocCliente,
    Arquivo,
}

struct InfoCampo {
    db: &'static str,
    rotulo: &'static str,
    secao: Option<Secao>,
    tipo: TipoCampo,
}

const fn info(db: &'static str, rotulo: &'static str, secao: Option<Secao>, tipo: TipoCampo) -> InfoCampo {
    InfoCampo { db, rotulo, secao, tipo }
}

impl Campo {
    /// Todos os campos, na ordem em que aparecem no formulário
    pub const TODOS: [Campo; 46] = [
        Campo::Unidade,
        Campo::Cliente,
        Campo::PedidoReferencia,
        Campo::BookingDi,
        Campo::Motorista,
        Campo::Cpf,
        Campo::Placa,
        Campo::Carreta1,
        Campo::Carreta2,
        Campo::TipoCarga,
        Campo::HorarioPrevisto,
        Campo::OnTimeCliente,
        Campo::Container1,
        Campo::Container2,
        Campo::StatusContainer,
        Campo::Modalidade,
        Campo::Origem,
        Campo::DestinoIntermediario,
        Campo::DestinoFinal,
        Campo::LoteCs,
        Campo::ObservacaoOperacional,
        Campo::AnexarNf,
        Campo::AnexarOs,
        Campo::AnexarAgendamento,
        Campo::NumeroSm,
        Campo::DataSm,
        Campo::StatusSm,
        Campo::NumeroAe,
        Campo::DataAe,
        Campo::ObservacaoGr,
        Campo::SlaSm,
        Campo::SlaAe,
        Campo::Gerenciadora,
        Campo::NumeroNf,
        Campo::Serie,
        Campo::Quantidade,
        Campo::PesoBruto,
        Campo::ValorTotalNota,
        Campo::ArquivoNfNome,
        Campo::ArquivoOsNome,
        Campo::ArquivoAgendamentoNome,
        Campo::MotLoc,
        Campo::Carreta,
        Campo::CarretaLoc,
        Campo::LocCliente,
        Campo::Arquivo,
    ];

    /// Obrigatórios na criação de um registro
    pub const OBRIGATORIOS: [Campo; 5] = [
        Campo::Unidade,
        Campo::Cliente,
        Campo::Motorista,
        Campo::Cpf,
        Campo::Placa,
    ];

    fn info(&self) -> InfoCampo {
        use Secao::*;
        use TipoCampo::*;
        match self {
            Campo::Unidade => info("unidade", "UNIDADE", Some(Unidade), Texto),
            Campo::Cliente => info("cliente", "CLIENTE", Some(Cliente), Texto),
            Campo::PedidoReferencia => info("pedido_referencia", "PEDIDO/REFERÊNCIA", Some(Cliente), Texto),
            Campo::BookingDi => info("booking_di", "BOOKING / DI", Some(Cliente), Texto),
            Campo::Motorista => info("motorista", "MOTORISTA", Some(Transporte), Texto),
            Campo::Cpf => info("cpf", "CPF MOTORISTA", Some(Transporte), Texto),
            Campo::Placa => info("placa", "CAVALO", Some(Transporte), Texto),
            Campo::Carreta1 => info("carreta1", "CARRETA 1", Some(Transporte), Texto),
            Campo::Carreta2 => info("carreta2", "CARRETA 2", Some(Transporte), Texto),
            Campo::TipoCarga => info("tipo_carga", "TIPO DE CARGA", Some(Transporte), Texto),
            Campo::HorarioPrevisto => info("horario_previsto", "HORÁRIO PREVISTO DE INÍCIO", Some(Transporte), DataHora),
            Campo::OnTimeCliente => info("on_time_cliente", "ON TIME (CLIENTE)", Some(Transporte), DataHora),
            Campo::Container1 => info("container_1", "CONTAINER 1", Some(Cargas), Texto),
            Campo::Container2 => info("container_2", "CONTAINER 2", Some(Cargas), Texto),
            Campo::StatusContainer => info("status_container", "STATUS CONTAINER", Some(Cargas), Texto),
            Campo::Modalidade => info("modalidade", "MODALIDADE", Some(Cargas), Texto),
            Campo::Origem => info("origem", "ORIGEM", Some(Cargas), Texto),
            Campo::DestinoIntermediario => info("destino_intermediario", "DESTINO INTERMEDIÁRIO", Some(Cargas), Texto),
            Campo::DestinoFinal => info("destino_final", "DESTINO FINAL", Some(Cargas), Texto),
            Campo::LoteCs => info("lote_cs", "LOTE CS", Some(Cargas), Texto),
            Campo::ObservacaoOperacional => info("observacao_operacional", "observacao_operacional", Some(Observacoes), Texto),
            Campo::AnexarNf => info("anexar_nf", "ANEXAR NF", Some(Documentos), Anexo),
            Campo::AnexarOs => info("anexar_os", "ANEXAR OS", Some(Documentos), Anexo),
            Campo::AnexarAgendamento => info("anexar_agendamento", "ANEXAR AGENDAMENTO", Some(Documentos), Anexo),
            Campo::NumeroSm => info("numero_sm", "NUMERO SM", Some(Gr), Texto),
            Campo::DataSm => info("data_sm", "DATA SM", Some(Gr), DataHora),
            Campo::StatusSm => info("status_sm", "STATUS SM", Some(Gr), Texto),
            Campo::NumeroAe => info("numero_ae", "NÚMERO AE", Some(Gr), Texto),
            Campo::DataAe => info("data_ae", "DATA AE", Some(Gr), DataHora),
            Campo::ObservacaoGr => info("observacao_gr", "OBSERVAÇÃO DE GR", Some(Gr), Texto),
            Campo::SlaSm => info("sla_sm", "SLA SM", Some(Gr), Decimal),
            Campo::SlaAe => info("sla_ae", "SLA AE", Some(Gr), Decimal),
            Campo::Gerenciadora => info("gerenciadora", "GERENCIADORA", Some(Gr), Texto),
            Campo::NumeroNf => info("numero_nf", "Nº NF", None, Texto),
            Campo::Serie => info("serie", "SÉRIE", None, Texto),
            Campo::Quantidade => info("quantidade", "QUANTIDADE", None, Inteiro),
            Campo::PesoBruto => info("peso_bruto", "PESO BRUTO", None, Decimal),
            Campo::ValorTotalNota => info("valor_total_nota", "VALOR TOTAL DA NOTA", None, Decimal),
            Campo::ArquivoNfNome => info("arquivo_nf_nome", "ARQUIVO NF NOME", None, Texto),
            Campo::ArquivoOsNome => info("arquivo_os_nome", "ARQUIVO OS NOME", None, Texto),
            Campo::ArquivoAgendamentoNome => info("arquivo_agendamento_nome", "ARQUIVO AGENDAMENTO NOME", None, Texto),
            Campo::MotLoc => info("mot_loc", "MOTORISTA LOCAÇÃO", None, Texto),
            Campo::Carreta => info("carreta", "CARRETA", None, Texto),
            Campo::CarretaLoc => info("carreta_loc", "CARRETA LOCAÇÃO", None, Texto),
            Campo::LocCliente => info("loc_cliente", "LOCALIZAÇÃO CLIENTE", None, Texto),
            Campo::Arquivo => info("arquivo", "ARQUIVO", None, Anexo),
        }
    }

    /// Nome da coluna no banco
    pub fn db(&self) -> &'static str {
        self.info().db
    }

    /// Rótulo do formulário / planilha
    pub fn rotulo(&self) -> &'static str {
        self.info().rotulo
    }

    pub fn secao(&self) -> Option<Secao> {
        self.info().secao
    }

    pub fn tipo(&self) -> TipoCampo {
        self.info().tipo
    }

    pub fn is_gr(&self) -> bool {
        self.secao() == Some(Secao::Gr)
    }

    pub fn from_db(nome: &str) -> Option<Campo> {
        let nome = nome.trim();
        Campo::TODOS.iter().copied().find(|c| c.db() == nome)
    }

    /// Aceita o rótulo atual e as variantes antigas usadas pelos formulários.
    pub fn from_rotulo(rotulo: &str) -> Option<Campo> {
        let rotulo = rotulo.trim();
        if let Some(campo) = Campo::TODOS.iter().copied().find(|c| c.rotulo() == rotulo) {
            return Some(campo);
        }

        match rotulo.to_uppercase().as_str() {
            "CAVALO 1" | "CAVALO" | "PLACA" => Some(Campo::Placa),
            "DT CRIACAO SM" | "DT CRIAÇÃO SM" | "DATA SM" => Some(Campo::DataSm),
            "DT CRIACAO AE" | "DT CRIAÇÃO AE" | "DATA AE" => Some(Campo::DataAe),
            "NUMERO AE" | "NÚMERO AE" => Some(Campo::NumeroAe),
            "NÚMERO SM" | "NUMERO SM" => Some(Campo::NumeroSm),
            "OBSERVACAO OPERACIONAL" | "OBSERVAÇÃO OPERACIONAL" => Some(Campo::ObservacaoOperacional),
            "OBSERVACAO DE GR" | "OBSERVAÇÃO DE GR" => Some(Campo::ObservacaoGr),
            "ANEXAR AGENDAMENTO" => Some(Campo::AnexarAgendamento),
            "Nº NF" | "NF" | "NUMERO NF" => Some(Campo::NumeroNf),
            _ => None,
        }
    }
}

/// Nome vindo de formulário (rótulo ou coluna) para o campo do banco.
pub fn mapear_campo_para_db(nome: &str) -> Option<Campo> {
    Campo::from_db(nome).or_else(|| Campo::from_rotulo(nome))
}

/// Rótulo de formulário para uma coluna; nomes desconhecidos voltam como vieram.
pub fn mapear_db_para_campo(coluna: &str) -> String {
    match Campo::from_db(coluna) {
        Some(campo) => campo.rotulo().to_string(),
        None => coluna.to_string(),
    }
}

impl fmt::Display for Campo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.db())
    }
}

impl Serialize for Campo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.db())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogo_sem_duplicatas() {
        let dbs: HashSet<_> = Campo::TODOS.iter().map(|c| c.db()).collect();
        let rotulos: HashSet<_> = Campo::TODOS.iter().map(|c| c.rotulo()).collect();
        assert_eq!(dbs.len(), Campo::TODOS.len());
        assert_eq!(rotulos.len(), Campo::TODOS.len());
    }

    #[test]
    fn test_ida_e_volta_db() {
        for campo in Campo::TODOS {
            assert_eq!(Campo::from_db(campo.db()), Some(campo));
            assert_eq!(Campo::from_rotulo(campo.rotulo()), Some(campo));
        }
    }

    #[test]
    fn test_aliases_de_formulario() {
        assert_eq!(mapear_campo_para_db("CAVALO"), Some(Campo::Placa));
        assert_eq!(mapear_campo_para_db("CAVALO 1"), Some(Campo::Placa));
        assert_eq!(mapear_campo_para_db("DT CRIACAO SM"), Some(Campo::DataSm));
        assert_eq!(mapear_campo_para_db("NUMERO AE"), Some(Campo::NumeroAe));
        assert_eq!(mapear_campo_para_db("container_1"), Some(Campo::Container1));
        assert_eq!(mapear_campo_para_db("Anexar Agendamento"), Some(Campo::AnexarAgendamento));
        assert_eq!(mapear_campo_para_db("excluido"), None);
        assert_eq!(mapear_db_para_campo("placa"), "CAVALO");
        assert_eq!(mapear_db_para_campo("desconhecido"), "desconhecido");
    }

    #[test]
    fn test_secoes() {
        assert!(Campo::NumeroSm.is_gr());
        assert!(Campo::Gerenciadora.is_gr());
        assert!(!Campo::Placa.is_gr());
        assert_eq!(Campo::Placa.secao(), Some(Secao::Transporte));
        assert_eq!(Campo::NumeroNf.secao(), None);
        assert_eq!(Secao::Gr.icone(), "clipboard-list");
    }

    #[test]
    fn test_serializa_como_coluna() {
        assert_eq!(serde_json::to_string(&Campo::Container1).unwrap(), "\"container_1\"");
    }
}
