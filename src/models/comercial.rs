// src/models/comercial.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::ordem_servico::MeioPagamento;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NivelPlano {
    Silver,
    Gold,
}

impl fmt::Display for NivelPlano {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NivelPlano::Silver => f.write_str("Silver"),
            NivelPlano::Gold => f.write_str("Gold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoComercial {
    ContatoRealizado,
    AdesaoSilver,
    AdesaoGold,
}

impl From<NivelPlano> for TipoComercial {
    fn from(nivel: NivelPlano) -> Self {
        match nivel {
            NivelPlano::Silver => TipoComercial::AdesaoSilver,
            NivelPlano::Gold => TipoComercial::AdesaoGold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusAdesao {
    PendenteFinanceiro,
    Concluida,
    Rejeitada,
}

impl fmt::Display for StatusAdesao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusAdesao::PendenteFinanceiro => "Pendente no financeiro",
            StatusAdesao::Concluida => "Concluída",
            StatusAdesao::Rejeitada => "Rejeitada",
        };
        f.write_str(s)
    }
}

/// Progresso durável da adesão. `Confirmacao1` é a "intenção" gravada;
/// `Registrada` só existe depois da segunda confirmação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EtapaAdesao {
    PlanoSelecionado,
    PagamentoConfigurado,
    Confirmacao1,
    Registrada,
}

impl fmt::Display for EtapaAdesao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EtapaAdesao::PlanoSelecionado => "Plano selecionado",
            EtapaAdesao::PagamentoConfigurado => "Pagamento configurado",
            EtapaAdesao::Confirmacao1 => "Primeira confirmação",
            EtapaAdesao::Registrada => "Registrada",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "situacao", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificacaoFinanceiro {
    NaoAplicavel,
    #[serde(rename_all = "camelCase")]
    Pendente {
        tentativas: u32,
        ultimo_erro: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Entregue { em: DateTime<Utc> },
}

impl NotificacaoFinanceiro {
    pub fn pendente(&self) -> bool {
        matches!(self, NotificacaoFinanceiro::Pendente { .. })
    }
}

// --- Structs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanoGarantia {
    pub id: String,
    pub nome: String,
    pub nivel: NivelPlano,
    pub meses: u32,
    pub valor: Decimal,
    #[serde(default)]
    pub modelos: Vec<String>,
}

impl PlanoGarantia {
    pub fn compativel_com(&self, modelo: &str) -> bool {
        self.modelos
            .iter()
            .any(|m| m.trim().eq_ignore_ascii_case(modelo.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagamentoAdesao {
    pub meio: MeioPagamento,
    pub valor: Decimal,
    pub parcelas: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Confirmacao {
    pub responsavel_id: String,
    pub responsavel_nome: String,
    pub confirmado_em: DateTime<Utc>,
    pub observacao: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TratativaComercial {
    pub id: Uuid,
    pub garantia_id: Uuid,
    pub tipo: TipoComercial,
    pub descricao: String,
    pub etapa: Option<EtapaAdesao>,
    pub plano: Option<PlanoGarantia>,
    pub plano_por_fallback: bool,
    pub pagamento: Option<PagamentoAdesao>,
    pub confirmacao1: Option<Confirmacao>,
    pub confirmacao2: Option<Confirmacao>,
    pub status_adesao: Option<StatusAdesao>,
    pub venda_conferencia_id: Option<Uuid>,
    pub nova_data_fim: Option<NaiveDate>,
    /// Fim da garantia antes do registro; volta a valer se o financeiro
    /// recusar a adesão.
    #[serde(default)]
    pub data_fim_anterior: Option<NaiveDate>,
    pub notificacao_financeiro: NotificacaoFinanceiro,
    pub criada_em: DateTime<Utc>,
    pub versao: i64,
}
