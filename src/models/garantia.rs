// src/models/garantia.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use utoipa::ToSchema;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoGarantia {
    Fabricante,
    Loja,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusGarantia {
    Ativa,
    EmTratativa,
    Concluida,
}

impl fmt::Display for StatusGarantia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusGarantia::Ativa => "Ativa",
            StatusGarantia::EmTratativa => "Em tratativa",
            StatusGarantia::Concluida => "Concluída",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoTratativa {
    DirecionadoApple,
    EncaminhadoAssistencia,
    AssistenciaMaisEmprestimo,
    TrocaDireta,
}

impl TipoTratativa {
    /// Tipos que exigem reparo físico (e portanto uma OS e a trava do IMEI).
    pub fn exige_assistencia(&self) -> bool {
        matches!(
            self,
            TipoTratativa::EncaminhadoAssistencia | TipoTratativa::AssistenciaMaisEmprestimo
        )
    }
}

impl fmt::Display for TipoTratativa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TipoTratativa::DirecionadoApple => "Direcionado Apple",
            TipoTratativa::EncaminhadoAssistencia => "Encaminhado Assistência",
            TipoTratativa::AssistenciaMaisEmprestimo => "Assistência + Empréstimo",
            TipoTratativa::TrocaDireta => "Troca Direta",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusTratativa {
    EmAndamento,
    Concluido,
}

impl fmt::Display for StatusTratativa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusTratativa::EmAndamento => f.write_str("Em andamento"),
            StatusTratativa::Concluido => f.write_str("Concluído"),
        }
    }
}

// --- Structs ---

/// Garantia de um aparelho vendido. Nunca é apagada: o status caminha até
/// `Concluida`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GarantiaItem {
    pub id: Uuid,
    pub venda_id: Uuid,
    pub imei: String,
    pub modelo: String,
    pub cliente_nome: Option<String>,
    pub tipo_garantia: TipoGarantia,
    pub data_inicio_garantia: NaiveDate,
    pub data_fim_garantia: NaiveDate,
    pub status: StatusGarantia,
    pub criado_em: DateTime<Utc>,
    pub versao: i64,
}

impl GarantiaItem {
    /// A garantia ainda cobre o aparelho em `hoje` (o último dia conta).
    pub fn vigente_em(&self, hoje: NaiveDate) -> bool {
        self.data_fim_garantia >= hoje
    }
}

/// Tratativa escolhida para uma garantia. `garantia_id` é só uma referência.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TratativaGarantia {
    pub id: Uuid,
    pub garantia_id: Uuid,
    pub imei: String,
    pub tipo: TipoTratativa,
    pub status: StatusTratativa,
    pub descricao: String,

    // Vínculos opcionais, dependendo do tipo
    pub os_id: Option<Uuid>,
    pub aparelho_emprestado_id: Option<String>,
    pub aparelho_troca_id: Option<String>,
    pub venda_troca_id: Option<Uuid>,

    // Devolução do aparelho emprestado
    pub foto_devolucao: Option<String>,
    pub emprestimo_devolvido_em: Option<DateTime<Utc>>,

    pub aberta_em: DateTime<Utc>,
    pub concluida_em: Option<DateTime<Utc>>,
    pub versao: i64,
}

impl TratativaGarantia {
    pub fn em_andamento(&self) -> bool {
        self.status == StatusTratativa::EmAndamento
    }

    /// O empréstimo, se houve, já voltou para a loja.
    pub fn emprestimo_resolvido(&self) -> bool {
        self.aparelho_emprestado_id.is_none() || self.emprestimo_devolvido_em.is_some()
    }
}
