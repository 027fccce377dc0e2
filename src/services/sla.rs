// src/services/sla.rs

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

pub const LIMITE_NORMAL_DIAS: i64 = 3;
pub const LIMITE_ATENCAO_DIAS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NivelSla {
    Normal,
    Atencao,
    Critico,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sla {
    pub dias_aberto: i64,
    pub nivel: NivelSla,
}

/// Idade do caso em dias corridos e a faixa correspondente.
/// Função pura: nada é gravado, recalcula-se a cada leitura.
pub fn compute_sla(aberto_em: NaiveDate, hoje: NaiveDate) -> Sla {
    let dias_aberto = (hoje - aberto_em).num_days().max(0);
    let nivel = match dias_aberto {
        d if d <= LIMITE_NORMAL_DIAS => NivelSla::Normal,
        d if d <= LIMITE_ATENCAO_DIAS => NivelSla::Atencao,
        _ => NivelSla::Critico,
    };
    Sla { dias_aberto, nivel }
}
