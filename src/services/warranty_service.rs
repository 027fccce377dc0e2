// src/services/warranty_service.rs

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::Changeset,
    models::{
        comercial::TratativaComercial,
        garantia::{GarantiaItem, StatusGarantia, TipoGarantia, TratativaGarantia},
        timeline::{TipoEvento, Usuario},
    },
    services::{
        sla::{compute_sla, Sla},
        Deps,
    },
};

#[derive(Debug, Clone)]
pub struct NovaGarantia {
    pub venda_id: Uuid,
    pub imei: String,
    pub modelo: String,
    pub cliente_nome: Option<String>,
    pub tipo_garantia: TipoGarantia,
    pub data_inicio_garantia: NaiveDate,
    pub data_fim_garantia: NaiveDate,
}

/// Leitura completa de uma garantia, com os campos derivados do dia.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GarantiaDetalhe {
    #[serde(flatten)]
    pub garantia: GarantiaItem,
    pub vigente: bool,
    pub tratativas: Vec<TratativaGarantia>,
    pub tratativas_comerciais: Vec<TratativaComercial>,
    /// Idade da tratativa em andamento, se houver.
    pub sla: Option<Sla>,
}

#[derive(Clone)]
pub struct WarrantyService {
    deps: Deps,
}

impl WarrantyService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// Registra a garantia do aparelho vendido. Se a mesma venda já tem
    /// garantia para o IMEI, devolve a existente.
    pub async fn register_claim(
        &self,
        nova: NovaGarantia,
        usuario: &Usuario,
    ) -> Result<GarantiaItem, AppError> {
        let imei = nova.imei.trim().to_string();
        if imei.is_empty() {
            return Err(AppError::MissingRequiredField("imei".into()));
        }
        if nova.modelo.trim().is_empty() {
            return Err(AppError::MissingRequiredField("modelo".into()));
        }
        if nova.data_fim_garantia < nova.data_inicio_garantia {
            return Err(AppError::invalid_transition(
                "-",
                StatusGarantia::Ativa,
                format!(
                    "fim da garantia ({}) anterior ao início ({})",
                    nova.data_fim_garantia, nova.data_inicio_garantia
                ),
            ));
        }

        let _trava_imei = self.deps.locks.imei(&imei).await;

        let existentes = self.deps.store.find_garantias_by_imei(&imei).await?;
        if let Some(existente) = existentes.into_iter().find(|g| g.venda_id == nova.venda_id) {
            tracing::debug!(garantia_id = %existente.id, "Garantia já registrada para a venda");
            return Ok(existente);
        }

        let garantia = GarantiaItem {
            id: Uuid::new_v4(),
            venda_id: nova.venda_id,
            imei,
            modelo: nova.modelo.trim().to_string(),
            cliente_nome: nova.cliente_nome,
            tipo_garantia: nova.tipo_garantia,
            data_inicio_garantia: nova.data_inicio_garantia,
            data_fim_garantia: nova.data_fim_garantia,
            status: StatusGarantia::Ativa,
            criado_em: self.deps.clock.now(),
            versao: 1,
        };

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia.id,
            TipoEvento::Abertura,
            "Garantia registrada",
            format!(
                "{} (IMEI {}) com garantia {:?} até {}",
                garantia.modelo, garantia.imei, garantia.tipo_garantia, garantia.data_fim_garantia
            ),
            usuario,
        ));
        changes.garantias.push(garantia.clone());
        self.deps.store.commit(changes).await?;

        tracing::info!(garantia_id = %garantia.id, imei = %garantia.imei, "✅ Garantia registrada");
        Ok(garantia)
    }

    pub async fn get_claim(&self, id: Uuid) -> Result<GarantiaDetalhe, AppError> {
        let garantia = self.load(id).await?;
        let tratativas = self.deps.store.list_tratativas_by_garantia(id).await?;
        let tratativas_comerciais = self.deps.store.list_comerciais_by_garantia(id).await?;

        let hoje = self.deps.clock.today();
        let sla = tratativas
            .iter()
            .find(|t| t.em_andamento())
            .map(|t| compute_sla(t.aberta_em.date_naive(), hoje));

        Ok(GarantiaDetalhe {
            vigente: garantia.vigente_em(hoje),
            garantia,
            tratativas,
            tratativas_comerciais,
            sla,
        })
    }

    pub async fn find_by_imei(&self, imei: &str) -> Result<Vec<GarantiaItem>, AppError> {
        self.deps.store.find_garantias_by_imei(imei.trim()).await
    }

    pub(crate) async fn load(&self, id: Uuid) -> Result<GarantiaItem, AppError> {
        self.deps
            .store
            .get_garantia(id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Garantia {id}")))
    }
}
