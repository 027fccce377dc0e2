// src/services/engine.rs

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    common::error::AppError,
    db::Store,
    services::{
        adhesion_service::AdhesionService,
        clock::Clock,
        collaborators::{Catalog, Finance, Inventory, SalesLedger},
        service_order_service::ServiceOrderService,
        timeline_service::TimelineService,
        treatment_service::TreatmentService,
        warranty_service::WarrantyService,
        Deps,
    },
};

/// Ponto de entrada do motor: um serviço por fluxo, todos sobre as mesmas
/// dependências (store, travas, colaboradores, relógio).
#[derive(Clone)]
pub struct WarrantyEngine {
    pub deps: Deps,
    pub garantias: WarrantyService,
    pub tratativas: TreatmentService,
    pub ordens: ServiceOrderService,
    pub adesoes: AdhesionService,
    pub timeline: TimelineService,
}

impl WarrantyEngine {
    pub fn new(
        store: Arc<dyn Store>,
        inventory: Arc<dyn Inventory>,
        sales: Arc<dyn SalesLedger>,
        finance: Arc<dyn Finance>,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let deps = Deps::new(store, inventory, sales, finance, catalog, clock);
        let ordens = ServiceOrderService::new(deps.clone());
        Self {
            garantias: WarrantyService::new(deps.clone()),
            tratativas: TreatmentService::new(deps.clone(), ordens.clone()),
            adesoes: AdhesionService::new(deps.clone()),
            timeline: deps.timeline.clone(),
            ordens,
            deps,
        }
    }

    /// Recarrega as travas de IMEI a partir das tratativas em andamento.
    /// Chamado uma vez na subida, antes de aceitar requisições.
    pub async fn hydrate(&self) -> Result<usize, AppError> {
        let abertas = self.deps.store.list_tratativas_em_andamento().await?;
        self.deps.guard.hydrate(abertas.iter());
        Ok(abertas.len())
    }

    /// IMEIs em que a trava e as tratativas gravadas discordam. Vazio quando
    /// o motor está consistente.
    pub async fn lock_divergences(&self) -> Result<Vec<String>, AppError> {
        let abertas: BTreeSet<String> = self
            .deps
            .store
            .list_tratativas_em_andamento()
            .await?
            .into_iter()
            .map(|t| t.imei)
            .collect();
        let travadas: BTreeSet<String> = self.deps.guard.locked_imeis().into_iter().collect();

        Ok(abertas.symmetric_difference(&travadas).cloned().collect())
    }
}
