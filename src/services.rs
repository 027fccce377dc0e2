// src/services.rs

pub mod adhesion_service;
pub mod clock;
pub mod collaborators;
pub mod engine;
pub mod imei_guard;
pub mod locks;
pub mod service_order_service;
pub mod sla;
pub mod timeline_service;
pub mod treatment_service;
pub mod warranty_service;

use std::sync::Arc;

use crate::{
    db::Store,
    services::{
        clock::Clock,
        collaborators::{Catalog, Finance, Inventory, SalesLedger},
        imei_guard::ImeiGuard,
        locks::KeyedLocks,
        timeline_service::TimelineService,
    },
};

/// Resultado de operações idempotentes: repetir não é erro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Efeito {
    Aplicado,
    NoOp,
}

/// Dependências compartilhadas pelos serviços do motor.
#[derive(Clone)]
pub struct Deps {
    pub store: Arc<dyn Store>,
    pub guard: ImeiGuard,
    pub locks: KeyedLocks,
    pub timeline: TimelineService,
    pub inventory: Arc<dyn Inventory>,
    pub sales: Arc<dyn SalesLedger>,
    pub finance: Arc<dyn Finance>,
    pub catalog: Arc<dyn Catalog>,
    pub clock: Arc<dyn Clock>,
}

impl Deps {
    pub fn new(
        store: Arc<dyn Store>,
        inventory: Arc<dyn Inventory>,
        sales: Arc<dyn SalesLedger>,
        finance: Arc<dyn Finance>,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            timeline: TimelineService::new(store.clone(), clock.clone()),
            store,
            guard: ImeiGuard::new(),
            locks: KeyedLocks::new(),
            inventory,
            sales,
            finance,
            catalog,
            clock,
        }
    }
}
