// src/services/timeline_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::Store,
    models::timeline::{NovaEntrada, TimelineEntry, TipoEvento, Usuario},
    services::clock::Clock,
};

/// Livro de auditoria por caso. As entradas só entram via `Changeset`,
/// junto com a transição que as gerou.
#[derive(Clone)]
pub struct TimelineService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl TimelineService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn entrada(
        &self,
        caso_id: Uuid,
        tipo: TipoEvento,
        titulo: impl Into<String>,
        descricao: impl Into<String>,
        usuario: &Usuario,
    ) -> NovaEntrada {
        NovaEntrada {
            caso_id,
            data: self.clock.now(),
            tipo,
            titulo: titulo.into(),
            descricao: descricao.into(),
            usuario: usuario.clone(),
        }
    }

    pub async fn get_case_timeline(&self, caso_id: Uuid) -> Result<Vec<TimelineEntry>, AppError> {
        let mut entradas = self.store.list_timeline(caso_id).await?;
        entradas.sort_by(|a, b| (a.data, a.sequencia).cmp(&(b.data, b.sequencia)));
        Ok(entradas)
    }
}
