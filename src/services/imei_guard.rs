// src/services/imei_guard.rs

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use uuid::Uuid;

use crate::{common::error::AppError, models::garantia::TratativaGarantia};

/// Dono atual da trava de um IMEI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosseImei {
    pub tratativa_id: Uuid,
    pub garantia_id: Uuid,
}

/// Resultado de `release`: liberar um IMEI livre não é erro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liberacao {
    Liberado(PosseImei),
    JaLivre,
}

/// No máximo uma tratativa em andamento por IMEI.
#[derive(Clone, Default)]
pub struct ImeiGuard {
    travas: Arc<DashMap<String, PosseImei>>,
}

impl ImeiGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstrói as travas a partir das tratativas em andamento gravadas.
    pub fn hydrate<'a>(&self, tratativas: impl IntoIterator<Item = &'a TratativaGarantia>) {
        for t in tratativas.into_iter().filter(|t| t.em_andamento()) {
            self.travas.insert(
                t.imei.clone(),
                PosseImei {
                    tratativa_id: t.id,
                    garantia_id: t.garantia_id,
                },
            );
        }
        tracing::info!(travas = self.travas.len(), "Travas de IMEI reconstruídas");
    }

    /// Reserva o IMEI para a tratativa. A reserva se desfaz sozinha se for
    /// descartada sem `confirmar()`.
    pub fn try_acquire(
        &self,
        imei: &str,
        tratativa_id: Uuid,
        garantia_id: Uuid,
    ) -> Result<ReservaImei, AppError> {
        match self.travas.entry(imei.to_string()) {
            Entry::Occupied(ocupada) => {
                let dono = *ocupada.get();
                Err(AppError::ActiveTreatmentConflict {
                    imei: imei.to_string(),
                    tratativa_id: dono.tratativa_id,
                    garantia_id: dono.garantia_id,
                })
            }
            Entry::Vacant(livre) => {
                livre.insert(PosseImei {
                    tratativa_id,
                    garantia_id,
                });
                Ok(ReservaImei {
                    travas: self.travas.clone(),
                    imei: imei.to_string(),
                    tratativa_id,
                    confirmada: false,
                })
            }
        }
    }

    /// Erro de conflito se o IMEI estiver travado, sem reservar nada.
    pub fn ensure_free(&self, imei: &str) -> Result<(), AppError> {
        match self.holder(imei) {
            Some(dono) => Err(AppError::ActiveTreatmentConflict {
                imei: imei.to_string(),
                tratativa_id: dono.tratativa_id,
                garantia_id: dono.garantia_id,
            }),
            None => Ok(()),
        }
    }

    pub fn release(&self, imei: &str) -> Liberacao {
        match self.travas.remove(imei) {
            Some((_, dono)) => Liberacao::Liberado(dono),
            None => Liberacao::JaLivre,
        }
    }

    pub fn is_locked(&self, imei: &str) -> bool {
        self.travas.contains_key(imei)
    }

    pub fn holder(&self, imei: &str) -> Option<PosseImei> {
        self.travas.get(imei).map(|p| *p)
    }

    pub fn locked_imeis(&self) -> Vec<String> {
        self.travas.iter().map(|e| e.key().clone()).collect()
    }
}

/// Reserva de um IMEI ainda não ligada a uma tratativa gravada.
#[must_use = "a reserva é desfeita ao ser descartada sem confirmar()"]
pub struct ReservaImei {
    travas: Arc<DashMap<String, PosseImei>>,
    imei: String,
    tratativa_id: Uuid,
    confirmada: bool,
}

impl ReservaImei {
    /// Chamado depois do commit da tratativa que detém a trava.
    pub fn confirmar(mut self) {
        self.confirmada = true;
    }
}

impl Drop for ReservaImei {
    fn drop(&mut self) {
        if self.confirmada {
            return;
        }
        let tratativa_id = self.tratativa_id;
        let removida = self
            .travas
            .remove_if(&self.imei, |_, dono| dono.tratativa_id == tratativa_id);
        if removida.is_some() {
            tracing::debug!(imei = %self.imei, %tratativa_id, "Reserva de IMEI desfeita");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_reports_the_holder() {
        let guard = ImeiGuard::new();
        let primeira = Uuid::new_v4();
        guard
            .try_acquire("356789", primeira, Uuid::new_v4())
            .unwrap()
            .confirmar();

        match guard.try_acquire("356789", Uuid::new_v4(), Uuid::new_v4()) {
            Err(AppError::ActiveTreatmentConflict { tratativa_id, .. }) => {
                assert_eq!(tratativa_id, primeira)
            }
            Err(outro) => panic!("erro inesperado: {outro}"),
            Ok(_) => panic!("IMEI travado não pode ser reservado de novo"),
        }
    }

    #[test]
    fn dropped_reservation_rolls_back() {
        let guard = ImeiGuard::new();
        {
            let _reserva = guard.try_acquire("111", Uuid::new_v4(), Uuid::new_v4()).unwrap();
            assert!(guard.is_locked("111"));
        }
        assert!(!guard.is_locked("111"));
    }

    #[test]
    fn release_is_idempotent() {
        let guard = ImeiGuard::new();
        guard
            .try_acquire("222", Uuid::new_v4(), Uuid::new_v4())
            .unwrap()
            .confirmar();

        assert!(matches!(guard.release("222"), Liberacao::Liberado(_)));
        assert_eq!(guard.release("222"), Liberacao::JaLivre);
        assert_eq!(guard.release("nunca-travado"), Liberacao::JaLivre);
    }
}
