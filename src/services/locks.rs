// src/services/locks.rs

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Mutex por chave. Serializa as mutações de uma mesma entidade (IMEI,
/// garantia, OS, adesão) sem travar as demais.
///
/// Ordem de aquisição dentro de uma operação: imei → os → garantia → comercial.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub type KeyGuard = OwnedMutexGuard<()>;

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, chave: String) -> KeyGuard {
        // O clone do Arc sai do DashMap antes do await
        let mutex = self
            .locks
            .entry(chave)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    pub async fn imei(&self, imei: &str) -> KeyGuard {
        self.lock(format!("imei:{imei}")).await
    }

    pub async fn garantia(&self, id: Uuid) -> KeyGuard {
        self.lock(format!("garantia:{id}")).await
    }

    pub async fn os(&self, id: Uuid) -> KeyGuard {
        self.lock(format!("os:{id}")).await
    }

    pub async fn comercial(&self, id: Uuid) -> KeyGuard {
        self.lock(format!("comercial:{id}")).await
    }

    /// Remove as chaves que ninguém está usando.
    pub fn prune(&self) {
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
    }
}
