// src/db/memory_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        Changeset, ComercialRepository, GarantiaRepository, OrdemServicoRepository,
        TimelineRepository, UnitOfWork, Versionado,
    },
    models::{
        comercial::TratativaComercial,
        garantia::{GarantiaItem, TratativaGarantia},
        ordem_servico::OrdemServico,
        timeline::TimelineEntry,
    },
};

#[derive(Default)]
struct Tabelas {
    garantias: HashMap<Uuid, GarantiaItem>,
    tratativas: HashMap<Uuid, TratativaGarantia>,
    ordens: HashMap<Uuid, OrdemServico>,
    comerciais: HashMap<Uuid, TratativaComercial>,
    timeline: HashMap<Uuid, Vec<TimelineEntry>>,
    numero_os: i64,
}

/// Store em memória, usado em desenvolvimento local e nos testes. Cada
/// `commit` roda inteiro sob a trava de escrita.
#[derive(Default)]
pub struct MemoryStore {
    tabelas: RwLock<Tabelas>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn checar_versao<T: Versionado>(
    tabela: &HashMap<Uuid, T>,
    novo: &T,
) -> Result<(), AppError> {
    let atual = tabela.get(&novo.chave()).map(Versionado::versao).unwrap_or(0);
    if atual != novo.versao() - 1 {
        return Err(AppError::VersionConflict {
            entidade: T::ENTIDADE,
            id: novo.chave(),
            esperada: novo.versao() - 1,
            atual,
        });
    }
    Ok(())
}

#[async_trait]
impl GarantiaRepository for MemoryStore {
    async fn get_garantia(&self, id: Uuid) -> Result<Option<GarantiaItem>, AppError> {
        Ok(self.tabelas.read().await.garantias.get(&id).cloned())
    }

    async fn find_garantias_by_imei(&self, imei: &str) -> Result<Vec<GarantiaItem>, AppError> {
        let tabelas = self.tabelas.read().await;
        let mut garantias: Vec<GarantiaItem> = tabelas
            .garantias
            .values()
            .filter(|g| g.imei == imei)
            .cloned()
            .collect();
        garantias.sort_by_key(|g| g.criado_em);
        Ok(garantias)
    }

    async fn get_tratativa(&self, id: Uuid) -> Result<Option<TratativaGarantia>, AppError> {
        Ok(self.tabelas.read().await.tratativas.get(&id).cloned())
    }

    async fn list_tratativas_by_garantia(
        &self,
        garantia_id: Uuid,
    ) -> Result<Vec<TratativaGarantia>, AppError> {
        let tabelas = self.tabelas.read().await;
        let mut tratativas: Vec<TratativaGarantia> = tabelas
            .tratativas
            .values()
            .filter(|t| t.garantia_id == garantia_id)
            .cloned()
            .collect();
        tratativas.sort_by_key(|t| t.aberta_em);
        Ok(tratativas)
    }

    async fn list_tratativas_em_andamento(&self) -> Result<Vec<TratativaGarantia>, AppError> {
        let tabelas = self.tabelas.read().await;
        Ok(tabelas
            .tratativas
            .values()
            .filter(|t| t.em_andamento())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrdemServicoRepository for MemoryStore {
    async fn get_os(&self, id: Uuid) -> Result<Option<OrdemServico>, AppError> {
        Ok(self.tabelas.read().await.ordens.get(&id).cloned())
    }

    async fn list_os_abertas(&self) -> Result<Vec<OrdemServico>, AppError> {
        let tabelas = self.tabelas.read().await;
        let mut ordens: Vec<OrdemServico> = tabelas
            .ordens
            .values()
            .filter(|os| os.aberta())
            .cloned()
            .collect();
        ordens.sort_by_key(|os| os.numero);
        Ok(ordens)
    }

    async fn next_numero_os(&self) -> Result<i64, AppError> {
        let mut tabelas = self.tabelas.write().await;
        tabelas.numero_os += 1;
        Ok(tabelas.numero_os)
    }
}

#[async_trait]
impl TimelineRepository for MemoryStore {
    async fn list_timeline(&self, caso_id: Uuid) -> Result<Vec<TimelineEntry>, AppError> {
        let tabelas = self.tabelas.read().await;
        Ok(tabelas.timeline.get(&caso_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ComercialRepository for MemoryStore {
    async fn get_comercial(&self, id: Uuid) -> Result<Option<TratativaComercial>, AppError> {
        Ok(self.tabelas.read().await.comerciais.get(&id).cloned())
    }

    async fn list_comerciais_by_garantia(
        &self,
        garantia_id: Uuid,
    ) -> Result<Vec<TratativaComercial>, AppError> {
        let tabelas = self.tabelas.read().await;
        let mut comerciais: Vec<TratativaComercial> = tabelas
            .comerciais
            .values()
            .filter(|c| c.garantia_id == garantia_id)
            .cloned()
            .collect();
        comerciais.sort_by_key(|c| c.criada_em);
        Ok(comerciais)
    }

    async fn list_notificacoes_pendentes(&self) -> Result<Vec<TratativaComercial>, AppError> {
        let tabelas = self.tabelas.read().await;
        Ok(tabelas
            .comerciais
            .values()
            .filter(|c| c.notificacao_financeiro.pendente())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn commit(&self, changes: Changeset) -> Result<Vec<TimelineEntry>, AppError> {
        let mut tabelas = self.tabelas.write().await;

        // 1. Valida todas as versões antes de aplicar qualquer coisa
        for g in &changes.garantias {
            checar_versao(&tabelas.garantias, g)?;
        }
        for t in &changes.tratativas {
            checar_versao(&tabelas.tratativas, t)?;
        }
        for os in &changes.ordens {
            checar_versao(&tabelas.ordens, os)?;
        }
        for c in &changes.comerciais {
            checar_versao(&tabelas.comerciais, c)?;
        }

        // 2. Aplica os snapshots
        for g in changes.garantias {
            tabelas.garantias.insert(g.id, g);
        }
        for t in changes.tratativas {
            tabelas.tratativas.insert(t.id, t);
        }
        for os in changes.ordens {
            tabelas.ordens.insert(os.id, os);
        }
        for c in changes.comerciais {
            tabelas.comerciais.insert(c.id, c);
        }

        // 3. Anexa a timeline, sequenciando por caso
        let mut gravadas = Vec::with_capacity(changes.timeline.len());
        for nova in changes.timeline {
            let stream = tabelas.timeline.entry(nova.caso_id).or_default();
            let entry = nova.into_entry(stream.len() as i64 + 1);
            stream.push(entry.clone());
            gravadas.push(entry);
        }

        Ok(gravadas)
    }
}
