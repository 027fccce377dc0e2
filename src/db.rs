// src/db.rs
//
// Repositórios injetáveis. O motor só enxerga estes traits; a implementação
// concreta (memória ou Postgres) é escolhida no bootstrap.

pub mod memory_repo;
pub mod postgres_repo;

pub use memory_repo::MemoryStore;
pub use postgres_repo::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        comercial::TratativaComercial,
        garantia::{GarantiaItem, TratativaGarantia},
        ordem_servico::OrdemServico,
        timeline::{NovaEntrada, TimelineEntry},
    },
};

#[async_trait]
pub trait GarantiaRepository: Send + Sync {
    async fn get_garantia(&self, id: Uuid) -> Result<Option<GarantiaItem>, AppError>;

    async fn find_garantias_by_imei(&self, imei: &str) -> Result<Vec<GarantiaItem>, AppError>;

    async fn get_tratativa(&self, id: Uuid) -> Result<Option<TratativaGarantia>, AppError>;

    async fn list_tratativas_by_garantia(
        &self,
        garantia_id: Uuid,
    ) -> Result<Vec<TratativaGarantia>, AppError>;

    async fn list_tratativas_em_andamento(&self) -> Result<Vec<TratativaGarantia>, AppError>;
}

#[async_trait]
pub trait OrdemServicoRepository: Send + Sync {
    async fn get_os(&self, id: Uuid) -> Result<Option<OrdemServico>, AppError>;

    async fn list_os_abertas(&self) -> Result<Vec<OrdemServico>, AppError>;

    /// Próximo número de exibição da OS (sequencial, nunca reaproveitado).
    async fn next_numero_os(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait TimelineRepository: Send + Sync {
    /// Entradas do caso na ordem de inserção.
    async fn list_timeline(&self, caso_id: Uuid) -> Result<Vec<TimelineEntry>, AppError>;
}

#[async_trait]
pub trait ComercialRepository: Send + Sync {
    async fn get_comercial(&self, id: Uuid) -> Result<Option<TratativaComercial>, AppError>;

    async fn list_comerciais_by_garantia(
        &self,
        garantia_id: Uuid,
    ) -> Result<Vec<TratativaComercial>, AppError>;

    async fn list_notificacoes_pendentes(&self) -> Result<Vec<TratativaComercial>, AppError>;
}

/// Tudo o que uma operação grava. É aplicado de uma vez: ou todas as
/// mudanças entram, ou nenhuma.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    pub garantias: Vec<GarantiaItem>,
    pub tratativas: Vec<TratativaGarantia>,
    pub ordens: Vec<OrdemServico>,
    pub comerciais: Vec<TratativaComercial>,
    pub timeline: Vec<NovaEntrada>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Grava os snapshots (com checagem otimista de versão) e anexa as
    /// entradas de timeline. Devolve as entradas já sequenciadas.
    async fn commit(&self, changes: Changeset) -> Result<Vec<TimelineEntry>, AppError>;
}

pub trait Store:
    GarantiaRepository + OrdemServicoRepository + TimelineRepository + ComercialRepository + UnitOfWork
{
}

impl<T> Store for T where
    T: GarantiaRepository
        + OrdemServicoRepository
        + TimelineRepository
        + ComercialRepository
        + UnitOfWork
{
}

/// Snapshot com versão monotônica. `versao` é a versão NOVA que está sendo
/// gravada; o repositório exige que a atual seja `versao - 1`.
pub trait Versionado {
    const ENTIDADE: &'static str;

    fn chave(&self) -> Uuid;
    fn versao(&self) -> i64;
}

impl Versionado for GarantiaItem {
    const ENTIDADE: &'static str = "garantia";

    fn chave(&self) -> Uuid {
        self.id
    }
    fn versao(&self) -> i64 {
        self.versao
    }
}

impl Versionado for TratativaGarantia {
    const ENTIDADE: &'static str = "tratativa";

    fn chave(&self) -> Uuid {
        self.id
    }
    fn versao(&self) -> i64 {
        self.versao
    }
}

impl Versionado for OrdemServico {
    const ENTIDADE: &'static str = "ordem_servico";

    fn chave(&self) -> Uuid {
        self.id
    }
    fn versao(&self) -> i64 {
        self.versao
    }
}

impl Versionado for TratativaComercial {
    const ENTIDADE: &'static str = "tratativa_comercial";

    fn chave(&self) -> Uuid {
        self.id
    }
    fn versao(&self) -> i64 {
        self.versao
    }
}
