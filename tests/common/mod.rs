// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use garantias_backend::{
    common::error::AppError,
    db::MemoryStore,
    models::{
        comercial::TratativaComercial,
        garantia::{GarantiaItem, TipoGarantia, TipoTratativa},
        ordem_servico::OrigemOS,
        timeline::Usuario,
    },
    services::{
        clock::FixedClock,
        collaborators::{Finance, Inventory, LocalInventory, LocalSalesLedger, StaticCatalog},
        engine::WarrantyEngine,
        service_order_service::{NovaOS, NovaPeca},
        treatment_service::{IniciarTratativa, TratativaIniciada},
        warranty_service::NovaGarantia,
    },
};

/// Financeiro de teste: falha as primeiras `falhas` chamadas.
#[derive(Default)]
pub struct FlakyFinance {
    falhas_restantes: AtomicUsize,
    tentativas: AtomicUsize,
    entregues: AtomicUsize,
}

impl FlakyFinance {
    pub fn failing(falhas: usize) -> Self {
        Self {
            falhas_restantes: AtomicUsize::new(falhas),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.tentativas.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.entregues.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Finance for FlakyFinance {
    async fn notify_adhesion(&self, _adesao: &TratativaComercial) -> Result<(), AppError> {
        self.tentativas.fetch_add(1, Ordering::SeqCst);
        let falhar = self
            .falhas_restantes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if falhar {
            return Err(AppError::collaborator("financeiro", "timeout"));
        }
        self.entregues.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Estoque de teste: recusa as primeiras `falhas` devoluções de empréstimo.
pub struct FlakyInventory {
    local: Arc<LocalInventory>,
    falhas_restantes: AtomicUsize,
}

#[async_trait]
impl Inventory for FlakyInventory {
    async fn debit_part(&self, sku: &str, quantidade: u32) -> Result<(), AppError> {
        self.local.debit_part(sku, quantidade).await
    }

    async fn allocate_loaner(&self, modelo: &str) -> Result<String, AppError> {
        self.local.allocate_loaner(modelo).await
    }

    async fn return_loaner(&self, aparelho_id: &str) -> Result<(), AppError> {
        let falhar = self
            .falhas_restantes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if falhar {
            return Err(AppError::collaborator("estoque", "timeout"));
        }
        self.local.return_loaner(aparelho_id).await
    }
}

pub struct Harness {
    pub engine: WarrantyEngine,
    pub clock: Arc<FixedClock>,
    pub inventory: Arc<LocalInventory>,
    pub sales: Arc<LocalSalesLedger>,
    pub finance: Arc<FlakyFinance>,
    pub usuario: Usuario,
}

pub fn hoje() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn vigente() -> NaiveDate {
    NaiveDate::from_ymd_opt(2027, 6, 1).unwrap()
}

pub fn expirada() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
}

pub fn harness() -> Harness {
    harness_with_finance(FlakyFinance::default())
}

pub fn harness_with_finance(finance: FlakyFinance) -> Harness {
    montar(finance, 0)
}

/// O motor enxerga um estoque que falha as primeiras `falhas` devoluções;
/// `Harness::inventory` continua sendo o estoque real por trás dele.
pub fn harness_with_flaky_returns(falhas: usize) -> Harness {
    montar(FlakyFinance::default(), falhas)
}

fn montar(finance: FlakyFinance, falhas_devolucao: usize) -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
    ));
    let inventory = Arc::new(
        LocalInventory::new()
            .with_stock("TELA-13", 2)
            .with_stock("BAT-13", 1)
            .with_loaner("EMP-1", "iPhone 13")
            .with_loaner("EMP-2", "iPhone 13"),
    );
    let sales = Arc::new(LocalSalesLedger::new());
    let finance = Arc::new(finance);

    let estoque: Arc<dyn Inventory> = if falhas_devolucao > 0 {
        Arc::new(FlakyInventory {
            local: inventory.clone(),
            falhas_restantes: AtomicUsize::new(falhas_devolucao),
        })
    } else {
        inventory.clone()
    };

    let engine = WarrantyEngine::new(
        Arc::new(MemoryStore::new()),
        estoque,
        sales.clone(),
        finance.clone(),
        Arc::new(StaticCatalog::padrao()),
        clock.clone(),
    );

    Harness {
        engine,
        clock,
        inventory,
        sales,
        finance,
        usuario: Usuario::new("u-1", "Ana"),
    }
}

impl Harness {
    pub async fn claim(&self, imei: &str, fim: NaiveDate) -> GarantiaItem {
        self.engine
            .garantias
            .register_claim(
                NovaGarantia {
                    venda_id: Uuid::new_v4(),
                    imei: imei.to_string(),
                    modelo: "iPhone 13".to_string(),
                    cliente_nome: Some("Cliente Teste".to_string()),
                    tipo_garantia: TipoGarantia::Loja,
                    data_inicio_garantia: fim - Duration::days(365),
                    data_fim_garantia: fim,
                },
                &self.usuario,
            )
            .await
            .unwrap()
    }

    pub async fn start(
        &self,
        garantia_id: Uuid,
        tipo: TipoTratativa,
    ) -> Result<TratativaIniciada, AppError> {
        self.engine
            .tratativas
            .start_treatment(
                garantia_id,
                IniciarTratativa {
                    tipo,
                    descricao: "Não liga".to_string(),
                    aparelho_troca_id: (tipo == TipoTratativa::TrocaDireta)
                        .then(|| "IMEI-NOVO-1".to_string()),
                    tecnico_id: Some("tec-1".to_string()),
                },
                &self.usuario,
            )
            .await
    }
}

pub fn peca_fornecedor(descricao: &str) -> NovaPeca {
    NovaPeca {
        descricao: descricao.to_string(),
        valor: Decimal::new(15000, 2),
        quantidade: 1,
        peca_de_fornecedor: true,
        ..NovaPeca::default()
    }
}

pub fn peca_estoque(sku: &str, quantidade: u32) -> NovaPeca {
    NovaPeca {
        descricao: format!("Peça {sku}"),
        valor: Decimal::new(20000, 2),
        quantidade,
        sku: Some(sku.to_string()),
        peca_no_estoque: true,
        ..NovaPeca::default()
    }
}

pub fn walk_in(pecas: Vec<NovaPeca>) -> NovaOS {
    NovaOS {
        origem: OrigemOS::Avulso,
        tratativa_id: None,
        garantia_id: None,
        imei: None,
        modelo: "iPhone 13".to_string(),
        cliente_nome: Some("Cliente Balcão".to_string()),
        descricao: "Troca de tela".to_string(),
        tecnico_id: Some("tec-1".to_string()),
        pecas,
    }
}
