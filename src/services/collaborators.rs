// src/services/collaborators.rs
//
// Colaboradores externos do motor (estoque, livro de vendas, financeiro,
// catálogo). O motor só conhece os traits; as implementações locais abaixo
// servem para rodar o serviço sozinho e para os testes.

use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    models::comercial::{NivelPlano, PagamentoAdesao, PlanoGarantia, TratativaComercial},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoVenda {
    TrocaZeroCaixa,
    ConferenciaAdesao,
}

/// Referência a uma venda criada no livro de vendas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VendaRef {
    pub id: Uuid,
    pub caso_id: Uuid,
    pub tipo: TipoVenda,
    pub valor: Decimal,
    pub criada_em: DateTime<Utc>,
}

#[async_trait]
pub trait Inventory: Send + Sync {
    async fn debit_part(&self, sku: &str, quantidade: u32) -> Result<(), AppError>;

    /// Devolve o identificador do aparelho emprestado.
    async fn allocate_loaner(&self, modelo: &str) -> Result<String, AppError>;

    /// Idempotente: devolver um aparelho que já está no estoque não é erro.
    async fn return_loaner(&self, aparelho_id: &str) -> Result<(), AppError>;
}

/// Ambas as operações são idempotentes pelo id do caso.
#[async_trait]
pub trait SalesLedger: Send + Sync {
    async fn create_zero_cash_exchange(
        &self,
        caso_id: Uuid,
        aparelho_entrada: &str,
        aparelho_saida: &str,
    ) -> Result<VendaRef, AppError>;

    async fn create_conference_entry(
        &self,
        caso_id: Uuid,
        pagamento: &PagamentoAdesao,
    ) -> Result<VendaRef, AppError>;
}

#[async_trait]
pub trait Finance: Send + Sync {
    async fn notify_adhesion(&self, adesao: &TratativaComercial) -> Result<(), AppError>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Planos disponíveis do nível, na ordem do catálogo.
    async fn plans(&self, nivel: NivelPlano) -> Result<Vec<PlanoGarantia>, AppError>;
}

// =========================================================================
//  ESTOQUE LOCAL
// =========================================================================

#[derive(Default)]
pub struct LocalInventory {
    saldo: DashMap<String, i64>,
    // (aparelho, modelo, emprestado)
    emprestimos: Mutex<Vec<(String, String, bool)>>,
    debitos: AtomicUsize,
    alocacoes: AtomicUsize,
}

impl LocalInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(self, sku: &str, quantidade: i64) -> Self {
        self.saldo.insert(sku.to_string(), quantidade);
        self
    }

    pub fn with_loaner(mut self, aparelho_id: &str, modelo: &str) -> Self {
        self.emprestimos
            .get_mut()
            .push((aparelho_id.to_string(), modelo.to_string(), false));
        self
    }

    pub fn stock(&self, sku: &str) -> i64 {
        self.saldo.get(sku).map(|s| *s).unwrap_or(0)
    }

    pub fn debit_count(&self) -> usize {
        self.debitos.load(Ordering::SeqCst)
    }

    pub fn allocation_count(&self) -> usize {
        self.alocacoes.load(Ordering::SeqCst)
    }

    pub async fn loaner_out(&self, aparelho_id: &str) -> bool {
        self.emprestimos
            .lock()
            .await
            .iter()
            .any(|(id, _, emprestado)| id == aparelho_id && *emprestado)
    }
}

#[async_trait]
impl Inventory for LocalInventory {
    async fn debit_part(&self, sku: &str, quantidade: u32) -> Result<(), AppError> {
        let mut saldo = self.saldo.get_mut(sku).ok_or_else(|| {
            AppError::collaborator("estoque", format!("SKU {sku} não existe no estoque"))
        })?;
        if *saldo < i64::from(quantidade) {
            return Err(AppError::collaborator(
                "estoque",
                format!("Estoque insuficiente para {sku}: saldo {}", *saldo),
            ));
        }
        *saldo -= i64::from(quantidade);
        self.debitos.fetch_add(1, Ordering::SeqCst);
        tracing::info!(sku, quantidade, saldo = *saldo, "Baixa de peça no estoque");
        Ok(())
    }

    async fn allocate_loaner(&self, modelo: &str) -> Result<String, AppError> {
        let mut emprestimos = self.emprestimos.lock().await;
        let livre = emprestimos
            .iter_mut()
            .find(|(_, m, emprestado)| !*emprestado && m.eq_ignore_ascii_case(modelo))
            .ok_or_else(|| {
                AppError::collaborator(
                    "estoque",
                    format!("Nenhum aparelho de empréstimo disponível para {modelo}"),
                )
            })?;
        livre.2 = true;
        self.alocacoes.fetch_add(1, Ordering::SeqCst);
        Ok(livre.0.clone())
    }

    async fn return_loaner(&self, aparelho_id: &str) -> Result<(), AppError> {
        let mut emprestimos = self.emprestimos.lock().await;
        match emprestimos.iter_mut().find(|(id, _, _)| id == aparelho_id) {
            Some(aparelho) => {
                aparelho.2 = false;
                Ok(())
            }
            None => Err(AppError::collaborator(
                "estoque",
                format!("Aparelho de empréstimo {aparelho_id} desconhecido"),
            )),
        }
    }
}

// =========================================================================
//  LIVRO DE VENDAS LOCAL
// =========================================================================

#[derive(Default)]
pub struct LocalSalesLedger {
    vendas: DashMap<(Uuid, &'static str), VendaRef>,
}

impl LocalSalesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.vendas.len()
    }

    fn search_or_create(&self, caso_id: Uuid, tipo: TipoVenda, valor: Decimal) -> VendaRef {
        let chave = match tipo {
            TipoVenda::TrocaZeroCaixa => "troca",
            TipoVenda::ConferenciaAdesao => "conferencia",
        };
        self.vendas
            .entry((caso_id, chave))
            .or_insert_with(|| VendaRef {
                id: Uuid::new_v4(),
                caso_id,
                tipo,
                valor,
                criada_em: Utc::now(),
            })
            .clone()
    }
}

#[async_trait]
impl SalesLedger for LocalSalesLedger {
    async fn create_zero_cash_exchange(
        &self,
        caso_id: Uuid,
        aparelho_entrada: &str,
        aparelho_saida: &str,
    ) -> Result<VendaRef, AppError> {
        let venda = self.search_or_create(caso_id, TipoVenda::TrocaZeroCaixa, Decimal::ZERO);
        tracing::info!(%caso_id, venda_id = %venda.id, aparelho_entrada, aparelho_saida, "Venda de troca (valor zero)");
        Ok(venda)
    }

    async fn create_conference_entry(
        &self,
        caso_id: Uuid,
        pagamento: &PagamentoAdesao,
    ) -> Result<VendaRef, AppError> {
        let venda =
            self.search_or_create(caso_id, TipoVenda::ConferenciaAdesao, pagamento.valor);
        tracing::info!(%caso_id, venda_id = %venda.id, valor = %pagamento.valor, "Venda para conferência do financeiro");
        Ok(venda)
    }
}

// =========================================================================
//  FINANCEIRO (apenas registra o evento)
// =========================================================================

#[derive(Default)]
pub struct LoggingFinance {
    notificacoes: AtomicUsize,
}

impl LoggingFinance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> usize {
        self.notificacoes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Finance for LoggingFinance {
    async fn notify_adhesion(&self, adesao: &TratativaComercial) -> Result<(), AppError> {
        self.notificacoes.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            adesao_id = %adesao.id,
            garantia_id = %adesao.garantia_id,
            valor = ?adesao.pagamento.as_ref().map(|p| p.valor),
            "💰 Adesão enviada ao financeiro"
        );
        Ok(())
    }
}

// =========================================================================
//  CATÁLOGO DE PLANOS
// =========================================================================

pub struct StaticCatalog {
    planos: Vec<PlanoGarantia>,
}

impl StaticCatalog {
    pub fn new(planos: Vec<PlanoGarantia>) -> Self {
        Self { planos }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let texto = std::fs::read_to_string(path)
            .with_context(|| format!("ler catálogo de planos {}", path.display()))?;
        let planos: Vec<PlanoGarantia> =
            serde_json::from_str(&texto).context("catálogo de planos inválido")?;
        Ok(Self::new(planos))
    }

    /// Catálogo padrão da loja.
    pub fn padrao() -> Self {
        let plano = |id: &str, nome: &str, nivel, meses, valor: i64, modelos: &[&str]| {
            PlanoGarantia {
                id: id.to_string(),
                nome: nome.to_string(),
                nivel,
                meses,
                valor: Decimal::new(valor, 2),
                modelos: modelos.iter().map(|m| m.to_string()).collect(),
            }
        };
        Self::new(vec![
            plano("silver-12", "Silver 12 meses", NivelPlano::Silver, 12, 29900, &["iPhone 13", "iPhone 14"]),
            plano("silver-15", "Silver Pro 12 meses", NivelPlano::Silver, 12, 39900, &["iPhone 15", "iPhone 15 Pro"]),
            plano("gold-12", "Gold 12 meses", NivelPlano::Gold, 12, 49900, &["iPhone 13", "iPhone 14"]),
            plano("gold-24", "Gold 24 meses", NivelPlano::Gold, 24, 79900, &["iPhone 15", "iPhone 15 Pro"]),
        ])
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn plans(&self, nivel: NivelPlano) -> Result<Vec<PlanoGarantia>, AppError> {
        Ok(self
            .planos
            .iter()
            .filter(|p| p.nivel == nivel)
            .cloned()
            .collect())
    }
}
