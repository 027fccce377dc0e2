// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    db::{MemoryStore, PgStore, Store},
    services::{
        clock::SystemClock,
        collaborators::{LocalInventory, LocalSalesLedger, LoggingFinance, StaticCatalog},
        engine::WarrantyEngine,
    },
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Sem `DATABASE_URL` o motor roda com o store em memória.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub retry_financeiro: Duration,
    pub planos_path: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DB_MAX_CONNECTIONS deve ser um número")?
            .unwrap_or(5);

        let retry_segundos = env::var("FINANCEIRO_RETRY_SEGUNDOS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("FINANCEIRO_RETRY_SEGUNDOS deve ser um número")?
            .unwrap_or(60);

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_max_connections,
            retry_financeiro: Duration::from_secs(retry_segundos.max(1)),
            planos_path: env::var("PLANOS_PATH").ok().filter(|v| !v.is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: WarrantyEngine,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // --- Store ---
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(url)
                    .await
                    .context("Falha ao conectar ao banco de dados")?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!()
                    .run(&pool)
                    .await
                    .context("Falha ao rodar as migrações do banco de dados")?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                Arc::new(PgStore::new(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL não definida; usando store em memória");
                Arc::new(MemoryStore::new())
            }
        };

        // --- Colaboradores ---
        let catalog = match &config.planos_path {
            Some(path) => StaticCatalog::from_json_file(path)?,
            None => StaticCatalog::padrao(),
        };

        let engine = WarrantyEngine::new(
            store,
            Arc::new(LocalInventory::new()),
            Arc::new(LocalSalesLedger::new()),
            Arc::new(LoggingFinance::new()),
            Arc::new(catalog),
            Arc::new(SystemClock),
        );

        let travas = engine.hydrate().await?;
        tracing::info!(travas, "Motor de garantias pronto");

        Ok(Self { engine })
    }

    /// Estado para testes e execuções locais: tudo em memória.
    pub fn from_engine(engine: WarrantyEngine) -> Self {
        Self { engine }
    }
}
