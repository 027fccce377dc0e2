// src/db/postgres_repo.rs

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgRow, types::Json, PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        Changeset, ComercialRepository, GarantiaRepository, OrdemServicoRepository,
        TimelineRepository, UnitOfWork, Versionado,
    },
    models::{
        comercial::TratativaComercial,
        garantia::{GarantiaItem, StatusTratativa, TratativaGarantia},
        ordem_servico::OrdemServico,
        timeline::{NovaEntrada, TimelineEntry, TipoEvento},
    },
};

const UQ_TRATATIVA_ATIVA: &str = "uq_tratativa_ativa_por_imei";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Quando o índice parcial do banco barra uma segunda tratativa ativa,
    // devolvemos o mesmo erro que a trava em memória devolveria.
    async fn conflito_imei(&self, imei: &str) -> Result<AppError, AppError> {
        let row = sqlx::query(
            "SELECT id, garantia_id FROM tratativas_garantia WHERE imei = $1 AND status = 'EM_ANDAMENTO'",
        )
        .bind(imei)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => AppError::ActiveTreatmentConflict {
                imei: imei.to_string(),
                tratativa_id: row.try_get("id")?,
                garantia_id: row.try_get("garantia_id")?,
            },
            None => AppError::invalid_transition(
                StatusTratativa::EmAndamento,
                StatusTratativa::EmAndamento,
                format!("IMEI {imei} bloqueado por outra tratativa"),
            ),
        })
    }
}

// --- Helpers de (de)serialização ---

fn dados<T: DeserializeOwned>(row: &PgRow) -> Result<T, AppError> {
    let Json(valor): Json<T> = row.try_get("dados")?;
    Ok(valor)
}

fn todos<T: DeserializeOwned>(rows: Vec<PgRow>) -> Result<Vec<T>, AppError> {
    rows.iter().map(dados).collect()
}

/// Texto do enum como o serde o escreve (ex.: `EM_ANDAMENTO`).
fn rotulo<T: Serialize>(valor: &T) -> String {
    serde_json::to_value(valor)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn timeline_entry(row: &PgRow) -> Result<TimelineEntry, AppError> {
    let tipo: String = row.try_get("tipo")?;
    let tipo = TipoEvento::parse(&tipo)
        .ok_or_else(|| anyhow::anyhow!("tipo de evento desconhecido na timeline: {tipo}"))?;

    Ok(TimelineEntry {
        id: row.try_get("id")?,
        caso_id: row.try_get("caso_id")?,
        sequencia: row.try_get("sequencia")?,
        data: row.try_get("data")?,
        tipo,
        titulo: row.try_get("titulo")?,
        descricao: row.try_get("descricao")?,
        usuario_id: row.try_get("usuario_id")?,
        usuario_nome: row.try_get("usuario_nome")?,
    })
}

async fn versao_atual(
    conn: &mut PgConnection,
    tabela: &'static str,
    id: Uuid,
) -> Result<i64, AppError> {
    let sql = format!("SELECT versao FROM {tabela} WHERE id = $1");
    let atual: Option<i64> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(atual.unwrap_or(0))
}

async fn conflito<T: Versionado>(
    conn: &mut PgConnection,
    tabela: &'static str,
    item: &T,
) -> Result<AppError, AppError> {
    Ok(AppError::VersionConflict {
        entidade: T::ENTIDADE,
        id: item.chave(),
        esperada: item.versao() - 1,
        atual: versao_atual(conn, tabela, item.chave()).await?,
    })
}

// --- Gravação de cada snapshot (INSERT na versão 1, UPDATE otimista depois) ---

async fn gravar_garantia(conn: &mut PgConnection, g: &GarantiaItem) -> Result<(), AppError> {
    let afetadas = if g.versao == 1 {
        sqlx::query(
            r#"
            INSERT INTO garantias (id, imei, status, versao, dados, criado_em)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(g.id)
        .bind(&g.imei)
        .bind(rotulo(&g.status))
        .bind(g.versao)
        .bind(Json(g))
        .bind(g.criado_em)
        .execute(&mut *conn)
        .await?
        .rows_affected()
    } else {
        sqlx::query(
            r#"
            UPDATE garantias
            SET status = $2, versao = $3, dados = $4
            WHERE id = $1 AND versao = $3 - 1
            "#,
        )
        .bind(g.id)
        .bind(rotulo(&g.status))
        .bind(g.versao)
        .bind(Json(g))
        .execute(&mut *conn)
        .await?
        .rows_affected()
    };

    if afetadas == 0 {
        return Err(conflito(conn, "garantias", g).await?);
    }
    Ok(())
}

async fn gravar_tratativa(
    conn: &mut PgConnection,
    t: &TratativaGarantia,
) -> Result<(), AppError> {
    let afetadas = if t.versao == 1 {
        sqlx::query(
            r#"
            INSERT INTO tratativas_garantia (id, garantia_id, imei, status, versao, dados, aberta_em)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(t.id)
        .bind(t.garantia_id)
        .bind(&t.imei)
        .bind(rotulo(&t.status))
        .bind(t.versao)
        .bind(Json(t))
        .bind(t.aberta_em)
        .execute(&mut *conn)
        .await?
        .rows_affected()
    } else {
        sqlx::query(
            r#"
            UPDATE tratativas_garantia
            SET status = $2, versao = $3, dados = $4
            WHERE id = $1 AND versao = $3 - 1
            "#,
        )
        .bind(t.id)
        .bind(rotulo(&t.status))
        .bind(t.versao)
        .bind(Json(t))
        .execute(&mut *conn)
        .await?
        .rows_affected()
    };

    if afetadas == 0 {
        return Err(conflito(conn, "tratativas_garantia", t).await?);
    }
    Ok(())
}

async fn gravar_os(conn: &mut PgConnection, os: &OrdemServico) -> Result<(), AppError> {
    let afetadas = if os.versao == 1 {
        sqlx::query(
            r#"
            INSERT INTO ordens_servico (id, numero, status, versao, dados)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(os.id)
        .bind(os.numero)
        .bind(rotulo(&os.status))
        .bind(os.versao)
        .bind(Json(os))
        .execute(&mut *conn)
        .await?
        .rows_affected()
    } else {
        sqlx::query(
            r#"
            UPDATE ordens_servico
            SET status = $2, versao = $3, dados = $4
            WHERE id = $1 AND versao = $3 - 1
            "#,
        )
        .bind(os.id)
        .bind(rotulo(&os.status))
        .bind(os.versao)
        .bind(Json(os))
        .execute(&mut *conn)
        .await?
        .rows_affected()
    };

    if afetadas == 0 {
        return Err(conflito(conn, "ordens_servico", os).await?);
    }
    Ok(())
}

async fn gravar_comercial(
    conn: &mut PgConnection,
    c: &TratativaComercial,
) -> Result<(), AppError> {
    let pendente = c.notificacao_financeiro.pendente();
    let afetadas = if c.versao == 1 {
        sqlx::query(
            r#"
            INSERT INTO tratativas_comerciais (id, garantia_id, notificacao_pendente, versao, dados, criada_em)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(c.id)
        .bind(c.garantia_id)
        .bind(pendente)
        .bind(c.versao)
        .bind(Json(c))
        .bind(c.criada_em)
        .execute(&mut *conn)
        .await?
        .rows_affected()
    } else {
        sqlx::query(
            r#"
            UPDATE tratativas_comerciais
            SET notificacao_pendente = $2, versao = $3, dados = $4
            WHERE id = $1 AND versao = $3 - 1
            "#,
        )
        .bind(c.id)
        .bind(pendente)
        .bind(c.versao)
        .bind(Json(c))
        .execute(&mut *conn)
        .await?
        .rows_affected()
    };

    if afetadas == 0 {
        return Err(conflito(conn, "tratativas_comerciais", c).await?);
    }
    Ok(())
}

async fn anexar_timeline(
    conn: &mut PgConnection,
    nova: NovaEntrada,
) -> Result<TimelineEntry, AppError> {
    // Serializa os appends do mesmo caso até o fim da transação
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(nova.caso_id)
        .execute(&mut *conn)
        .await?;

    let proxima: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sequencia), 0) + 1 FROM timeline WHERE caso_id = $1",
    )
    .bind(nova.caso_id)
    .fetch_one(&mut *conn)
    .await?;

    let entry = nova.into_entry(proxima);

    sqlx::query(
        r#"
        INSERT INTO timeline (id, caso_id, sequencia, data, tipo, titulo, descricao, usuario_id, usuario_nome)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.id)
    .bind(entry.caso_id)
    .bind(entry.sequencia)
    .bind(entry.data)
    .bind(entry.tipo.as_str())
    .bind(&entry.titulo)
    .bind(&entry.descricao)
    .bind(&entry.usuario_id)
    .bind(&entry.usuario_nome)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

// =========================================================================
//  LEITURAS
// =========================================================================

#[async_trait]
impl GarantiaRepository for PgStore {
    async fn get_garantia(&self, id: Uuid) -> Result<Option<GarantiaItem>, AppError> {
        let row = sqlx::query("SELECT dados FROM garantias WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(dados).transpose()
    }

    async fn find_garantias_by_imei(&self, imei: &str) -> Result<Vec<GarantiaItem>, AppError> {
        let rows = sqlx::query("SELECT dados FROM garantias WHERE imei = $1 ORDER BY criado_em ASC")
            .bind(imei)
            .fetch_all(&self.pool)
            .await?;
        todos(rows)
    }

    async fn get_tratativa(&self, id: Uuid) -> Result<Option<TratativaGarantia>, AppError> {
        let row = sqlx::query("SELECT dados FROM tratativas_garantia WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(dados).transpose()
    }

    async fn list_tratativas_by_garantia(
        &self,
        garantia_id: Uuid,
    ) -> Result<Vec<TratativaGarantia>, AppError> {
        let rows = sqlx::query(
            "SELECT dados FROM tratativas_garantia WHERE garantia_id = $1 ORDER BY aberta_em ASC",
        )
        .bind(garantia_id)
        .fetch_all(&self.pool)
        .await?;
        todos(rows)
    }

    async fn list_tratativas_em_andamento(&self) -> Result<Vec<TratativaGarantia>, AppError> {
        let rows =
            sqlx::query("SELECT dados FROM tratativas_garantia WHERE status = 'EM_ANDAMENTO'")
                .fetch_all(&self.pool)
                .await?;
        todos(rows)
    }
}

#[async_trait]
impl OrdemServicoRepository for PgStore {
    async fn get_os(&self, id: Uuid) -> Result<Option<OrdemServico>, AppError> {
        let row = sqlx::query("SELECT dados FROM ordens_servico WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(dados).transpose()
    }

    async fn list_os_abertas(&self) -> Result<Vec<OrdemServico>, AppError> {
        let rows = sqlx::query(
            "SELECT dados FROM ordens_servico WHERE status <> 'FINALIZADO' ORDER BY numero ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        todos(rows)
    }

    async fn next_numero_os(&self) -> Result<i64, AppError> {
        let numero: i64 = sqlx::query_scalar("SELECT nextval('ordens_servico_numero_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(numero)
    }
}

#[async_trait]
impl TimelineRepository for PgStore {
    async fn list_timeline(&self, caso_id: Uuid) -> Result<Vec<TimelineEntry>, AppError> {
        let rows = sqlx::query("SELECT * FROM timeline WHERE caso_id = $1 ORDER BY sequencia ASC")
            .bind(caso_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(timeline_entry).collect()
    }
}

#[async_trait]
impl ComercialRepository for PgStore {
    async fn get_comercial(&self, id: Uuid) -> Result<Option<TratativaComercial>, AppError> {
        let row = sqlx::query("SELECT dados FROM tratativas_comerciais WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(dados).transpose()
    }

    async fn list_comerciais_by_garantia(
        &self,
        garantia_id: Uuid,
    ) -> Result<Vec<TratativaComercial>, AppError> {
        let rows = sqlx::query(
            "SELECT dados FROM tratativas_comerciais WHERE garantia_id = $1 ORDER BY criada_em ASC",
        )
        .bind(garantia_id)
        .fetch_all(&self.pool)
        .await?;
        todos(rows)
    }

    async fn list_notificacoes_pendentes(&self) -> Result<Vec<TratativaComercial>, AppError> {
        let rows = sqlx::query("SELECT dados FROM tratativas_comerciais WHERE notificacao_pendente")
            .fetch_all(&self.pool)
            .await?;
        todos(rows)
    }
}

// =========================================================================
//  ESCRITA (uma transação por Changeset)
// =========================================================================

#[async_trait]
impl UnitOfWork for PgStore {
    async fn commit(&self, changes: Changeset) -> Result<Vec<TimelineEntry>, AppError> {
        let mut tx = self.pool.begin().await?;

        for g in &changes.garantias {
            gravar_garantia(&mut tx, g).await?;
        }

        for t in &changes.tratativas {
            if let Err(e) = gravar_tratativa(&mut tx, t).await {
                let violou_imei = matches!(
                    &e,
                    AppError::DatabaseError(sqlx::Error::Database(db))
                        if db.constraint() == Some(UQ_TRATATIVA_ATIVA)
                );
                if violou_imei {
                    // A transação já abortou; a consulta vai pela pool
                    drop(tx);
                    return Err(self.conflito_imei(&t.imei).await?);
                }
                return Err(e);
            }
        }

        for os in &changes.ordens {
            gravar_os(&mut tx, os).await?;
        }

        for c in &changes.comerciais {
            gravar_comercial(&mut tx, c).await?;
        }

        let mut gravadas = Vec::with_capacity(changes.timeline.len());
        for nova in changes.timeline {
            gravadas.push(anexar_timeline(&mut tx, nova).await?);
        }

        tx.commit().await?;
        Ok(gravadas)
    }
}
