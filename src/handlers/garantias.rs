// src/handlers/garantias.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::usuario::UsuarioAtual,
    models::{
        comercial::{NivelPlano, TratativaComercial},
        garantia::{GarantiaItem, TipoGarantia, TipoTratativa, TratativaGarantia},
        timeline::TimelineEntry,
    },
    services::{
        treatment_service::{IniciarTratativa, TratativaIniciada, TrocaConfirmada},
        warranty_service::{GarantiaDetalhe, NovaGarantia},
        Efeito,
    },
};

// =============================================================================
//  1. GARANTIAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrarGarantiaPayload {
    pub venda_id: Uuid,

    #[validate(length(min = 1, message = "O IMEI é obrigatório."))]
    pub imei: String,

    #[validate(length(min = 1, message = "O modelo é obrigatório."))]
    pub modelo: String,

    pub cliente_nome: Option<String>,
    pub tipo_garantia: TipoGarantia,
    pub data_inicio_garantia: NaiveDate,
    pub data_fim_garantia: NaiveDate,
}

#[utoipa::path(
    post,
    path = "/api/garantias",
    tag = "Garantias",
    request_body = RegistrarGarantiaPayload,
    responses(
        (status = 201, description = "Garantia registrada", body = GarantiaItem),
        (status = 400, description = "Dados inválidos")
    ),
    security(("usuario" = []))
)]
pub async fn register_claim(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Json(payload): Json<RegistrarGarantiaPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let garantia = app_state
        .engine
        .garantias
        .register_claim(
            NovaGarantia {
                venda_id: payload.venda_id,
                imei: payload.imei,
                modelo: payload.modelo,
                cliente_nome: payload.cliente_nome,
                tipo_garantia: payload.tipo_garantia,
                data_inicio_garantia: payload.data_inicio_garantia,
                data_fim_garantia: payload.data_fim_garantia,
            },
            &usuario,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(garantia)))
}

#[utoipa::path(
    get,
    path = "/api/garantias/{id}",
    tag = "Garantias",
    params(("id" = Uuid, Path, description = "ID da garantia")),
    responses(
        (status = 200, description = "Garantia com tratativas e SLA", body = GarantiaDetalhe),
        (status = 404, description = "Garantia não encontrada")
    )
)]
pub async fn get_claim(
    State(app_state): State<AppState>,
    Path(garantia_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detalhe = app_state.engine.garantias.get_claim(garantia_id).await?;
    Ok(Json(detalhe))
}

// =============================================================================
//  2. TRATATIVAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IniciarTratativaPayload {
    pub tipo: TipoTratativa,

    #[validate(length(min = 1, message = "Descreva o defeito."))]
    pub descricao: String,

    pub aparelho_troca_id: Option<String>,
    pub tecnico_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/garantias/{id}/tratativas",
    tag = "Tratativas",
    request_body = IniciarTratativaPayload,
    params(("id" = Uuid, Path, description = "ID da garantia")),
    responses(
        (status = 201, description = "Tratativa iniciada", body = TratativaIniciada),
        (status = 409, description = "IMEI com tratativa em andamento"),
        (status = 422, description = "Garantia fora de vigência ou dados ausentes")
    ),
    security(("usuario" = []))
)]
pub async fn start_treatment(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(garantia_id): Path<Uuid>,
    Json(payload): Json<IniciarTratativaPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let iniciada = app_state
        .engine
        .tratativas
        .start_treatment(
            garantia_id,
            IniciarTratativa {
                tipo: payload.tipo,
                descricao: payload.descricao,
                aparelho_troca_id: payload.aparelho_troca_id,
                tecnico_id: payload.tecnico_id,
            },
            &usuario,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(iniciada)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevolucaoPayload {
    // Validada no serviço: a ausência é MissingRequiredEvidence, não 400
    pub foto_devolucao: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevolucaoRegistrada {
    pub tratativa: TratativaGarantia,
    pub efeito: Efeito,
}

#[utoipa::path(
    post,
    path = "/api/tratativas/{id}/devolucao",
    tag = "Tratativas",
    request_body = DevolucaoPayload,
    params(("id" = Uuid, Path, description = "ID da tratativa")),
    responses(
        (status = 200, description = "Devolução registrada", body = DevolucaoRegistrada),
        (status = 422, description = "Foto da devolução ausente")
    ),
    security(("usuario" = []))
)]
pub async fn record_loaner_return(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(tratativa_id): Path<Uuid>,
    Json(payload): Json<DevolucaoPayload>,
) -> Result<impl IntoResponse, AppError> {
    let (tratativa, efeito) = app_state
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, payload.foto_devolucao.as_deref(), &usuario)
        .await?;

    Ok(Json(DevolucaoRegistrada { tratativa, efeito }))
}

#[utoipa::path(
    post,
    path = "/api/tratativas/{id}/troca",
    tag = "Tratativas",
    params(("id" = Uuid, Path, description = "ID da tratativa")),
    responses(
        (status = 200, description = "Venda de troca vinculada", body = TrocaConfirmada),
        (status = 502, description = "Livro de vendas indisponível")
    ),
    security(("usuario" = []))
)]
pub async fn confirm_exchange(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(tratativa_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let confirmada = app_state
        .engine
        .tratativas
        .confirm_exchange(tratativa_id, &usuario)
        .await?;
    Ok(Json(confirmada))
}

#[utoipa::path(
    get,
    path = "/api/casos/{id}/timeline",
    tag = "Timeline",
    params(("id" = Uuid, Path, description = "ID da garantia ou da OS")),
    responses(
        (status = 200, description = "Histórico do caso em ordem", body = Vec<TimelineEntry>)
    )
)]
pub async fn get_case_timeline(
    State(app_state): State<AppState>,
    Path(caso_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let entradas = app_state.engine.timeline.get_case_timeline(caso_id).await?;
    Ok(Json(entradas))
}

// =============================================================================
//  3. COMERCIAL (contato e abertura de adesão)
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IniciarAdesaoPayload {
    pub nivel: NivelPlano,
    pub plano_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/garantias/{id}/adesoes",
    tag = "Adesões",
    request_body = IniciarAdesaoPayload,
    params(("id" = Uuid, Path, description = "ID da garantia")),
    responses(
        (status = 201, description = "Adesão aberta com plano escolhido", body = TratativaComercial),
        (status = 409, description = "Garantia ainda vigente")
    ),
    security(("usuario" = []))
)]
pub async fn start_adhesion(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(garantia_id): Path<Uuid>,
    Json(payload): Json<IniciarAdesaoPayload>,
) -> Result<impl IntoResponse, AppError> {
    let adesao = app_state
        .engine
        .adesoes
        .start_adhesion(garantia_id, payload.nivel, payload.plano_id.as_deref(), &usuario)
        .await?;
    Ok((StatusCode::CREATED, Json(adesao)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContatoPayload {
    #[validate(length(min = 1, message = "Descreva o contato."))]
    pub descricao: String,
}

#[utoipa::path(
    post,
    path = "/api/garantias/{id}/contatos",
    tag = "Adesões",
    request_body = ContatoPayload,
    params(("id" = Uuid, Path, description = "ID da garantia")),
    responses(
        (status = 201, description = "Contato comercial registrado", body = TratativaComercial)
    ),
    security(("usuario" = []))
)]
pub async fn register_commercial_contact(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(garantia_id): Path<Uuid>,
    Json(payload): Json<ContatoPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let contato = app_state
        .engine
        .adesoes
        .register_commercial_contact(garantia_id, &payload.descricao, &usuario)
        .await?;
    Ok((StatusCode::CREATED, Json(contato)))
}
