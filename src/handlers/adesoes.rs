// src/handlers/adesoes.rs

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::usuario::UsuarioAtual,
    models::{
        comercial::{PagamentoAdesao, TratativaComercial},
        ordem_servico::MeioPagamento,
    },
    services::{adhesion_service::AdesaoRegistrada, Efeito},
};

fn uma_parcela() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagamentoAdesaoPayload {
    pub meio: MeioPagamento,
    pub valor: Decimal,

    #[serde(default = "uma_parcela")]
    #[validate(range(min = 1, max = 24, message = "Entre 1 e 24 parcelas."))]
    pub parcelas: u32,
}

#[utoipa::path(
    post,
    path = "/api/adesoes/{id}/pagamento",
    tag = "Adesões",
    request_body = PagamentoAdesaoPayload,
    params(("id" = Uuid, Path, description = "ID da adesão")),
    responses(
        (status = 200, description = "Pagamento configurado", body = TratativaComercial),
        (status = 422, description = "Adesão já confirmada ou valor inválido")
    ),
    security(("usuario" = []))
)]
pub async fn configure_adhesion_payment(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(adesao_id): Path<Uuid>,
    Json(payload): Json<PagamentoAdesaoPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let adesao = app_state
        .engine
        .adesoes
        .configure_adhesion_payment(
            adesao_id,
            PagamentoAdesao {
                meio: payload.meio,
                valor: payload.valor,
                parcelas: payload.parcelas,
            },
            &usuario,
        )
        .await?;
    Ok(Json(adesao))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmacaoPayload {
    pub observacao: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrimeiraConfirmacao {
    pub adesao: TratativaComercial,
    pub efeito: Efeito,
}

#[utoipa::path(
    post,
    path = "/api/adesoes/{id}/confirmacao-1",
    tag = "Adesões",
    request_body = ConfirmacaoPayload,
    params(("id" = Uuid, Path, description = "ID da adesão")),
    responses(
        (status = 200, description = "Intenção gravada", body = PrimeiraConfirmacao),
        (status = 422, description = "Pagamento ainda não configurado")
    ),
    security(("usuario" = []))
)]
pub async fn confirm_adhesion_step1(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(adesao_id): Path<Uuid>,
    Json(payload): Json<ConfirmacaoPayload>,
) -> Result<impl IntoResponse, AppError> {
    let (adesao, efeito) = app_state
        .engine
        .adesoes
        .confirm_adhesion_step1(adesao_id, payload.observacao, &usuario)
        .await?;
    Ok(Json(PrimeiraConfirmacao { adesao, efeito }))
}

#[utoipa::path(
    post,
    path = "/api/adesoes/{id}/confirmacao-2",
    tag = "Adesões",
    request_body = ConfirmacaoPayload,
    params(("id" = Uuid, Path, description = "ID da adesão")),
    responses(
        (status = 200, description = "Adesão registrada; financeiro avisado ou pendente", body = AdesaoRegistrada),
        (status = 422, description = "Primeira confirmação ausente")
    ),
    security(("usuario" = []))
)]
pub async fn confirm_adhesion_step2(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(adesao_id): Path<Uuid>,
    Json(payload): Json<ConfirmacaoPayload>,
) -> Result<impl IntoResponse, AppError> {
    let registrada = app_state
        .engine
        .adesoes
        .confirm_adhesion_step2(adesao_id, payload.observacao, &usuario)
        .await?;
    Ok(Json(registrada))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VereditoPayload {
    pub aprovada: bool,
    /// Obrigatório na recusa.
    pub motivo: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VereditoFinanceiro {
    pub adesao: TratativaComercial,
    pub efeito: Efeito,
}

#[utoipa::path(
    post,
    path = "/api/adesoes/{id}/financeiro",
    tag = "Adesões",
    request_body = VereditoPayload,
    params(("id" = Uuid, Path, description = "ID da adesão")),
    responses(
        (status = 200, description = "Adesão concluída ou recusada", body = VereditoFinanceiro),
        (status = 422, description = "Adesão não está pendente no financeiro")
    ),
    security(("usuario" = []))
)]
pub async fn record_finance_decision(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(adesao_id): Path<Uuid>,
    Json(payload): Json<VereditoPayload>,
) -> Result<impl IntoResponse, AppError> {
    let (adesao, efeito) = app_state
        .engine
        .adesoes
        .record_finance_decision(adesao_id, payload.aprovada, payload.motivo, &usuario)
        .await?;
    Ok(Json(VereditoFinanceiro { adesao, efeito }))
}
