// src/handlers/ordens_servico.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::usuario::UsuarioAtual,
    models::ordem_servico::{Atuacao, MeioPagamento, OrigemOS, StatusOS},
    services::{
        service_order_service::{AvancoOS, NovaOS, NovaPeca, NovaSolicitacao, OrdemServicoView},
        Efeito,
    },
};

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// =============================================================================
//  1. ABERTURA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PecaPayload {
    #[validate(length(min = 1, message = "required"))]
    pub descricao: String,

    #[validate(custom(function = "validate_not_negative"))]
    pub valor: Decimal,

    #[validate(range(min = 1, message = "A quantidade deve ser pelo menos 1."))]
    pub quantidade: u32,

    pub sku: Option<String>,

    #[serde(default)]
    pub peca_no_estoque: bool,
    #[serde(default)]
    pub peca_de_fornecedor: bool,
    #[serde(default)]
    pub servico_terceirizado: bool,

    pub responsavel_terceirizacao: Option<String>,
}

impl From<PecaPayload> for NovaPeca {
    fn from(p: PecaPayload) -> Self {
        NovaPeca {
            descricao: p.descricao,
            valor: p.valor,
            quantidade: p.quantidade,
            sku: p.sku,
            peca_no_estoque: p.peca_no_estoque,
            peca_de_fornecedor: p.peca_de_fornecedor,
            servico_terceirizado: p.servico_terceirizado,
            responsavel_terceirizacao: p.responsavel_terceirizacao,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CriarOSPayload {
    pub origem: OrigemOS,
    pub imei: Option<String>,

    #[validate(length(min = 1, message = "O modelo é obrigatório."))]
    pub modelo: String,

    pub cliente_nome: Option<String>,

    #[validate(length(min = 1, message = "Descreva o serviço."))]
    pub descricao: String,

    pub tecnico_id: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub pecas: Vec<PecaPayload>,
}

#[utoipa::path(
    post,
    path = "/api/ordens-servico",
    tag = "Ordens de Serviço",
    request_body = CriarOSPayload,
    responses(
        (status = 201, description = "OS aberta", body = OrdemServicoView),
        (status = 409, description = "IMEI com tratativa em andamento"),
        (status = 422, description = "Peça sem SKU ou sem responsável")
    ),
    security(("usuario" = []))
)]
pub async fn create_service_order(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Json(payload): Json<CriarOSPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let os = app_state
        .engine
        .ordens
        .create_service_order(
            NovaOS {
                origem: payload.origem,
                tratativa_id: None,
                garantia_id: None,
                imei: payload.imei,
                modelo: payload.modelo,
                cliente_nome: payload.cliente_nome,
                descricao: payload.descricao,
                tecnico_id: payload.tecnico_id,
                pecas: payload.pecas.into_iter().map(NovaPeca::from).collect(),
            },
            &usuario,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(os)))
}

#[utoipa::path(
    get,
    path = "/api/ordens-servico/{id}",
    tag = "Ordens de Serviço",
    params(("id" = Uuid, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "OS com próxima atuação e SLA", body = OrdemServicoView),
        (status = 404, description = "OS não encontrada")
    )
)]
pub async fn get_service_order(
    State(app_state): State<AppState>,
    Path(os_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(app_state.engine.ordens.get_service_order(os_id).await?))
}

// =============================================================================
//  2. TRANSIÇÕES
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolicitacaoPayload {
    #[validate(length(min = 1, message = "required"))]
    pub descricao: String,

    #[validate(range(min = 1))]
    pub quantidade: u32,

    #[validate(custom(function = "validate_not_negative"))]
    pub valor_estimado: Decimal,

    #[validate(length(min = 1, message = "Justifique a solicitação."))]
    pub justificativa: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagamentoPayload {
    pub meio: MeioPagamento,

    #[validate(custom(function = "validate_not_negative"))]
    pub valor: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvancarOSPayload {
    pub status: StatusOS,
    pub observacao: Option<String>,
    pub tecnico_id: Option<String>,
    pub motivo: Option<String>,

    #[validate(nested)]
    pub solicitacao: Option<SolicitacaoPayload>,

    #[validate(nested)]
    pub pagamento: Option<PagamentoPayload>,
}

#[utoipa::path(
    post,
    path = "/api/ordens-servico/{id}/avancar",
    tag = "Ordens de Serviço",
    request_body = AvancarOSPayload,
    params(("id" = Uuid, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "OS no novo status", body = OrdemServicoView),
        (status = 422, description = "Transição inválida, com o motivo")
    ),
    security(("usuario" = []))
)]
pub async fn advance_service_order(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(os_id): Path<Uuid>,
    Json(payload): Json<AvancarOSPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let avanco = AvancoOS {
        observacao: payload.observacao,
        tecnico_id: payload.tecnico_id,
        motivo: payload.motivo,
        solicitacao: payload.solicitacao.map(|s| NovaSolicitacao {
            descricao: s.descricao,
            quantidade: s.quantidade,
            valor_estimado: s.valor_estimado,
            justificativa: s.justificativa,
        }),
        pagamento: payload.pagamento.map(|p| (p.meio, p.valor)),
    };

    let os = app_state
        .engine
        .ordens
        .advance_service_order(os_id, payload.status, avanco, &usuario)
        .await?;
    Ok(Json(os))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecusarOSPayload {
    #[validate(length(min = 1, message = "Informe o motivo da recusa."))]
    pub motivo: String,
}

#[utoipa::path(
    post,
    path = "/api/ordens-servico/{id}/recusar",
    tag = "Ordens de Serviço",
    request_body = RecusarOSPayload,
    params(("id" = Uuid, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "OS recusada pelo técnico", body = OrdemServicoView)
    ),
    security(("usuario" = []))
)]
pub async fn reject_service_order(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(os_id): Path<Uuid>,
    Json(payload): Json<RecusarOSPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let os = app_state
        .engine
        .ordens
        .reject_service_order(os_id, &payload.motivo, &usuario)
        .await?;
    Ok(Json(os))
}

// =============================================================================
//  3. PEÇAS, PAGAMENTOS E FILAS
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PecaRecebida {
    pub ordem_servico: OrdemServicoView,
    pub efeito: Efeito,
}

#[utoipa::path(
    post,
    path = "/api/ordens-servico/{id}/pecas/{peca_id}/recebida",
    tag = "Ordens de Serviço",
    params(
        ("id" = Uuid, Path, description = "ID da OS"),
        ("peca_id" = Uuid, Path, description = "ID da peça")
    ),
    responses(
        (status = 200, description = "Peça marcada como recebida", body = PecaRecebida)
    ),
    security(("usuario" = []))
)]
pub async fn receive_part(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path((os_id, peca_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let (os, efeito) = app_state
        .engine
        .ordens
        .receive_part(os_id, peca_id, &usuario)
        .await?;
    Ok(Json(PecaRecebida {
        ordem_servico: os,
        efeito,
    }))
}

#[utoipa::path(
    post,
    path = "/api/ordens-servico/{id}/pagamentos",
    tag = "Ordens de Serviço",
    request_body = PagamentoPayload,
    params(("id" = Uuid, Path, description = "ID da OS")),
    responses(
        (status = 201, description = "Pagamento registrado", body = OrdemServicoView)
    ),
    security(("usuario" = []))
)]
pub async fn add_payment(
    State(app_state): State<AppState>,
    UsuarioAtual(usuario): UsuarioAtual,
    Path(os_id): Path<Uuid>,
    Json(payload): Json<PagamentoPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let os = app_state
        .engine
        .ordens
        .add_payment(os_id, payload.meio, payload.valor, &usuario)
        .await?;
    Ok((StatusCode::CREATED, Json(os)))
}

#[utoipa::path(
    get,
    path = "/api/atuacao/{papel}",
    tag = "Ordens de Serviço",
    params(("papel" = String, Path, description = "tecnico, atendente, financeiro, gestor, logistica ou concluido")),
    responses(
        (status = 200, description = "Fila do papel, mais antigas primeiro", body = Vec<OrdemServicoView>),
        (status = 404, description = "Papel desconhecido")
    )
)]
pub async fn get_open_cases_by_actor(
    State(app_state): State<AppState>,
    Path(papel): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let papel = Atuacao::parse(&papel)
        .ok_or_else(|| AppError::ResourceNotFound(format!("Papel {papel}")))?;

    let fila = app_state.engine.ordens.get_open_cases_by_actor(papel).await?;
    Ok(Json(fila))
}
