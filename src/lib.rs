// src/lib.rs

use axum::{
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let garantia_routes = Router::new()
        .route("/", post(handlers::garantias::register_claim))
        .route("/{id}", get(handlers::garantias::get_claim))
        .route("/{id}/tratativas", post(handlers::garantias::start_treatment))
        .route("/{id}/adesoes", post(handlers::garantias::start_adhesion))
        .route(
            "/{id}/contatos",
            post(handlers::garantias::register_commercial_contact),
        );

    let tratativa_routes = Router::new()
        .route(
            "/{id}/devolucao",
            post(handlers::garantias::record_loaner_return),
        )
        .route("/{id}/troca", post(handlers::garantias::confirm_exchange));

    let os_routes = Router::new()
        .route("/", post(handlers::ordens_servico::create_service_order))
        .route("/{id}", get(handlers::ordens_servico::get_service_order))
        .route(
            "/{id}/avancar",
            post(handlers::ordens_servico::advance_service_order),
        )
        .route(
            "/{id}/recusar",
            post(handlers::ordens_servico::reject_service_order),
        )
        .route(
            "/{id}/pecas/{peca_id}/recebida",
            post(handlers::ordens_servico::receive_part),
        )
        .route(
            "/{id}/pagamentos",
            post(handlers::ordens_servico::add_payment),
        );

    let adesao_routes = Router::new()
        .route(
            "/{id}/pagamento",
            post(handlers::adesoes::configure_adhesion_payment),
        )
        .route(
            "/{id}/confirmacao-1",
            post(handlers::adesoes::confirm_adhesion_step1),
        )
        .route(
            "/{id}/confirmacao-2",
            post(handlers::adesoes::confirm_adhesion_step2),
        )
        .route(
            "/{id}/financeiro",
            post(handlers::adesoes::record_finance_decision),
        );

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(docs::ApiDoc::openapi()) }),
        )
        .route(
            "/api/casos/{id}/timeline",
            get(handlers::garantias::get_case_timeline),
        )
        .route(
            "/api/atuacao/{papel}",
            get(handlers::ordens_servico::get_open_cases_by_actor),
        )
        .nest("/api/garantias", garantia_routes)
        .nest("/api/tratativas", tratativa_routes)
        .nest("/api/ordens-servico", os_routes)
        .nest("/api/adesoes", adesao_routes)
        .with_state(app_state)
}
