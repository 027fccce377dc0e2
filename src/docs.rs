// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Garantias ---
        handlers::garantias::register_claim,
        handlers::garantias::get_claim,

        // --- Tratativas ---
        handlers::garantias::start_treatment,
        handlers::garantias::record_loaner_return,
        handlers::garantias::confirm_exchange,

        // --- Timeline ---
        handlers::garantias::get_case_timeline,

        // --- Ordens de Serviço ---
        handlers::ordens_servico::create_service_order,
        handlers::ordens_servico::get_service_order,
        handlers::ordens_servico::advance_service_order,
        handlers::ordens_servico::reject_service_order,
        handlers::ordens_servico::receive_part,
        handlers::ordens_servico::add_payment,
        handlers::ordens_servico::get_open_cases_by_actor,

        // --- Adesões ---
        handlers::garantias::start_adhesion,
        handlers::garantias::register_commercial_contact,
        handlers::adesoes::configure_adhesion_payment,
        handlers::adesoes::confirm_adhesion_step1,
        handlers::adesoes::confirm_adhesion_step2,
        handlers::adesoes::record_finance_decision,
    ),
    components(
        schemas(
            // --- Garantias ---
            models::garantia::TipoGarantia,
            models::garantia::StatusGarantia,
            models::garantia::TipoTratativa,
            models::garantia::StatusTratativa,
            models::garantia::GarantiaItem,
            models::garantia::TratativaGarantia,
            services::warranty_service::GarantiaDetalhe,
            services::treatment_service::TratativaIniciada,
            services::treatment_service::TrocaConfirmada,
            services::collaborators::VendaRef,
            services::sla::Sla,
            services::Efeito,

            // --- Ordens de Serviço ---
            models::ordem_servico::StatusOS,
            models::ordem_servico::Atuacao,
            models::ordem_servico::OrigemOS,
            models::ordem_servico::MeioPagamento,
            models::ordem_servico::PecaOS,
            models::ordem_servico::PagamentoOS,
            models::ordem_servico::SolicitacaoPeca,
            models::ordem_servico::OrdemServico,
            services::service_order_service::OrdemServicoView,

            // --- Comercial ---
            models::comercial::NivelPlano,
            models::comercial::EtapaAdesao,
            models::comercial::StatusAdesao,
            models::comercial::PlanoGarantia,
            models::comercial::TratativaComercial,
            services::adhesion_service::AdesaoRegistrada,

            // --- Timeline ---
            models::timeline::TipoEvento,
            models::timeline::TimelineEntry,

            // --- Payloads ---
            handlers::garantias::RegistrarGarantiaPayload,
            handlers::garantias::IniciarTratativaPayload,
            handlers::garantias::DevolucaoPayload,
            handlers::garantias::IniciarAdesaoPayload,
            handlers::garantias::ContatoPayload,
            handlers::ordens_servico::CriarOSPayload,
            handlers::ordens_servico::PecaPayload,
            handlers::ordens_servico::AvancarOSPayload,
            handlers::ordens_servico::SolicitacaoPayload,
            handlers::ordens_servico::PagamentoPayload,
            handlers::ordens_servico::RecusarOSPayload,
            handlers::adesoes::PagamentoAdesaoPayload,
            handlers::adesoes::ConfirmacaoPayload,
            handlers::adesoes::VereditoPayload,
            handlers::adesoes::VereditoFinanceiro,
        )
    ),
    tags(
        (name = "Garantias", description = "Registro e consulta de garantias"),
        (name = "Tratativas", description = "Atendimento da garantia (assistência, empréstimo, troca)"),
        (name = "Ordens de Serviço", description = "Fluxo da OS, peças, pagamentos e filas por papel"),
        (name = "Adesões", description = "Garantia estendida e contatos comerciais"),
        (name = "Timeline", description = "Histórico imutável dos casos")
    ),
    modifiers(&UsuarioAddon)
)]
pub struct ApiDoc;

struct UsuarioAddon;

impl utoipa::Modify for UsuarioAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "usuario",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-usuario-id"))),
        );
    }
}
