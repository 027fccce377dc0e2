// tests/service_order_flow.rs

mod common;

use chrono::Duration;
use rust_decimal::Decimal;

use garantias_backend::{
    common::error::AppError,
    models::{
        garantia::TipoTratativa,
        ordem_servico::{Atuacao, DebitoEstoque, MeioPagamento, StatusOS, StatusSolicitacao},
    },
    services::{
        service_order_service::{AvancoOS, NovaSolicitacao},
        sla::NivelSla,
        Efeito,
    },
};

use common::{harness, peca_estoque, peca_fornecedor, vigente, walk_in, Harness};

async fn avancar(h: &Harness, os_id: uuid::Uuid, destino: StatusOS) -> Result<StatusOS, AppError> {
    h.engine
        .ordens
        .advance_service_order(os_id, destino, AvancoOS::default(), &h.usuario)
        .await
        .map(|v| v.os.status)
}

#[tokio::test]
async fn cannot_close_while_a_supplier_part_is_pending() {
    let h = harness();
    let os = h
        .engine
        .ordens
        .create_service_order(walk_in(vec![peca_fornecedor("Tela OLED")]), &h.usuario)
        .await
        .unwrap();
    let os_id = os.os.id;
    let peca_id = os.os.pecas[0].id;

    avancar(&h, os_id, StatusOS::EmServico).await.unwrap();

    match avancar(&h, os_id, StatusOS::ServicoConcluido).await {
        Err(AppError::InvalidTransition { motivo, .. }) => {
            assert!(motivo.contains("1 peça(s) ainda aguardando fornecedor"), "{motivo}")
        }
        outro => panic!("esperado InvalidTransition, veio {outro:?}"),
    }

    let (_, efeito) = h
        .engine
        .ordens
        .receive_part(os_id, peca_id, &h.usuario)
        .await
        .unwrap();
    assert_eq!(efeito, Efeito::Aplicado);

    assert_eq!(
        avancar(&h, os_id, StatusOS::ServicoConcluido).await.unwrap(),
        StatusOS::ServicoConcluido
    );
}

#[tokio::test]
async fn any_pending_supplier_part_blocks_completion() {
    let configuracoes = vec![
        vec![peca_fornecedor("Tela")],
        vec![peca_estoque("TELA-13", 1), peca_fornecedor("Câmera")],
        vec![peca_fornecedor("Tela"), peca_fornecedor("Bateria")],
        vec![
            peca_estoque("BAT-13", 1),
            {
                let mut p = peca_fornecedor("Placa");
                p.servico_terceirizado = true;
                p.responsavel_terceirizacao = Some("Lab Externo".to_string());
                p
            },
        ],
    ];

    for pecas in configuracoes {
        let h = harness();
        let pendentes = pecas.iter().filter(|p| p.peca_de_fornecedor).count();
        let os = h
            .engine
            .ordens
            .create_service_order(walk_in(pecas), &h.usuario)
            .await
            .unwrap();
        avancar(&h, os.os.id, StatusOS::EmServico).await.unwrap();

        let err = avancar(&h, os.os.id, StatusOS::ServicoConcluido)
            .await
            .unwrap_err();
        match err {
            AppError::InvalidTransition { motivo, .. } => {
                assert!(motivo.contains(&format!("{pendentes} peça(s)")), "{motivo}")
            }
            outro => panic!("erro inesperado: {outro}"),
        }
    }
}

#[tokio::test]
async fn transitions_outside_the_table_are_rejected() {
    let h = harness();
    let os = h
        .engine
        .ordens
        .create_service_order(walk_in(Vec::new()), &h.usuario)
        .await
        .unwrap();

    for destino in [
        StatusOS::ServicoConcluido,
        StatusOS::Finalizado,
        StatusOS::EmAnalise,
        StatusOS::PecaRecebida,
    ] {
        assert!(matches!(
            avancar(&h, os.os.id, destino).await,
            Err(AppError::InvalidTransition { .. })
        ));
    }

    for destino in [
        StatusOS::EmServico,
        StatusOS::ServicoConcluido,
        StatusOS::AguardandoConferencia,
        StatusOS::Finalizado,
    ] {
        avancar(&h, os.os.id, destino).await.unwrap();
    }

    // Finalizado é imutável
    for destino in StatusOS::TODOS {
        if destino == StatusOS::RecusadaPeloTecnico {
            continue;
        }
        assert!(matches!(
            avancar(&h, os.os.id, destino).await,
            Err(AppError::InvalidTransition { .. })
        ));
    }
    assert!(matches!(
        h.engine
            .ordens
            .reject_service_order(os.os.id, "Tarde demais", &h.usuario)
            .await,
        Err(AppError::InvalidTransition { .. })
    ));
    let view = h.engine.ordens.get_service_order(os.os.id).await.unwrap();
    assert_eq!(view.proxima_atuacao, Atuacao::Concluido);
    assert!(view.sla.is_none());
}

#[tokio::test]
async fn parts_request_goes_through_the_manager() {
    let h = harness();
    let os = h
        .engine
        .ordens
        .create_service_order(walk_in(Vec::new()), &h.usuario)
        .await
        .unwrap();
    let os_id = os.os.id;

    avancar(&h, os_id, StatusOS::EmServico).await.unwrap();
    avancar(&h, os_id, StatusOS::AguardandoPeca).await.unwrap();

    // Sem a solicitação não há o que enviar
    assert!(matches!(
        avancar(&h, os_id, StatusOS::SolicitacaoEnviada).await,
        Err(AppError::MissingRequiredField(_))
    ));

    let solicitacao = NovaSolicitacao {
        descricao: "Conector de carga".to_string(),
        quantidade: 1,
        valor_estimado: Decimal::new(8000, 2),
        justificativa: "Conector oxidado".to_string(),
    };
    let view = h
        .engine
        .ordens
        .advance_service_order(
            os_id,
            StatusOS::SolicitacaoEnviada,
            AvancoOS {
                solicitacao: Some(solicitacao.clone()),
                ..AvancoOS::default()
            },
            &h.usuario,
        )
        .await
        .unwrap();
    assert_eq!(view.proxima_atuacao, Atuacao::Gestor);

    avancar(&h, os_id, StatusOS::EmAnalise).await.unwrap();

    // Rejeição exige motivo
    assert!(matches!(
        avancar(&h, os_id, StatusOS::PecaRejeitada).await,
        Err(AppError::MissingRequiredField(_))
    ));
    let view = h
        .engine
        .ordens
        .advance_service_order(
            os_id,
            StatusOS::PecaRejeitada,
            AvancoOS {
                motivo: Some("Fornecedor sem estoque".to_string()),
                ..AvancoOS::default()
            },
            &h.usuario,
        )
        .await
        .unwrap();
    assert_eq!(view.os.solicitacoes[0].status, StatusSolicitacao::Rejeitada);

    // Segunda rodada aprovada
    avancar(&h, os_id, StatusOS::AguardandoPeca).await.unwrap();
    h.engine
        .ordens
        .advance_service_order(
            os_id,
            StatusOS::SolicitacaoEnviada,
            AvancoOS {
                solicitacao: Some(solicitacao),
                ..AvancoOS::default()
            },
            &h.usuario,
        )
        .await
        .unwrap();
    avancar(&h, os_id, StatusOS::EmAnalise).await.unwrap();
    let view = h
        .engine
        .ordens
        .advance_service_order(os_id, StatusOS::PecaAprovada, AvancoOS::default(), &h.usuario)
        .await
        .unwrap();
    assert_eq!(view.proxima_atuacao, Atuacao::Logistica);

    let view = h
        .engine
        .ordens
        .advance_service_order(os_id, StatusOS::PecaRecebida, AvancoOS::default(), &h.usuario)
        .await
        .unwrap();
    assert_eq!(view.os.pecas.len(), 1);
    assert!(!view.os.pecas[0].aguardando_fornecedor);

    avancar(&h, os_id, StatusOS::EmExecucao).await.unwrap();
    avancar(&h, os_id, StatusOS::ServicoConcluido).await.unwrap();
}

#[tokio::test]
async fn technician_rejection_keeps_the_imei_and_needs_reassignment() {
    let h = harness();
    let imei = "356000000000101";
    let garantia = h.claim(imei, vigente()).await;
    let iniciada = h
        .start(garantia.id, TipoTratativa::EncaminhadoAssistencia)
        .await
        .unwrap();
    let os_id = iniciada.os.unwrap().os.id;

    assert!(matches!(
        h.engine.ordens.reject_service_order(os_id, "  ", &h.usuario).await,
        Err(AppError::MissingRequiredField(_))
    ));

    let view = h
        .engine
        .ordens
        .reject_service_order(os_id, "Fora da minha especialidade", &h.usuario)
        .await
        .unwrap();
    assert_eq!(view.os.status, StatusOS::RecusadaPeloTecnico);
    assert!(view.os.recusada_tecnico);
    assert_eq!(view.proxima_atuacao, Atuacao::Gestor);
    assert!(h.engine.deps.guard.is_locked(imei));

    // Reatribuir exige o novo técnico
    assert!(matches!(
        avancar(&h, os_id, StatusOS::EmAberto).await,
        Err(AppError::MissingRequiredField(_))
    ));
    let view = h
        .engine
        .ordens
        .advance_service_order(
            os_id,
            StatusOS::EmAberto,
            AvancoOS {
                tecnico_id: Some("tec-2".to_string()),
                ..AvancoOS::default()
            },
            &h.usuario,
        )
        .await
        .unwrap();
    assert_eq!(view.os.tecnico_id.as_deref(), Some("tec-2"));
    assert!(!view.os.recusada_tecnico);
}

#[tokio::test]
async fn walk_in_for_a_device_under_treatment_is_redirected() {
    let h = harness();
    let imei = "356000000000102";
    let garantia = h.claim(imei, vigente()).await;
    let iniciada = h
        .start(garantia.id, TipoTratativa::EncaminhadoAssistencia)
        .await
        .unwrap();

    let mut nova = walk_in(Vec::new());
    nova.imei = Some(imei.to_string());
    match h.engine.ordens.create_service_order(nova, &h.usuario).await {
        Err(AppError::ActiveTreatmentConflict { tratativa_id, .. }) => {
            assert_eq!(tratativa_id, iniciada.tratativa.id)
        }
        outro => panic!("esperado conflito, veio {outro:?}"),
    }
}

#[tokio::test]
async fn walk_in_checks_the_device_under_its_imei_lock() {
    let h = harness();
    let imei = "356000000000103";

    // Uma tratativa segura o IMEI enquanto a OS avulsa chega
    let trava = h.engine.deps.locks.imei(imei).await;
    let ordens = h.engine.ordens.clone();
    let usuario = h.usuario.clone();
    let mut nova = walk_in(Vec::new());
    nova.imei = Some(format!(" {imei} "));
    let pedido = tokio::spawn(async move { ordens.create_service_order(nova, &usuario).await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!pedido.is_finished());

    let tratativa_id = uuid::Uuid::new_v4();
    h.engine
        .deps
        .guard
        .try_acquire(imei, tratativa_id, uuid::Uuid::new_v4())
        .unwrap()
        .confirmar();
    drop(trava);

    match pedido.await.unwrap() {
        Err(AppError::ActiveTreatmentConflict { tratativa_id: dono, .. }) => {
            assert_eq!(dono, tratativa_id)
        }
        outro => panic!("esperado conflito, veio {outro:?}"),
    }
}

#[tokio::test]
async fn stock_parts_are_debited_once_and_failures_are_recorded() {
    let h = harness();
    let os = h
        .engine
        .ordens
        .create_service_order(
            walk_in(vec![peca_estoque("TELA-13", 1), peca_estoque("BAT-13", 5)]),
            &h.usuario,
        )
        .await
        .unwrap();

    assert_eq!(os.os.pecas[0].debito_estoque, DebitoEstoque::Debitado);
    assert!(matches!(os.os.pecas[1].debito_estoque, DebitoEstoque::Falhou(_)));
    assert_eq!(h.inventory.stock("TELA-13"), 1);
    assert_eq!(h.inventory.stock("BAT-13"), 1);
    assert_eq!(h.inventory.debit_count(), 1);

    // Avançar a OS não debita de novo
    avancar(&h, os.os.id, StatusOS::EmServico).await.unwrap();
    assert_eq!(h.inventory.debit_count(), 1);
    assert_eq!(os.os.status, StatusOS::EmAberto);
}

#[tokio::test]
async fn stock_part_without_sku_is_rejected() {
    let h = harness();
    let mut peca = peca_estoque("TELA-13", 1);
    peca.sku = None;

    let err = h
        .engine
        .ordens
        .create_service_order(walk_in(vec![peca]), &h.usuario)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingRequiredField(ref campo) if campo == "pecas[0].sku"));
}

#[tokio::test]
async fn conference_requires_payments_covering_the_total() {
    let h = harness();
    let mut peca = peca_estoque("TELA-13", 1);
    peca.valor = Decimal::new(30000, 2);
    let os = h
        .engine
        .ordens
        .create_service_order(walk_in(vec![peca]), &h.usuario)
        .await
        .unwrap();
    let os_id = os.os.id;

    avancar(&h, os_id, StatusOS::EmServico).await.unwrap();
    avancar(&h, os_id, StatusOS::ServicoConcluido).await.unwrap();
    let view = h
        .engine
        .ordens
        .advance_service_order(os_id, StatusOS::AguardandoPagamento, AvancoOS::default(), &h.usuario)
        .await
        .unwrap();
    assert_eq!(view.proxima_atuacao, Atuacao::Atendente);

    assert!(matches!(
        avancar(&h, os_id, StatusOS::AguardandoConferencia).await,
        Err(AppError::InvalidTransition { .. })
    ));

    let view = h
        .engine
        .ordens
        .add_payment(os_id, MeioPagamento::Pix, Decimal::new(10000, 2), &h.usuario)
        .await
        .unwrap();
    assert_eq!(view.proxima_atuacao, Atuacao::Financeiro);
    assert_eq!(view.valor_devido, Decimal::new(20000, 2));

    let view = h
        .engine
        .ordens
        .advance_service_order(
            os_id,
            StatusOS::AguardandoConferencia,
            AvancoOS {
                pagamento: Some((MeioPagamento::CartaoCredito, Decimal::new(20000, 2))),
                ..AvancoOS::default()
            },
            &h.usuario,
        )
        .await
        .unwrap();
    assert_eq!(view.valor_devido, Decimal::ZERO);
    assert_eq!(avancar(&h, os_id, StatusOS::Finalizado).await.unwrap(), StatusOS::Finalizado);
}

#[tokio::test]
async fn actor_queue_lists_oldest_cases_first_with_sla() {
    let h = harness();
    let antiga = h
        .engine
        .ordens
        .create_service_order(walk_in(Vec::new()), &h.usuario)
        .await
        .unwrap();

    h.clock.advance(Duration::days(5));
    let nova = h
        .engine
        .ordens
        .create_service_order(walk_in(Vec::new()), &h.usuario)
        .await
        .unwrap();

    let outra = h
        .engine
        .ordens
        .create_service_order(walk_in(Vec::new()), &h.usuario)
        .await
        .unwrap();
    h.engine
        .ordens
        .reject_service_order(outra.os.id, "Sem ferramenta", &h.usuario)
        .await
        .unwrap();

    h.clock.advance(Duration::days(4));
    let fila = h
        .engine
        .ordens
        .get_open_cases_by_actor(Atuacao::Tecnico)
        .await
        .unwrap();
    let ids: Vec<_> = fila.iter().map(|v| v.os.id).collect();
    assert_eq!(ids, vec![antiga.os.id, nova.os.id]);

    let sla_antiga = fila[0].sla.unwrap();
    assert_eq!(sla_antiga.dias_aberto, 9);
    assert_eq!(sla_antiga.nivel, NivelSla::Critico);
    assert_eq!(fila[1].sla.unwrap().nivel, NivelSla::Atencao);

    let gestor = h
        .engine
        .ordens
        .get_open_cases_by_actor(Atuacao::Gestor)
        .await
        .unwrap();
    assert_eq!(gestor.len(), 1);
    assert_eq!(gestor[0].os.id, outra.os.id);
}
