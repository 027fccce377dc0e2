// tests/treatment_flow.rs

mod common;

use std::sync::Arc;

use garantias_backend::{
    common::error::AppError,
    models::{
        garantia::{StatusGarantia, StatusTratativa, TipoTratativa},
        ordem_servico::StatusOS,
        timeline::TipoEvento,
    },
    services::{service_order_service::AvancoOS, Efeito},
};

use common::{expirada, harness, harness_with_flaky_returns, vigente};

#[tokio::test]
async fn second_treatment_for_same_imei_reports_the_open_case() {
    let h = harness();
    let garantia = h.claim("356000000000001", vigente()).await;

    let primeira = h
        .start(garantia.id, TipoTratativa::EncaminhadoAssistencia)
        .await
        .unwrap();
    assert_eq!(primeira.tratativa.status, StatusTratativa::EmAndamento);
    assert!(primeira.os.is_some());
    assert!(h.engine.deps.guard.is_locked("356000000000001"));

    match h.start(garantia.id, TipoTratativa::EncaminhadoAssistencia).await {
        Err(AppError::ActiveTreatmentConflict {
            tratativa_id,
            garantia_id,
            ..
        }) => {
            assert_eq!(tratativa_id, primeira.tratativa.id);
            assert_eq!(garantia_id, garantia.id);
        }
        outro => panic!("esperado conflito, veio {outro:?}"),
    }

    // Outra venda do mesmo aparelho também esbarra na trava
    let outra = h.claim("356000000000001", vigente()).await;
    assert_ne!(outra.id, garantia.id);
    let do_aparelho = h.engine.garantias.find_by_imei("356000000000001").await.unwrap();
    assert_eq!(do_aparelho.len(), 2);
    assert!(matches!(
        h.start(outra.id, TipoTratativa::DirecionadoApple).await,
        Err(AppError::ActiveTreatmentConflict { .. })
    ));
}

#[tokio::test]
async fn concurrent_starts_leave_at_most_one_open_treatment() {
    let h = Arc::new(harness());
    let imei = "356000000000002";

    let mut garantias = Vec::new();
    for _ in 0..8 {
        garantias.push(h.claim(imei, vigente()).await.id);
    }

    let mut tarefas = Vec::new();
    for garantia_id in garantias {
        let h = h.clone();
        tarefas.push(tokio::spawn(async move {
            h.start(garantia_id, TipoTratativa::EncaminhadoAssistencia).await
        }));
    }

    let mut sucessos = 0;
    let mut conflitos = 0;
    for tarefa in tarefas {
        match tarefa.await.unwrap() {
            Ok(_) => sucessos += 1,
            Err(AppError::ActiveTreatmentConflict { .. }) => conflitos += 1,
            Err(outro) => panic!("erro inesperado: {outro}"),
        }
    }
    assert_eq!(sucessos, 1);
    assert_eq!(conflitos, 7);

    let abertas = h.engine.deps.store.list_tratativas_em_andamento().await.unwrap();
    assert_eq!(abertas.iter().filter(|t| t.imei == imei).count(), 1);
    assert!(h.engine.lock_divergences().await.unwrap().is_empty());
}

#[tokio::test]
async fn immediate_treatments_conclude_without_holding_the_imei() {
    let h = harness();
    let garantia = h.claim("356000000000003", vigente()).await;

    let iniciada = h
        .start(garantia.id, TipoTratativa::DirecionadoApple)
        .await
        .unwrap();
    assert_eq!(iniciada.tratativa.status, StatusTratativa::Concluido);
    assert!(iniciada.os.is_none());
    assert!(!h.engine.deps.guard.is_locked("356000000000003"));

    let detalhe = h.engine.garantias.get_claim(garantia.id).await.unwrap();
    assert_eq!(detalhe.garantia.status, StatusGarantia::Concluida);
    assert!(detalhe.sla.is_none());
}

#[tokio::test]
async fn expired_warranty_cannot_start_a_treatment() {
    let h = harness();
    let garantia = h.claim("356000000000004", expirada()).await;

    let err = h
        .start(garantia.id, TipoTratativa::EncaminhadoAssistencia)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    // A reserva da tentativa não pode vazar
    assert!(!h.engine.deps.guard.is_locked("356000000000004"));
}

#[tokio::test]
async fn loaner_return_requires_photo_and_then_closes_the_case() {
    let h = harness();
    let imei = "356000000000005";
    let garantia = h.claim(imei, vigente()).await;

    let iniciada = h
        .start(garantia.id, TipoTratativa::AssistenciaMaisEmprestimo)
        .await
        .unwrap();
    let tratativa_id = iniciada.tratativa.id;
    let aparelho = iniciada.tratativa.aparelho_emprestado_id.clone().unwrap();
    assert!(h.inventory.loaner_out(&aparelho).await);
    assert_eq!(h.inventory.allocation_count(), 1);

    // Reparo concluído; o caso ainda espera o aparelho emprestado
    let os_id = iniciada.os.unwrap().os.id;
    for destino in [StatusOS::EmServico, StatusOS::ServicoConcluido] {
        h.engine
            .ordens
            .advance_service_order(os_id, destino, AvancoOS::default(), &h.usuario)
            .await
            .unwrap();
    }
    assert!(h.engine.deps.guard.is_locked(imei));

    let err = h
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, None, &h.usuario)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingRequiredEvidence { .. }));

    let err = h
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, Some("   "), &h.usuario)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingRequiredEvidence { .. }));
    assert!(h.engine.deps.guard.is_locked(imei));

    let (tratativa, efeito) = h
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, Some("fotos/devolucao-1.jpg"), &h.usuario)
        .await
        .unwrap();
    assert_eq!(efeito, Efeito::Aplicado);
    assert_eq!(tratativa.status, StatusTratativa::Concluido);
    assert!(!h.engine.deps.guard.is_locked(imei));
    assert!(!h.inventory.loaner_out(&aparelho).await);

    // Repetir a devolução não é erro
    let (_, efeito) = h
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, Some("fotos/devolucao-1.jpg"), &h.usuario)
        .await
        .unwrap();
    assert_eq!(efeito, Efeito::NoOp);
    assert!(h.engine.lock_divergences().await.unwrap().is_empty());
}

#[tokio::test]
async fn early_loaner_return_waits_for_the_repair() {
    let h = harness();
    let imei = "356000000000006";
    let garantia = h.claim(imei, vigente()).await;
    let iniciada = h
        .start(garantia.id, TipoTratativa::AssistenciaMaisEmprestimo)
        .await
        .unwrap();

    let (tratativa, _) = h
        .engine
        .tratativas
        .record_loaner_return(iniciada.tratativa.id, Some("foto.jpg"), &h.usuario)
        .await
        .unwrap();
    assert_eq!(tratativa.status, StatusTratativa::EmAndamento);
    assert!(h.engine.deps.guard.is_locked(imei));

    let os_id = iniciada.os.unwrap().os.id;
    for destino in [StatusOS::EmServico, StatusOS::ServicoConcluido] {
        h.engine
            .ordens
            .advance_service_order(os_id, destino, AvancoOS::default(), &h.usuario)
            .await
            .unwrap();
    }

    let detalhe = h.engine.garantias.get_claim(garantia.id).await.unwrap();
    assert_eq!(detalhe.garantia.status, StatusGarantia::Concluida);
    assert_eq!(detalhe.tratativas[0].status, StatusTratativa::Concluido);
    assert!(!h.engine.deps.guard.is_locked(imei));
}

#[tokio::test]
async fn exchange_creates_exactly_one_sale() {
    let h = harness();
    let garantia = h.claim("356000000000007", vigente()).await;

    let iniciada = h.start(garantia.id, TipoTratativa::TrocaDireta).await.unwrap();
    let venda = iniciada.venda_troca.clone().unwrap();
    assert_eq!(iniciada.tratativa.venda_troca_id, Some(venda.id));
    assert_eq!(iniciada.tratativa.status, StatusTratativa::Concluido);

    let repetida = h
        .engine
        .tratativas
        .confirm_exchange(iniciada.tratativa.id, &h.usuario)
        .await
        .unwrap();
    assert_eq!(repetida.venda.id, venda.id);
    assert_eq!(repetida.efeito, Efeito::NoOp);
    assert_eq!(h.sales.count(), 1);
}

#[tokio::test]
async fn exchange_without_replacement_device_is_rejected() {
    let h = harness();
    let garantia = h.claim("356000000000008", vigente()).await;

    let err = h
        .engine
        .tratativas
        .start_treatment(
            garantia.id,
            garantias_backend::services::treatment_service::IniciarTratativa {
                tipo: TipoTratativa::TrocaDireta,
                descricao: "Tela quebrada na entrega".to_string(),
                aparelho_troca_id: None,
                tecnico_id: None,
            },
            &h.usuario,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingRequiredField(ref campo) if campo == "aparelhoTrocaId"));
    assert!(!h.engine.deps.guard.is_locked("356000000000008"));
    assert_eq!(h.sales.count(), 0);
}

#[tokio::test]
async fn timeline_is_ordered_and_never_empty_after_a_change() {
    let h = harness();
    let garantia = h.claim("356000000000009", vigente()).await;

    let timeline = h.engine.timeline.get_case_timeline(garantia.id).await.unwrap();
    assert_eq!(timeline.len(), 1);

    let iniciada = h
        .start(garantia.id, TipoTratativa::EncaminhadoAssistencia)
        .await
        .unwrap();
    let os_id = iniciada.os.unwrap().os.id;
    for destino in [StatusOS::EmServico, StatusOS::ServicoConcluido] {
        h.clock.advance(chrono::Duration::minutes(5));
        h.engine
            .ordens
            .advance_service_order(os_id, destino, AvancoOS::default(), &h.usuario)
            .await
            .unwrap();
    }

    for caso in [garantia.id, os_id] {
        let entradas = h.engine.timeline.get_case_timeline(caso).await.unwrap();
        assert!(!entradas.is_empty());
        for par in entradas.windows(2) {
            assert!((par[0].data, par[0].sequencia) < (par[1].data, par[1].sequencia));
        }
    }

    let da_garantia = h.engine.timeline.get_case_timeline(garantia.id).await.unwrap();
    let titulos: Vec<&str> = da_garantia.iter().map(|e| e.titulo.as_str()).collect();
    assert_eq!(
        titulos,
        ["Garantia registrada", "Tratativa iniciada", "Tratativa concluída"]
    );
}

#[tokio::test]
async fn restart_rebuilds_the_imei_locks_from_the_store() {
    let h = harness();
    let aberta = h.claim("356000000000010", vigente()).await;
    let fechada = h.claim("356000000000011", vigente()).await;
    let recusada = h.claim("356000000000012", vigente()).await;

    h.start(aberta.id, TipoTratativa::AssistenciaMaisEmprestimo)
        .await
        .unwrap();
    h.start(fechada.id, TipoTratativa::DirecionadoApple).await.unwrap();
    let iniciada = h
        .start(recusada.id, TipoTratativa::EncaminhadoAssistencia)
        .await
        .unwrap();
    h.engine
        .ordens
        .reject_service_order(iniciada.os.unwrap().os.id, "Sem peça no mercado", &h.usuario)
        .await
        .unwrap();
    assert!(h.engine.lock_divergences().await.unwrap().is_empty());

    // Motor novo sobre o mesmo store
    let reiniciado = garantias_backend::services::engine::WarrantyEngine::new(
        h.engine.deps.store.clone(),
        h.inventory.clone(),
        h.sales.clone(),
        h.finance.clone(),
        h.engine.deps.catalog.clone(),
        h.clock.clone(),
    );
    assert_eq!(reiniciado.lock_divergences().await.unwrap().len(), 2);

    assert_eq!(reiniciado.hydrate().await.unwrap(), 2);
    assert!(reiniciado.lock_divergences().await.unwrap().is_empty());
    assert!(reiniciado.deps.guard.is_locked("356000000000010"));
    assert!(reiniciado.deps.guard.is_locked("356000000000012"));
    assert!(!reiniciado.deps.guard.is_locked("356000000000011"));
}

#[tokio::test]
async fn loaner_handover_gets_its_own_timeline_entry() {
    let h = harness();
    let garantia = h.claim("356000000000013", vigente()).await;
    let iniciada = h
        .start(garantia.id, TipoTratativa::AssistenciaMaisEmprestimo)
        .await
        .unwrap();
    let aparelho = iniciada.tratativa.aparelho_emprestado_id.unwrap();

    let timeline = h.engine.timeline.get_case_timeline(garantia.id).await.unwrap();
    let emprestimos: Vec<_> = timeline
        .iter()
        .filter(|e| e.tipo == TipoEvento::Emprestimo)
        .collect();
    assert_eq!(emprestimos.len(), 1);
    assert!(emprestimos[0].descricao.contains(&aparelho));
}

#[tokio::test]
async fn loaner_return_is_recorded_before_the_stock_and_resent_on_repeat() {
    let h = harness_with_flaky_returns(1);
    let imei = "356000000000014";
    let garantia = h.claim(imei, vigente()).await;
    let iniciada = h
        .start(garantia.id, TipoTratativa::AssistenciaMaisEmprestimo)
        .await
        .unwrap();
    let tratativa_id = iniciada.tratativa.id;
    let aparelho = iniciada.tratativa.aparelho_emprestado_id.clone().unwrap();

    // O estoque recusa: a devolução já está gravada e o aparelho segue emprestado
    let err = h
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, Some("foto.jpg"), &h.usuario)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CollaboratorFailure { .. }));
    let gravada = h
        .engine
        .deps
        .store
        .get_tratativa(tratativa_id)
        .await
        .unwrap()
        .unwrap();
    assert!(gravada.emprestimo_devolvido_em.is_some());
    assert!(h.inventory.loaner_out(&aparelho).await);

    // Repetir não grava de novo, mas entrega o aparelho ao estoque
    let (tratativa, efeito) = h
        .engine
        .tratativas
        .record_loaner_return(tratativa_id, Some("foto.jpg"), &h.usuario)
        .await
        .unwrap();
    assert_eq!(efeito, Efeito::NoOp);
    assert_eq!(tratativa.versao, gravada.versao);
    assert!(!h.inventory.loaner_out(&aparelho).await);

    let devolucoes = h
        .engine
        .timeline
        .get_case_timeline(garantia.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.tipo == TipoEvento::Devolucao)
        .count();
    assert_eq!(devolucoes, 1);
}
