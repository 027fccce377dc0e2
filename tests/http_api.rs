// tests/http_api.rs
//
// Rotas HTTP em processo: o Router é chamado via `tower::ServiceExt::oneshot`,
// sem abrir socket.

mod common;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use garantias_backend::{build_router, config::AppState};

use common::harness;

fn make_router() -> Router {
    build_router(AppState::from_engine(harness().engine))
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-usuario-id", "u-1")
        .header("x-usuario-nome", "Ana");
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router.clone().oneshot(req).await.expect("oneshot falhou");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn garantia_payload(imei: &str, fim: &str) -> Value {
    json!({
        "vendaId": uuid::Uuid::new_v4(),
        "imei": imei,
        "modelo": "iPhone 13",
        "clienteNome": "Cliente HTTP",
        "tipoGarantia": "LOJA",
        "dataInicioGarantia": "2026-01-10",
        "dataFimGarantia": fim
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let router = make_router();
    let resp = router
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn openapi_document_lists_the_engine_routes() {
    let router = make_router();
    let (status, doc) = call(&router, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/garantias/{id}/tratativas"]["post"].is_object());
    assert!(doc["paths"]["/api/ordens-servico/{id}/avancar"]["post"].is_object());
    assert!(doc["paths"]["/api/adesoes/{id}/financeiro"]["post"].is_object());
    assert!(doc["components"]["securitySchemes"]["usuario"].is_object());
}

#[tokio::test]
async fn conflict_response_carries_the_open_case() {
    let router = make_router();

    let (status, garantia) = call(
        &router,
        "POST",
        "/api/garantias",
        Some(garantia_payload("356000000000301", "2027-06-01")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let garantia_id = garantia["id"].as_str().unwrap().to_string();

    let tratativa = json!({ "tipo": "ENCAMINHADO_ASSISTENCIA", "descricao": "Não carrega" });
    let uri = format!("/api/garantias/{garantia_id}/tratativas");

    let (status, primeira) = call(&router, "POST", &uri, Some(tratativa.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(primeira["tratativa"]["status"], "EM_ANDAMENTO");
    assert_eq!(primeira["os"]["proximaAtuacao"], "TECNICO");

    let (status, erro) = call(&router, "POST", &uri, Some(tratativa)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(erro["code"], "ACTIVE_TREATMENT_CONFLICT");
    assert_eq!(erro["details"]["tratativaId"], primeira["tratativa"]["id"]);

    let (status, detalhe) = call(&router, "GET", &format!("/api/garantias/{garantia_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detalhe["status"], "EM_TRATATIVA");
    assert_eq!(detalhe["sla"]["nivel"], "NORMAL");

    let (status, timeline) = call(
        &router,
        "GET",
        &format!("/api/casos/{garantia_id}/timeline"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline.as_array().unwrap().len(), 2);
    assert_eq!(timeline[0]["usuarioNome"], "Ana");
}

#[tokio::test]
async fn loaner_return_without_photo_is_unprocessable() {
    let router = make_router();
    let (_, garantia) = call(
        &router,
        "POST",
        "/api/garantias",
        Some(garantia_payload("356000000000302", "2027-06-01")),
    )
    .await;

    let (status, iniciada) = call(
        &router,
        "POST",
        &format!("/api/garantias/{}/tratativas", garantia["id"].as_str().unwrap()),
        Some(json!({ "tipo": "ASSISTENCIA_MAIS_EMPRESTIMO", "descricao": "Tela apagada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, erro) = call(
        &router,
        "POST",
        &format!("/api/tratativas/{}/devolucao", iniciada["tratativa"]["id"].as_str().unwrap()),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(erro["code"], "MISSING_REQUIRED_EVIDENCE");
    assert_eq!(erro["details"]["evidencia"], "fotoDevolucao");
}

#[tokio::test]
async fn service_order_guard_explains_pending_parts() {
    let router = make_router();

    let (status, os) = call(
        &router,
        "POST",
        "/api/ordens-servico",
        Some(json!({
            "origem": "AVULSO",
            "modelo": "iPhone 13",
            "descricao": "Troca de tela",
            "pecas": [
                { "descricao": "Tela OLED", "valor": 150.0, "quantidade": 1, "pecaDeFornecedor": true }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let os_id = os["id"].as_str().unwrap().to_string();
    let peca_id = os["pecas"][0]["id"].as_str().unwrap().to_string();
    let avancar = format!("/api/ordens-servico/{os_id}/avancar");

    let (status, _) = call(&router, "POST", &avancar, Some(json!({ "status": "EM_SERVICO" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, erro) = call(
        &router,
        "POST",
        &avancar,
        Some(json!({ "status": "SERVICO_CONCLUIDO" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(erro["code"], "INVALID_TRANSITION");
    assert!(erro["details"]["motivo"]
        .as_str()
        .unwrap()
        .contains("1 peça(s) ainda aguardando fornecedor"));

    let (status, recebida) = call(
        &router,
        "POST",
        &format!("/api/ordens-servico/{os_id}/pecas/{peca_id}/recebida"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recebida["efeito"], "APLICADO");

    let (status, concluida) = call(
        &router,
        "POST",
        &avancar,
        Some(json!({ "status": "SERVICO_CONCLUIDO" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(concluida["proximaAtuacao"], "ATENDENTE");

    let (status, fila) = call(&router, "GET", "/api/atuacao/atendente", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fila[0]["id"], os_id.as_str());

    let (status, _) = call(&router, "GET", "/api/atuacao/astronauta", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn adhesion_before_expiry_is_a_conflict() {
    let router = make_router();
    let (_, garantia) = call(
        &router,
        "POST",
        "/api/garantias",
        Some(garantia_payload("356000000000303", "2027-06-01")),
    )
    .await;

    let (status, erro) = call(
        &router,
        "POST",
        &format!("/api/garantias/{}/adesoes", garantia["id"].as_str().unwrap()),
        Some(json!({ "nivel": "SILVER" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(erro["code"], "WARRANTY_NOT_YET_EXPIRED");
    assert_eq!(erro["details"]["dataFimGarantia"], "2027-06-01");
}

#[tokio::test]
async fn requests_are_validated_and_attributed() {
    let router = make_router();

    let (status, erro) = call(
        &router,
        "POST",
        "/api/garantias",
        Some(garantia_payload("", "2027-06-01")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(erro["code"], "VALIDATION_ERROR");
    assert!(erro["details"]["imei"].is_array());

    // Sem o cabeçalho do usuário
    let req = Request::post("/api/garantias")
        .header("content-type", "application/json")
        .body(Body::from(garantia_payload("356000000000304", "2027-06-01").to_string()))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn accented_operator_name_reaches_the_timeline() {
    let router = make_router();

    let req = Request::post("/api/garantias")
        .header("content-type", "application/json")
        .header("x-usuario-id", "u-9")
        .header("x-usuario-nome", HeaderValue::from_bytes("João".as_bytes()).unwrap())
        .body(Body::from(garantia_payload("356000000000305", "2027-06-01").to_string()))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let garantia: Value = serde_json::from_slice(&bytes).unwrap();
    let garantia_id = garantia["id"].as_str().unwrap();

    let (status, timeline) = call(
        &router,
        "GET",
        &format!("/api/casos/{garantia_id}/timeline"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline[0]["usuarioId"], "u-9");
    assert_eq!(timeline[0]["usuarioNome"], "João");
}
