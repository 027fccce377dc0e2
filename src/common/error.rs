// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// Erros do motor de garantias. Todo erro de validação carrega o contexto
// necessário para o operador agir (id conflitante, campo ausente, motivo).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("IMEI {imei} já possui tratativa em andamento ({tratativa_id})")]
    ActiveTreatmentConflict {
        imei: String,
        tratativa_id: Uuid,
        garantia_id: Uuid,
    },

    #[error("Transição inválida de {de} para {para}: {motivo}")]
    InvalidTransition {
        de: String,
        para: String,
        motivo: String,
    },

    #[error("Evidência obrigatória ausente ({evidencia}): {motivo}")]
    MissingRequiredEvidence { evidencia: String, motivo: String },

    #[error("Campo obrigatório ausente: {0}")]
    MissingRequiredField(String),

    #[error("Garantia {garantia_id} ainda vigente até {data_fim}")]
    WarrantyNotYetExpired {
        garantia_id: Uuid,
        data_fim: NaiveDate,
    },

    #[error("Falha ao notificar o financeiro: {0}")]
    DownstreamNotificationFailure(String),

    #[error("Falha no colaborador {colaborador}: {motivo}")]
    CollaboratorFailure { colaborador: String, motivo: String },

    #[error("Conflito de versão em {entidade} {id}: esperado {esperada}, atual {atual}")]
    VersionConflict {
        entidade: &'static str,
        id: Uuid,
        esperada: i64,
        atual: i64,
    },

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_transition(
        de: impl ToString,
        para: impl ToString,
        motivo: impl Into<String>,
    ) -> Self {
        AppError::InvalidTransition {
            de: de.to_string(),
            para: para.to_string(),
            motivo: motivo.into(),
        }
    }

    pub fn collaborator(colaborador: &str, motivo: impl ToString) -> Self {
        AppError::CollaboratorFailure {
            colaborador: colaborador.to_string(),
            motivo: motivo.to_string(),
        }
    }

    /// Código estável para o cliente HTTP (e para logs estruturados).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ActiveTreatmentConflict { .. } => "ACTIVE_TREATMENT_CONFLICT",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::MissingRequiredEvidence { .. } => "MISSING_REQUIRED_EVIDENCE",
            AppError::MissingRequiredField(_) => "MISSING_REQUIRED_FIELD",
            AppError::WarrantyNotYetExpired { .. } => "WARRANTY_NOT_YET_EXPIRED",
            AppError::DownstreamNotificationFailure(_) => "DOWNSTREAM_NOTIFICATION_FAILURE",
            AppError::CollaboratorFailure { .. } => "COLLABORATOR_FAILURE",
            AppError::VersionConflict { .. } => "VERSION_CONFLICT",
            AppError::ResourceNotFound(_) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = self.to_string();

        let (status, details) = match &self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                (StatusCode::BAD_REQUEST, json!(details))
            }
            AppError::ActiveTreatmentConflict {
                imei,
                tratativa_id,
                garantia_id,
            } => (
                StatusCode::CONFLICT,
                json!({ "imei": imei, "tratativaId": tratativa_id, "garantiaId": garantia_id }),
            ),
            AppError::InvalidTransition { de, para, motivo } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "de": de, "para": para, "motivo": motivo }),
            ),
            AppError::MissingRequiredEvidence { evidencia, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "evidencia": evidencia }),
            ),
            AppError::MissingRequiredField(campo) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "campo": campo }))
            }
            AppError::WarrantyNotYetExpired {
                garantia_id,
                data_fim,
            } => (
                StatusCode::CONFLICT,
                json!({ "garantiaId": garantia_id, "dataFimGarantia": data_fim }),
            ),
            AppError::VersionConflict { entidade, id, .. } => (
                StatusCode::CONFLICT,
                json!({ "entidade": entidade, "id": id }),
            ),
            AppError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, json!(null)),
            AppError::CollaboratorFailure { colaborador, .. } => {
                tracing::warn!(code, colaborador = %colaborador, "{}", message);
                (StatusCode::BAD_GATEWAY, json!({ "colaborador": colaborador }))
            }
            AppError::DownstreamNotificationFailure(_) => (StatusCode::BAD_GATEWAY, json!(null)),

            // Falhas de infraestrutura viram 500; o detalhe fica só no log.
            e => {
                tracing::error!(code, "Erro Interno do Servidor: {}", e);
                let body = Json(json!({ "error": "Ocorreu um erro inesperado.", "code": code }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };

        let body = Json(json!({ "error": message, "code": code, "details": details }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409_and_keeps_case_id() {
        let id = Uuid::new_v4();
        let err = AppError::ActiveTreatmentConflict {
            imei: "356789".into(),
            tratativa_id: id,
            garantia_id: Uuid::new_v4(),
        };
        assert!(err.to_string().contains(&id.to_string()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_transition_explains_the_precondition() {
        let err = AppError::invalid_transition(
            "Em serviço",
            "Serviço concluído",
            "2 peça(s) ainda aguardando fornecedor",
        );
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(err.to_string().contains("2 peça(s)"));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
