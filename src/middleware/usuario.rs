// src/middleware/usuario.rs

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::{common::error::AppError, models::timeline::Usuario};

// Cabeçalhos que identificam quem está agindo (vão para a timeline)
const USUARIO_ID_HEADER: &str = "x-usuario-id";
const USUARIO_NOME_HEADER: &str = "x-usuario-nome";

/// Usuário da requisição. O id é obrigatório; sem nome, usa o próprio id.
#[derive(Debug, Clone)]
pub struct UsuarioAtual(pub Usuario);

fn cabecalho(parts: &Parts, nome: &str) -> Result<Option<String>, AppError> {
    match parts.headers.get(nome) {
        Some(valor) => {
            // Nomes de operador chegam em UTF-8 ("João"), não só em ASCII
            let texto = std::str::from_utf8(valor.as_bytes())
                .map_err(|_| AppError::MissingRequiredField(format!("{nome} (caracteres inválidos)")))?;
            Ok(Some(texto.trim().to_string()).filter(|t| !t.is_empty()))
        }
        None => Ok(None),
    }
}

impl<S> FromRequestParts<S> for UsuarioAtual
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = cabecalho(parts, USUARIO_ID_HEADER)?
            .ok_or_else(|| AppError::MissingRequiredField(USUARIO_ID_HEADER.to_string()))?;
        let nome = cabecalho(parts, USUARIO_NOME_HEADER)?.unwrap_or_else(|| id.clone());

        Ok(UsuarioAtual(Usuario::new(id, nome)))
    }
}
