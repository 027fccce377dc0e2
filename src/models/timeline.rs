// src/models/timeline.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoEvento {
    Abertura,
    Transicao,
    Tratativa,
    Emprestimo,
    Devolucao,
    Troca,
    Peca,
    Estoque,
    Pagamento,
    Recusa,
    Contato,
    Adesao,
    Notificacao,
}

impl TipoEvento {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoEvento::Abertura => "ABERTURA",
            TipoEvento::Transicao => "TRANSICAO",
            TipoEvento::Tratativa => "TRATATIVA",
            TipoEvento::Emprestimo => "EMPRESTIMO",
            TipoEvento::Devolucao => "DEVOLUCAO",
            TipoEvento::Troca => "TROCA",
            TipoEvento::Peca => "PECA",
            TipoEvento::Estoque => "ESTOQUE",
            TipoEvento::Pagamento => "PAGAMENTO",
            TipoEvento::Recusa => "RECUSA",
            TipoEvento::Contato => "CONTATO",
            TipoEvento::Adesao => "ADESAO",
            TipoEvento::Notificacao => "NOTIFICACAO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let tipo = match s {
            "ABERTURA" => TipoEvento::Abertura,
            "TRANSICAO" => TipoEvento::Transicao,
            "TRATATIVA" => TipoEvento::Tratativa,
            "EMPRESTIMO" => TipoEvento::Emprestimo,
            "DEVOLUCAO" => TipoEvento::Devolucao,
            "TROCA" => TipoEvento::Troca,
            "PECA" => TipoEvento::Peca,
            "ESTOQUE" => TipoEvento::Estoque,
            "PAGAMENTO" => TipoEvento::Pagamento,
            "RECUSA" => TipoEvento::Recusa,
            "CONTATO" => TipoEvento::Contato,
            "ADESAO" => TipoEvento::Adesao,
            "NOTIFICACAO" => TipoEvento::Notificacao,
            _ => return None,
        };
        Some(tipo)
    }
}

/// Quem executou a ação (vem dos cabeçalhos da requisição).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Usuario {
    pub id: String,
    pub nome: String,
}

impl Usuario {
    pub fn new(id: impl Into<String>, nome: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nome: nome.into(),
        }
    }

    pub fn sistema() -> Self {
        Self::new("sistema", "Sistema")
    }
}

// --- Structs ---

/// Registro de auditoria. Nunca é alterado nem apagado; a ordem dentro do
/// caso é `(data, sequencia)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: Uuid,
    pub caso_id: Uuid,
    pub sequencia: i64,
    pub data: DateTime<Utc>,
    pub tipo: TipoEvento,
    pub titulo: String,
    pub descricao: String,
    pub usuario_id: String,
    pub usuario_nome: String,
}

/// Entrada ainda não gravada: a sequência é atribuída pelo repositório.
#[derive(Debug, Clone)]
pub struct NovaEntrada {
    pub caso_id: Uuid,
    pub data: DateTime<Utc>,
    pub tipo: TipoEvento,
    pub titulo: String,
    pub descricao: String,
    pub usuario: Usuario,
}

impl NovaEntrada {
    pub fn into_entry(self, sequencia: i64) -> TimelineEntry {
        TimelineEntry {
            id: Uuid::new_v4(),
            caso_id: self.caso_id,
            sequencia,
            data: self.data,
            tipo: self.tipo,
            titulo: self.titulo,
            descricao: self.descricao,
            usuario_id: self.usuario.id,
            usuario_nome: self.usuario.nome,
        }
    }
}
