// src/models/ordem_servico.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use utoipa::ToSchema;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusOS {
    EmAberto,
    EmServico,
    ServicoConcluido,
    AguardandoPeca,
    SolicitacaoEnviada,
    EmAnalise,
    PecaAprovada,
    PecaRejeitada,
    PecaRecebida,
    EmExecucao,
    AguardandoPagamento,
    AguardandoConferencia,
    Finalizado,
    RecusadaPeloTecnico,
}

impl StatusOS {
    pub const TODOS: [StatusOS; 14] = [
        StatusOS::EmAberto,
        StatusOS::EmServico,
        StatusOS::ServicoConcluido,
        StatusOS::AguardandoPeca,
        StatusOS::SolicitacaoEnviada,
        StatusOS::EmAnalise,
        StatusOS::PecaAprovada,
        StatusOS::PecaRejeitada,
        StatusOS::PecaRecebida,
        StatusOS::EmExecucao,
        StatusOS::AguardandoPagamento,
        StatusOS::AguardandoConferencia,
        StatusOS::Finalizado,
        StatusOS::RecusadaPeloTecnico,
    ];

    /// Tabela de transições. Qualquer par fora dela é rejeitado.
    pub fn destinos(&self) -> &'static [StatusOS] {
        use StatusOS::*;
        match self {
            EmAberto => &[EmServico, RecusadaPeloTecnico],
            EmServico => &[ServicoConcluido, AguardandoPeca, RecusadaPeloTecnico],
            AguardandoPeca => &[SolicitacaoEnviada, PecaRecebida],
            SolicitacaoEnviada => &[EmAnalise],
            EmAnalise => &[PecaAprovada, PecaRejeitada],
            PecaAprovada => &[PecaRecebida],
            PecaRejeitada => &[AguardandoPeca, EmServico],
            PecaRecebida => &[EmExecucao],
            EmExecucao => &[ServicoConcluido],
            ServicoConcluido => &[AguardandoPagamento, AguardandoConferencia],
            AguardandoPagamento => &[AguardandoConferencia],
            AguardandoConferencia => &[Finalizado],
            RecusadaPeloTecnico => &[EmAberto],
            Finalizado => &[],
        }
    }

    pub fn pode_ir_para(&self, destino: StatusOS) -> bool {
        self.destinos().contains(&destino)
    }

    pub fn finalizado(&self) -> bool {
        *self == StatusOS::Finalizado
    }

    /// O reparo em si terminou (o que libera a tratativa vinculada).
    pub fn reparo_concluido(&self) -> bool {
        matches!(
            self,
            StatusOS::ServicoConcluido
                | StatusOS::AguardandoPagamento
                | StatusOS::AguardandoConferencia
                | StatusOS::Finalizado
        )
    }
}

impl fmt::Display for StatusOS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusOS::EmAberto => "Em aberto",
            StatusOS::EmServico => "Em serviço",
            StatusOS::ServicoConcluido => "Serviço concluído",
            StatusOS::AguardandoPeca => "Aguardando peça",
            StatusOS::SolicitacaoEnviada => "Solicitação enviada",
            StatusOS::EmAnalise => "Em análise",
            StatusOS::PecaAprovada => "Gestor aprovou",
            StatusOS::PecaRejeitada => "Gestor rejeitou",
            StatusOS::PecaRecebida => "Peça recebida",
            StatusOS::EmExecucao => "Em execução",
            StatusOS::AguardandoPagamento => "Aguardando pagamento",
            StatusOS::AguardandoConferencia => "Aguardando conferência",
            StatusOS::Finalizado => "Finalizado",
            StatusOS::RecusadaPeloTecnico => "Recusada pelo técnico",
        };
        f.write_str(s)
    }
}

/// Papel que precisa agir na OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Atuacao {
    Tecnico,
    Atendente,
    Financeiro,
    Gestor,
    Logistica,
    Concluido,
}

impl Atuacao {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tecnico" | "técnico" => Some(Atuacao::Tecnico),
            "atendente" | "vendedor" => Some(Atuacao::Atendente),
            "financeiro" => Some(Atuacao::Financeiro),
            "gestor" => Some(Atuacao::Gestor),
            "logistica" | "logística" => Some(Atuacao::Logistica),
            "concluido" | "concluído" => Some(Atuacao::Concluido),
            _ => None,
        }
    }
}

/// Próximo atuante: função pura do status (e da presença de meio de
/// pagamento quando a OS aguarda pagamento). Nunca é gravado.
pub fn proxima_atuacao(status: StatusOS, tem_meio_pagamento: bool) -> Atuacao {
    use StatusOS::*;
    match status {
        EmAberto | EmServico | AguardandoPeca | PecaRejeitada | PecaRecebida | EmExecucao => {
            Atuacao::Tecnico
        }
        SolicitacaoEnviada | EmAnalise | RecusadaPeloTecnico => Atuacao::Gestor,
        PecaAprovada => Atuacao::Logistica,
        ServicoConcluido => Atuacao::Atendente,
        AguardandoPagamento if tem_meio_pagamento => Atuacao::Financeiro,
        AguardandoPagamento => Atuacao::Atendente,
        AguardandoConferencia => Atuacao::Financeiro,
        Finalizado => Atuacao::Concluido,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrigemOS {
    Venda,
    Garantia,
    Estoque,
    Avulso,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeioPagamento {
    Pix,
    Dinheiro,
    CartaoCredito,
    CartaoDebito,
    Boleto,
}

/// Resultado da baixa de estoque de uma peça. Só é tentada uma vez.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "situacao", content = "motivo", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebitoEstoque {
    NaoAplicavel,
    Pendente,
    Debitado,
    Falhou(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSolicitacao {
    Pendente,
    Aprovada,
    Rejeitada,
}

// --- Structs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PecaOS {
    pub id: Uuid,
    pub descricao: String,
    pub valor: Decimal,
    pub quantidade: u32,
    pub sku: Option<String>,
    pub peca_no_estoque: bool,
    pub peca_de_fornecedor: bool,
    pub servico_terceirizado: bool,
    pub responsavel_terceirizacao: Option<String>,
    pub aguardando_fornecedor: bool,
    pub recebida_em: Option<DateTime<Utc>>,
    pub debito_estoque: DebitoEstoque,
}

impl PecaOS {
    pub fn total(&self) -> Decimal {
        self.valor * Decimal::from(self.quantidade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagamentoOS {
    pub id: Uuid,
    pub meio: MeioPagamento,
    pub valor: Decimal,
    pub registrado_em: DateTime<Utc>,
}

/// Solicitação de peça encaminhada ao gestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolicitacaoPeca {
    pub id: Uuid,
    pub descricao: String,
    pub quantidade: u32,
    pub valor_estimado: Decimal,
    pub justificativa: String,
    pub status: StatusSolicitacao,
    pub motivo_rejeicao: Option<String>,
    pub criada_em: DateTime<Utc>,
    pub decidida_em: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrdemServico {
    pub id: Uuid,
    pub numero: i64,
    pub status: StatusOS,
    pub origem: OrigemOS,
    pub tratativa_id: Option<Uuid>,
    pub garantia_id: Option<Uuid>,
    pub imei: Option<String>,
    pub modelo: String,
    pub cliente_nome: Option<String>,
    pub descricao: String,
    pub tecnico_id: Option<String>,
    pub pecas: Vec<PecaOS>,
    pub pagamentos: Vec<PagamentoOS>,
    pub solicitacoes: Vec<SolicitacaoPeca>,
    pub recusada_tecnico: bool,
    pub motivo_recusa: Option<String>,
    pub data_abertura: DateTime<Utc>,
    pub atualizada_em: DateTime<Utc>,
    pub versao: i64,
}

impl OrdemServico {
    pub fn proxima_atuacao(&self) -> Atuacao {
        proxima_atuacao(self.status, !self.pagamentos.is_empty())
    }

    pub fn aberta(&self) -> bool {
        !self.status.finalizado()
    }

    pub fn pecas_aguardando_fornecedor(&self) -> usize {
        self.pecas.iter().filter(|p| p.aguardando_fornecedor).count()
    }

    pub fn valor_total(&self) -> Decimal {
        self.pecas.iter().map(PecaOS::total).sum()
    }

    pub fn valor_pago(&self) -> Decimal {
        self.pagamentos.iter().map(|p| p.valor).sum()
    }

    /// Garantia não é cobrada do cliente.
    pub fn valor_devido(&self) -> Decimal {
        if self.origem == OrigemOS::Garantia {
            return Decimal::ZERO;
        }
        (self.valor_total() - self.valor_pago()).max(Decimal::ZERO)
    }

    pub fn solicitacao_pendente_mut(&mut self) -> Option<&mut SolicitacaoPeca> {
        self.solicitacoes
            .iter_mut()
            .rev()
            .find(|s| s.status == StatusSolicitacao::Pendente)
    }
}
