// src/services/adhesion_service.rs

use chrono::Months;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::Changeset,
    models::{
        comercial::{
            Confirmacao, EtapaAdesao, NivelPlano, NotificacaoFinanceiro, PagamentoAdesao,
            PlanoGarantia, StatusAdesao, TipoComercial, TratativaComercial,
        },
        garantia::{GarantiaItem, StatusGarantia},
        timeline::{TipoEvento, Usuario},
    },
    services::{collaborators::VendaRef, Deps, Efeito},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdesaoRegistrada {
    pub adesao: TratativaComercial,
    pub venda: Option<VendaRef>,
    pub efeito: Efeito,
    /// Preenchido quando o financeiro não recebeu o aviso. A adesão já está
    /// gravada e o reenvio acontece em segundo plano.
    pub aviso: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumoReenvio {
    pub tentadas: usize,
    pub entregues: usize,
    pub falhas: usize,
}

#[derive(Clone)]
pub struct AdhesionService {
    deps: Deps,
}

/// Escolhe o plano do nível: o pedido explicitamente, senão o primeiro
/// compatível com o modelo, senão o primeiro do nível (fallback).
fn selecionar_plano(
    planos: Vec<PlanoGarantia>,
    modelo: &str,
    plano_id: Option<&str>,
    nivel: NivelPlano,
) -> Result<(PlanoGarantia, bool), AppError> {
    if let Some(id) = plano_id {
        let plano = planos
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Plano {id} ({nivel})")))?;
        let fallback = !plano.compativel_com(modelo);
        return Ok((plano, fallback));
    }

    if let Some(plano) = planos.iter().find(|p| p.compativel_com(modelo)) {
        return Ok((plano.clone(), false));
    }
    planos
        .into_iter()
        .next()
        .map(|p| (p, true))
        .ok_or_else(|| AppError::ResourceNotFound(format!("Nenhum plano {nivel} no catálogo")))
}

impl AdhesionService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    // =========================================================================
    //  ABERTURA
    // =========================================================================

    pub async fn start_adhesion(
        &self,
        garantia_id: Uuid,
        nivel: NivelPlano,
        plano_id: Option<&str>,
        usuario: &Usuario,
    ) -> Result<TratativaComercial, AppError> {
        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let garantia = self.load_garantia(garantia_id).await?;

        // 1. Só depois que a garantia original venceu
        let hoje = self.deps.clock.today();
        if garantia.vigente_em(hoje) {
            return Err(AppError::WarrantyNotYetExpired {
                garantia_id,
                data_fim: garantia.data_fim_garantia,
            });
        }

        // 2. Uma adesão por garantia, salvo se o financeiro recusou a anterior
        let existentes = self.deps.store.list_comerciais_by_garantia(garantia_id).await?;
        if let Some(aberta) = existentes
            .iter()
            .find(|c| c.etapa.is_some() && c.status_adesao != Some(StatusAdesao::Rejeitada))
        {
            return Err(AppError::invalid_transition(
                rotulo(aberta.etapa),
                EtapaAdesao::PlanoSelecionado,
                format!("a garantia já tem a adesão {}", aberta.id),
            ));
        }

        // 3. Plano
        let planos = self.deps.catalog.plans(nivel).await?;
        let (plano, fallback) = selecionar_plano(planos, &garantia.modelo, plano_id, nivel)?;

        let mut descricao = format!(
            "Plano {} ({} meses, R$ {}) para {}",
            plano.nome, plano.meses, plano.valor, garantia.modelo
        );
        if fallback {
            tracing::warn!(
                garantia_id = %garantia.id,
                modelo = %garantia.modelo,
                plano = %plano.id,
                "Nenhum plano compatível com o modelo; usando o primeiro do nível"
            );
            descricao.push_str(&format!(
                " - plano por fallback: nenhum plano {nivel} compatível com {}",
                garantia.modelo
            ));
        }

        let adesao = TratativaComercial {
            id: Uuid::new_v4(),
            garantia_id: garantia.id,
            tipo: TipoComercial::from(nivel),
            descricao: descricao.clone(),
            etapa: Some(EtapaAdesao::PlanoSelecionado),
            plano: Some(plano),
            plano_por_fallback: fallback,
            pagamento: None,
            confirmacao1: None,
            confirmacao2: None,
            status_adesao: None,
            venda_conferencia_id: None,
            nova_data_fim: None,
            data_fim_anterior: None,
            notificacao_financeiro: NotificacaoFinanceiro::NaoAplicavel,
            criada_em: self.deps.clock.now(),
            versao: 1,
        };

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia.id,
            TipoEvento::Adesao,
            format!("Adesão {nivel} iniciada"),
            descricao,
            usuario,
        ));
        changes.comerciais.push(adesao.clone());
        self.deps.store.commit(changes).await?;

        tracing::info!(adesao_id = %adesao.id, garantia_id = %garantia.id, ?nivel, "Adesão iniciada");
        Ok(adesao)
    }

    pub async fn register_commercial_contact(
        &self,
        garantia_id: Uuid,
        descricao: &str,
        usuario: &Usuario,
    ) -> Result<TratativaComercial, AppError> {
        let descricao = descricao.trim();
        if descricao.is_empty() {
            return Err(AppError::MissingRequiredField("descricao".into()));
        }

        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let garantia = self.load_garantia(garantia_id).await?;

        let contato = TratativaComercial {
            id: Uuid::new_v4(),
            garantia_id: garantia.id,
            tipo: TipoComercial::ContatoRealizado,
            descricao: descricao.to_string(),
            etapa: None,
            plano: None,
            plano_por_fallback: false,
            pagamento: None,
            confirmacao1: None,
            confirmacao2: None,
            status_adesao: None,
            venda_conferencia_id: None,
            nova_data_fim: None,
            data_fim_anterior: None,
            notificacao_financeiro: NotificacaoFinanceiro::NaoAplicavel,
            criada_em: self.deps.clock.now(),
            versao: 1,
        };

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia.id,
            TipoEvento::Contato,
            "Contato comercial realizado",
            descricao,
            usuario,
        ));
        changes.comerciais.push(contato.clone());
        self.deps.store.commit(changes).await?;
        Ok(contato)
    }

    // =========================================================================
    //  PAGAMENTO E CONFIRMAÇÕES
    // =========================================================================

    pub async fn configure_adhesion_payment(
        &self,
        adesao_id: Uuid,
        pagamento: PagamentoAdesao,
        usuario: &Usuario,
    ) -> Result<TratativaComercial, AppError> {
        let garantia_id = self.load_adesao(adesao_id).await?.garantia_id;
        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let _trava_adesao = self.deps.locks.comercial(adesao_id).await;
        let mut adesao = self.load_adesao(adesao_id).await?;

        let etapa = adesao.etapa;
        if !matches!(
            etapa,
            Some(EtapaAdesao::PlanoSelecionado | EtapaAdesao::PagamentoConfigurado)
        ) {
            return Err(AppError::invalid_transition(
                rotulo(etapa),
                EtapaAdesao::PagamentoConfigurado,
                "o pagamento só pode ser configurado antes da primeira confirmação",
            ));
        }
        if pagamento.valor <= Decimal::ZERO {
            return Err(AppError::MissingRequiredField("pagamento.valor".into()));
        }
        if pagamento.parcelas == 0 {
            return Err(AppError::MissingRequiredField("pagamento.parcelas".into()));
        }

        let descricao = format!(
            "R$ {} via {:?} em {}x",
            pagamento.valor, pagamento.meio, pagamento.parcelas
        );
        adesao.pagamento = Some(pagamento);
        adesao.etapa = Some(EtapaAdesao::PagamentoConfigurado);
        adesao.versao += 1;

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia_id,
            TipoEvento::Pagamento,
            "Pagamento da adesão configurado",
            descricao,
            usuario,
        ));
        changes.comerciais.push(adesao.clone());
        self.deps.store.commit(changes).await?;
        Ok(adesao)
    }

    /// Primeira fase: grava a intenção. Nada é enviado para fora.
    pub async fn confirm_adhesion_step1(
        &self,
        adesao_id: Uuid,
        observacao: Option<String>,
        usuario: &Usuario,
    ) -> Result<(TratativaComercial, Efeito), AppError> {
        let garantia_id = self.load_adesao(adesao_id).await?.garantia_id;
        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let _trava_adesao = self.deps.locks.comercial(adesao_id).await;
        let mut adesao = self.load_adesao(adesao_id).await?;

        match adesao.etapa {
            Some(EtapaAdesao::PagamentoConfigurado) => {}
            Some(EtapaAdesao::Confirmacao1 | EtapaAdesao::Registrada) => {
                return Ok((adesao, Efeito::NoOp));
            }
            outra => {
                return Err(AppError::invalid_transition(
                    rotulo(outra),
                    EtapaAdesao::Confirmacao1,
                    "configure o pagamento antes de confirmar",
                ));
            }
        }

        adesao.confirmacao1 = Some(self.confirmacao(usuario, observacao));
        adesao.etapa = Some(EtapaAdesao::Confirmacao1);
        adesao.versao += 1;

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia_id,
            TipoEvento::Adesao,
            "Adesão: primeira confirmação",
            format!("Confirmada por {}", usuario.nome),
            usuario,
        ));
        changes.comerciais.push(adesao.clone());
        self.deps.store.commit(changes).await?;

        Ok((adesao, Efeito::Aplicado))
    }

    /// Segunda fase: a adesão passa a `Registrada` junto com a venda de
    /// conferência. O financeiro é avisado depois do commit.
    pub async fn confirm_adhesion_step2(
        &self,
        adesao_id: Uuid,
        observacao: Option<String>,
        usuario: &Usuario,
    ) -> Result<AdesaoRegistrada, AppError> {
        let garantia_id = self.load_adesao(adesao_id).await?.garantia_id;
        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let _trava_adesao = self.deps.locks.comercial(adesao_id).await;
        let mut adesao = self.load_adesao(adesao_id).await?;

        match adesao.etapa {
            Some(EtapaAdesao::Confirmacao1) => {}
            Some(EtapaAdesao::Registrada) => {
                return Ok(AdesaoRegistrada {
                    adesao,
                    venda: None,
                    efeito: Efeito::NoOp,
                    aviso: None,
                });
            }
            outra => {
                return Err(AppError::invalid_transition(
                    rotulo(outra),
                    EtapaAdesao::Registrada,
                    "a segunda confirmação exige a primeira",
                ));
            }
        }

        if adesao
            .confirmacao1
            .as_ref()
            .is_some_and(|c| c.responsavel_id == usuario.id)
        {
            return Err(AppError::invalid_transition(
                EtapaAdesao::Confirmacao1,
                EtapaAdesao::Registrada,
                "a segunda confirmação exige outro responsável",
            ));
        }

        let mut garantia = self.load_garantia(garantia_id).await?;
        let pagamento = adesao
            .pagamento
            .clone()
            .ok_or_else(|| AppError::MissingRequiredField("pagamento".into()))?;
        let meses = adesao
            .plano
            .as_ref()
            .map(|p| p.meses)
            .ok_or_else(|| AppError::MissingRequiredField("plano".into()))?;

        // 1. Venda de conferência (idempotente pelo id da adesão)
        let venda = self
            .deps
            .sales
            .create_conference_entry(adesao.id, &pagamento)
            .await?;

        // 2. Registro durável
        let hoje = self.deps.clock.today();
        let nova_data_fim = hoje.checked_add_months(Months::new(meses)).ok_or_else(|| {
            AppError::InternalServerError(anyhow::anyhow!(
                "data fora do calendário: {hoje} + {meses} meses"
            ))
        })?;

        adesao.confirmacao2 = Some(self.confirmacao(usuario, observacao));
        adesao.etapa = Some(EtapaAdesao::Registrada);
        adesao.status_adesao = Some(StatusAdesao::PendenteFinanceiro);
        adesao.venda_conferencia_id = Some(venda.id);
        adesao.nova_data_fim = Some(nova_data_fim);
        adesao.data_fim_anterior = Some(garantia.data_fim_garantia);
        adesao.notificacao_financeiro = NotificacaoFinanceiro::Pendente {
            tentativas: 0,
            ultimo_erro: None,
        };
        adesao.versao += 1;

        // A cobertura nova vale daqui para frente; uma garantia já encerrada
        // volta a aceitar tratativas.
        garantia.data_fim_garantia = nova_data_fim;
        if garantia.status == StatusGarantia::Concluida {
            garantia.status = StatusGarantia::Ativa;
        }
        garantia.versao += 1;

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia_id,
            TipoEvento::Adesao,
            "Adesão registrada",
            format!(
                "Segunda confirmação por {}; venda de conferência {}; cobertura até {nova_data_fim}",
                usuario.nome, venda.id
            ),
            usuario,
        ));
        changes.comerciais.push(adesao.clone());
        changes.garantias.push(garantia);
        self.deps.store.commit(changes).await?;

        tracing::info!(adesao_id = %adesao.id, venda_id = %venda.id, %nova_data_fim, "✅ Adesão registrada");

        // 3. Aviso ao financeiro, isolado do registro
        let (adesao, aviso) = self.notificar(adesao, usuario).await;

        Ok(AdesaoRegistrada {
            adesao,
            venda: Some(venda),
            efeito: Efeito::Aplicado,
            aviso,
        })
    }

    // =========================================================================
    //  FINANCEIRO
    // =========================================================================

    /// Reenvia ao financeiro as adesões registradas que ainda não foram
    /// entregues.
    pub async fn retry_pending_notifications(&self) -> Result<ResumoReenvio, AppError> {
        let pendentes = self.deps.store.list_notificacoes_pendentes().await?;
        let mut resumo = ResumoReenvio::default();
        let sistema = Usuario::sistema();

        for pendente in pendentes {
            let _trava_garantia = self.deps.locks.garantia(pendente.garantia_id).await;
            let _trava_adesao = self.deps.locks.comercial(pendente.id).await;
            let Some(adesao) = self.deps.store.get_comercial(pendente.id).await? else {
                continue;
            };
            if !adesao.notificacao_financeiro.pendente() {
                continue;
            }

            resumo.tentadas += 1;
            match self.notificar(adesao, &sistema).await {
                (_, None) => resumo.entregues += 1,
                (_, Some(_)) => resumo.falhas += 1,
            }
        }

        if resumo.tentadas > 0 {
            tracing::info!(
                tentadas = resumo.tentadas,
                entregues = resumo.entregues,
                falhas = resumo.falhas,
                "Reenvio de notificações ao financeiro"
            );
        }
        Ok(resumo)
    }

    /// Veredito do financeiro sobre uma adesão registrada. Na recusa, a
    /// garantia volta ao fim anterior, a menos que outra adesão já o tenha
    /// mudado.
    pub async fn record_finance_decision(
        &self,
        adesao_id: Uuid,
        aprovada: bool,
        motivo: Option<String>,
        usuario: &Usuario,
    ) -> Result<(TratativaComercial, Efeito), AppError> {
        let motivo = motivo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        if !aprovada && motivo.is_none() {
            return Err(AppError::MissingRequiredField("motivo".into()));
        }

        let garantia_id = self.load_adesao(adesao_id).await?.garantia_id;
        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let _trava_adesao = self.deps.locks.comercial(adesao_id).await;
        let mut adesao = self.load_adesao(adesao_id).await?;

        let alvo = if aprovada {
            StatusAdesao::Concluida
        } else {
            StatusAdesao::Rejeitada
        };
        match adesao.status_adesao {
            Some(StatusAdesao::PendenteFinanceiro) => {}
            Some(atual) if atual == alvo => return Ok((adesao, Efeito::NoOp)),
            atual => {
                return Err(AppError::invalid_transition(
                    atual.map(|s| s.to_string()).unwrap_or_else(|| rotulo(adesao.etapa)),
                    alvo,
                    "o financeiro só decide adesões registradas e pendentes",
                ));
            }
        }

        adesao.status_adesao = Some(alvo);
        // O veredito prova que o financeiro recebeu a adesão
        if adesao.notificacao_financeiro.pendente() {
            adesao.notificacao_financeiro = NotificacaoFinanceiro::Entregue {
                em: self.deps.clock.now(),
            };
        }
        adesao.versao += 1;

        let mut changes = Changeset::new();
        if !aprovada {
            let mut garantia = self.load_garantia(garantia_id).await?;
            if let (Some(anterior), true) = (
                adesao.data_fim_anterior,
                adesao.nova_data_fim == Some(garantia.data_fim_garantia),
            ) {
                garantia.data_fim_garantia = anterior;
                garantia.versao += 1;
                changes.garantias.push(garantia);
            }
        }

        let (titulo, descricao) = if aprovada {
            (
                "Adesão aprovada pelo financeiro",
                format!("Adesão {} concluída", adesao.id),
            )
        } else {
            ("Adesão recusada pelo financeiro", motivo.unwrap_or_default())
        };
        changes.timeline.push(self.deps.timeline.entrada(
            garantia_id,
            TipoEvento::Adesao,
            titulo,
            descricao,
            usuario,
        ));
        changes.comerciais.push(adesao.clone());
        self.deps.store.commit(changes).await?;

        tracing::info!(adesao_id = %adesao.id, status = %alvo, "Veredito do financeiro gravado");
        Ok((adesao, Efeito::Aplicado))
    }

    /// Tenta avisar o financeiro e grava o resultado. Nunca desfaz a adesão:
    /// devolve o registro atualizado e, em caso de falha, a mensagem.
    async fn notificar(
        &self,
        mut adesao: TratativaComercial,
        usuario: &Usuario,
    ) -> (TratativaComercial, Option<String>) {
        let anterior = adesao.clone();
        let tentativas = match &adesao.notificacao_financeiro {
            NotificacaoFinanceiro::Pendente { tentativas, .. } => *tentativas,
            _ => 0,
        };

        let (entrada, aviso) = match self.deps.finance.notify_adhesion(&adesao).await {
            Ok(()) => {
                adesao.notificacao_financeiro = NotificacaoFinanceiro::Entregue {
                    em: self.deps.clock.now(),
                };
                let entrada = self.deps.timeline.entrada(
                    adesao.garantia_id,
                    TipoEvento::Notificacao,
                    "Financeiro notificado",
                    format!("Adesão {} enviada para conferência", adesao.id),
                    usuario,
                );
                (entrada, None)
            }
            Err(e) => {
                let falha = AppError::DownstreamNotificationFailure(e.to_string());
                tracing::warn!(adesao_id = %adesao.id, tentativa = tentativas + 1, error = %falha, "Financeiro não notificado; fica pendente");
                adesao.notificacao_financeiro = NotificacaoFinanceiro::Pendente {
                    tentativas: tentativas + 1,
                    ultimo_erro: Some(e.to_string()),
                };
                let entrada = self.deps.timeline.entrada(
                    adesao.garantia_id,
                    TipoEvento::Notificacao,
                    "Falha ao notificar o financeiro",
                    format!("Tentativa {}: {e}", tentativas + 1),
                    usuario,
                );
                (entrada, Some(falha.to_string()))
            }
        };

        adesao.versao += 1;
        let mut changes = Changeset::new();
        changes.timeline.push(entrada);
        changes.comerciais.push(adesao.clone());

        match self.deps.store.commit(changes).await {
            Ok(_) => (adesao, aviso),
            Err(e) => {
                tracing::error!(adesao_id = %adesao.id, error = %e, "Falha ao gravar o resultado da notificação");
                (anterior, aviso)
            }
        }
    }

    fn confirmacao(&self, usuario: &Usuario, observacao: Option<String>) -> Confirmacao {
        Confirmacao {
            responsavel_id: usuario.id.clone(),
            responsavel_nome: usuario.nome.clone(),
            confirmado_em: self.deps.clock.now(),
            observacao: observacao.filter(|o| !o.trim().is_empty()),
        }
    }

    async fn load_garantia(&self, id: Uuid) -> Result<GarantiaItem, AppError> {
        self.deps
            .store
            .get_garantia(id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Garantia {id}")))
    }

    async fn load_adesao(&self, id: Uuid) -> Result<TratativaComercial, AppError> {
        self.deps
            .store
            .get_comercial(id)
            .await?
            .filter(|c| c.tipo != TipoComercial::ContatoRealizado)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Adesão {id}")))
    }
}

fn rotulo(etapa: Option<EtapaAdesao>) -> String {
    etapa.map(|e| e.to_string()).unwrap_or_else(|| "-".into())
}
