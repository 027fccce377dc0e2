// src/services/service_order_service.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::Changeset,
    models::{
        ordem_servico::{
            Atuacao, DebitoEstoque, MeioPagamento, OrdemServico, OrigemOS, PagamentoOS, PecaOS,
            SolicitacaoPeca, StatusOS, StatusSolicitacao,
        },
        timeline::{NovaEntrada, TipoEvento, Usuario},
    },
    services::{
        sla::{compute_sla, Sla},
        treatment_service::concluir_se_pronta,
        Deps, Efeito,
    },
};

// --- Entradas ---

#[derive(Debug, Clone, Default)]
pub struct NovaPeca {
    pub descricao: String,
    pub valor: Decimal,
    pub quantidade: u32,
    pub sku: Option<String>,
    pub peca_no_estoque: bool,
    pub peca_de_fornecedor: bool,
    pub servico_terceirizado: bool,
    pub responsavel_terceirizacao: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NovaOS {
    pub origem: OrigemOS,
    pub tratativa_id: Option<Uuid>,
    pub garantia_id: Option<Uuid>,
    pub imei: Option<String>,
    pub modelo: String,
    pub cliente_nome: Option<String>,
    pub descricao: String,
    pub tecnico_id: Option<String>,
    pub pecas: Vec<NovaPeca>,
}

#[derive(Debug, Clone)]
pub struct NovaSolicitacao {
    pub descricao: String,
    pub quantidade: u32,
    pub valor_estimado: Decimal,
    pub justificativa: String,
}

/// Dados que acompanham um avanço de status. Cada destino usa o que precisa.
#[derive(Debug, Clone, Default)]
pub struct AvancoOS {
    pub observacao: Option<String>,
    pub tecnico_id: Option<String>,
    pub motivo: Option<String>,
    pub solicitacao: Option<NovaSolicitacao>,
    pub pagamento: Option<(MeioPagamento, Decimal)>,
}

// --- Leitura ---

/// OS com os campos derivados (nunca gravados).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrdemServicoView {
    #[serde(flatten)]
    pub os: OrdemServico,
    pub proxima_atuacao: Atuacao,
    pub sla: Option<Sla>,
    pub valor_total: Decimal,
    pub valor_devido: Decimal,
}

#[derive(Clone)]
pub struct ServiceOrderService {
    deps: Deps,
}

fn texto_obrigatorio(valor: Option<&str>, campo: &str) -> Result<String, AppError> {
    match valor.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::MissingRequiredField(campo.to_string())),
    }
}

fn validar_pecas(pecas: Vec<NovaPeca>) -> Result<Vec<PecaOS>, AppError> {
    pecas
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let descricao = texto_obrigatorio(Some(p.descricao.as_str()), &format!("pecas[{i}].descricao"))?;
            if p.quantidade == 0 {
                return Err(AppError::MissingRequiredField(format!("pecas[{i}].quantidade")));
            }
            if p.valor < Decimal::ZERO {
                return Err(AppError::invalid_transition(
                    "-",
                    StatusOS::EmAberto,
                    format!("peça '{descricao}' com valor negativo"),
                ));
            }
            if p.peca_no_estoque && p.peca_de_fornecedor {
                return Err(AppError::invalid_transition(
                    "-",
                    StatusOS::EmAberto,
                    format!("peça '{descricao}' não pode vir do estoque e do fornecedor ao mesmo tempo"),
                ));
            }
            let sku = if p.peca_no_estoque {
                Some(texto_obrigatorio(p.sku.as_deref(), &format!("pecas[{i}].sku"))?)
            } else {
                p.sku
            };
            let responsavel_terceirizacao = if p.peca_de_fornecedor && p.servico_terceirizado {
                Some(texto_obrigatorio(
                    p.responsavel_terceirizacao.as_deref(),
                    &format!("pecas[{i}].responsavelTerceirizacao"),
                )?)
            } else {
                p.responsavel_terceirizacao
            };

            Ok(PecaOS {
                id: Uuid::new_v4(),
                descricao,
                valor: p.valor,
                quantidade: p.quantidade,
                sku,
                peca_no_estoque: p.peca_no_estoque,
                peca_de_fornecedor: p.peca_de_fornecedor,
                servico_terceirizado: p.servico_terceirizado,
                responsavel_terceirizacao,
                aguardando_fornecedor: p.peca_de_fornecedor,
                recebida_em: None,
                debito_estoque: if p.peca_no_estoque {
                    DebitoEstoque::Pendente
                } else {
                    DebitoEstoque::NaoAplicavel
                },
            })
        })
        .collect()
}

impl ServiceOrderService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn view(&self, os: OrdemServico) -> OrdemServicoView {
        let sla = os
            .aberta()
            .then(|| compute_sla(os.data_abertura.date_naive(), self.deps.clock.today()));
        OrdemServicoView {
            proxima_atuacao: os.proxima_atuacao(),
            valor_total: os.valor_total(),
            valor_devido: os.valor_devido(),
            sla,
            os,
        }
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    /// Monta a OS validada (versão 1), sem gravar.
    pub(crate) async fn build_os(&self, nova: NovaOS) -> Result<OrdemServico, AppError> {
        let modelo = texto_obrigatorio(Some(nova.modelo.as_str()), "modelo")?;
        let descricao = texto_obrigatorio(Some(nova.descricao.as_str()), "descricao")?;
        let pecas = validar_pecas(nova.pecas)?;
        let numero = self.deps.store.next_numero_os().await?;
        let agora = self.deps.clock.now();

        Ok(OrdemServico {
            id: Uuid::new_v4(),
            numero,
            status: StatusOS::EmAberto,
            origem: nova.origem,
            tratativa_id: nova.tratativa_id,
            garantia_id: nova.garantia_id,
            imei: nova.imei.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()),
            modelo,
            cliente_nome: nova.cliente_nome,
            descricao,
            tecnico_id: nova.tecnico_id,
            pecas,
            pagamentos: Vec::new(),
            solicitacoes: Vec::new(),
            recusada_tecnico: false,
            motivo_recusa: None,
            data_abertura: agora,
            atualizada_em: agora,
            versao: 1,
        })
    }

    pub(crate) fn entrada_abertura(&self, os: &OrdemServico, usuario: &Usuario) -> NovaEntrada {
        self.deps.timeline.entrada(
            os.id,
            TipoEvento::Abertura,
            format!("OS #{} aberta", os.numero),
            format!(
                "{} ({:?}) - {} peça(s) - {}",
                os.modelo,
                os.origem,
                os.pecas.len(),
                os.descricao
            ),
            usuario,
        )
    }

    /// Abre uma OS avulsa (balcão, venda ou estoque). OS de garantia nasce da
    /// tratativa.
    pub async fn create_service_order(
        &self,
        nova: NovaOS,
        usuario: &Usuario,
    ) -> Result<OrdemServicoView, AppError> {
        if nova.origem == OrigemOS::Garantia || nova.tratativa_id.is_some() {
            return Err(AppError::invalid_transition(
                "-",
                StatusOS::EmAberto,
                "OS de garantia é aberta pela tratativa da garantia",
            ));
        }

        // Travas: imei → os. A do IMEI vale até o commit, para que nenhuma
        // tratativa tome o aparelho entre a checagem e a gravação.
        let imei = nova
            .imei
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(str::to_string);
        let trava_imei = match &imei {
            Some(imei) => Some(self.deps.locks.imei(imei).await),
            None => None,
        };
        if let Some(imei) = &imei {
            // Aparelho já está num fluxo de garantia: o operador vai para o caso existente
            self.deps.guard.ensure_free(imei)?;
        }

        let os = self.build_os(nova).await?;
        let _trava_os = self.deps.locks.os(os.id).await;

        let mut changes = Changeset::new();
        changes.timeline.push(self.entrada_abertura(&os, usuario));
        changes.ordens.push(os.clone());
        self.deps.store.commit(changes).await?;
        drop(trava_imei);

        tracing::info!(os_id = %os.id, numero = os.numero, origem = ?os.origem, "✅ OS aberta");

        let os = self.debit_stock_parts(os, usuario).await?;
        Ok(self.view(os))
    }

    /// Baixa no estoque as peças marcadas como "do estoque". Roda uma única
    /// vez, logo após a abertura; o resultado fica gravado em cada peça e
    /// falhas não são repetidas.
    pub(crate) async fn debit_stock_parts(
        &self,
        mut os: OrdemServico,
        usuario: &Usuario,
    ) -> Result<OrdemServico, AppError> {
        let pendentes: Vec<usize> = os
            .pecas
            .iter()
            .enumerate()
            .filter(|(_, p)| p.debito_estoque == DebitoEstoque::Pendente)
            .map(|(i, _)| i)
            .collect();
        if pendentes.is_empty() {
            return Ok(os);
        }

        let mut changes = Changeset::new();
        for i in pendentes {
            let peca = &mut os.pecas[i];
            let sku = peca.sku.clone().unwrap_or_default();
            match self.deps.inventory.debit_part(&sku, peca.quantidade).await {
                Ok(()) => {
                    peca.debito_estoque = DebitoEstoque::Debitado;
                    changes.timeline.push(self.deps.timeline.entrada(
                        os.id,
                        TipoEvento::Estoque,
                        "Baixa de estoque",
                        format!("{} x{} (SKU {sku})", peca.descricao, peca.quantidade),
                        usuario,
                    ));
                }
                Err(e) => {
                    tracing::warn!(os_id = %os.id, sku = %sku, error = %e, "Falha na baixa de estoque; não será repetida");
                    peca.debito_estoque = DebitoEstoque::Falhou(e.to_string());
                    changes.timeline.push(self.deps.timeline.entrada(
                        os.id,
                        TipoEvento::Estoque,
                        "Falha na baixa de estoque",
                        format!("{} (SKU {sku}): {e}", peca.descricao),
                        usuario,
                    ));
                }
            }
        }

        os.versao += 1;
        os.atualizada_em = self.deps.clock.now();
        changes.ordens.push(os.clone());
        self.deps.store.commit(changes).await?;
        Ok(os)
    }

    // =========================================================================
    //  TRANSIÇÕES
    // =========================================================================

    pub async fn advance_service_order(
        &self,
        os_id: Uuid,
        destino: StatusOS,
        avanco: AvancoOS,
        usuario: &Usuario,
    ) -> Result<OrdemServicoView, AppError> {
        if destino == StatusOS::RecusadaPeloTecnico {
            return self
                .reject_service_order(os_id, avanco.motivo.as_deref().unwrap_or_default(), usuario)
                .await;
        }

        let _trava_os = self.deps.locks.os(os_id).await;
        let mut os = self.load(os_id).await?;
        let origem = os.status;

        self.checar_transicao(&os, destino)?;

        let agora = self.deps.clock.now();
        let mut changes = Changeset::new();
        let mut detalhe = avanco.observacao.clone().unwrap_or_default();

        // 1. Regras específicas do destino
        match destino {
            StatusOS::EmServico => {
                if let Some(tecnico) = avanco.tecnico_id.as_deref() {
                    os.tecnico_id = Some(tecnico.to_string());
                }
            }
            StatusOS::ServicoConcluido => {
                let aguardando = os.pecas_aguardando_fornecedor();
                if aguardando > 0 {
                    return Err(AppError::invalid_transition(
                        origem,
                        destino,
                        format!("não é possível concluir: {aguardando} peça(s) ainda aguardando fornecedor"),
                    ));
                }
            }
            StatusOS::SolicitacaoEnviada => {
                let s = avanco
                    .solicitacao
                    .clone()
                    .ok_or_else(|| AppError::MissingRequiredField("solicitacao".into()))?;
                let descricao = texto_obrigatorio(Some(s.descricao.as_str()), "solicitacao.descricao")?;
                let justificativa =
                    texto_obrigatorio(Some(s.justificativa.as_str()), "solicitacao.justificativa")?;
                if s.quantidade == 0 {
                    return Err(AppError::MissingRequiredField("solicitacao.quantidade".into()));
                }
                detalhe = format!("{descricao} x{} - {justificativa}", s.quantidade);
                os.solicitacoes.push(SolicitacaoPeca {
                    id: Uuid::new_v4(),
                    descricao,
                    quantidade: s.quantidade,
                    valor_estimado: s.valor_estimado,
                    justificativa,
                    status: StatusSolicitacao::Pendente,
                    motivo_rejeicao: None,
                    criada_em: agora,
                    decidida_em: None,
                });
            }
            StatusOS::PecaAprovada => {
                let s = os.solicitacao_pendente_mut().ok_or_else(|| {
                    AppError::invalid_transition(origem, destino, "nenhuma solicitação de peça pendente")
                })?;
                s.status = StatusSolicitacao::Aprovada;
                s.decidida_em = Some(agora);
                detalhe = format!("Solicitação aprovada: {}", s.descricao);
            }
            StatusOS::PecaRejeitada => {
                let motivo = texto_obrigatorio(avanco.motivo.as_deref(), "motivo")?;
                let s = os.solicitacao_pendente_mut().ok_or_else(|| {
                    AppError::invalid_transition(origem, destino, "nenhuma solicitação de peça pendente")
                })?;
                s.status = StatusSolicitacao::Rejeitada;
                s.motivo_rejeicao = Some(motivo.clone());
                s.decidida_em = Some(agora);
                detalhe = format!("Solicitação rejeitada: {motivo}");
            }
            StatusOS::PecaRecebida => {
                if origem == StatusOS::PecaAprovada {
                    // A peça aprovada entra na OS já recebida
                    let aprovada = os
                        .solicitacoes
                        .iter()
                        .rev()
                        .find(|s| s.status == StatusSolicitacao::Aprovada)
                        .cloned()
                        .ok_or_else(|| {
                            AppError::invalid_transition(origem, destino, "nenhuma solicitação aprovada")
                        })?;
                    os.pecas.push(PecaOS {
                        id: Uuid::new_v4(),
                        descricao: aprovada.descricao.clone(),
                        valor: aprovada.valor_estimado,
                        quantidade: aprovada.quantidade,
                        sku: None,
                        peca_no_estoque: false,
                        peca_de_fornecedor: true,
                        servico_terceirizado: false,
                        responsavel_terceirizacao: None,
                        aguardando_fornecedor: false,
                        recebida_em: Some(agora),
                        debito_estoque: DebitoEstoque::NaoAplicavel,
                    });
                    detalhe = format!("Peça recebida: {}", aprovada.descricao);
                } else {
                    let aguardando = os.pecas_aguardando_fornecedor();
                    if aguardando > 0 {
                        return Err(AppError::invalid_transition(
                            origem,
                            destino,
                            format!("{aguardando} peça(s) ainda aguardando fornecedor"),
                        ));
                    }
                }
            }
            StatusOS::AguardandoConferencia => {
                if let Some((meio, valor)) = avanco.pagamento {
                    self.push_pagamento(&mut os, meio, valor, agora, usuario, &mut changes)?;
                }
                let devido = os.valor_devido();
                if devido > Decimal::ZERO {
                    return Err(AppError::invalid_transition(
                        origem,
                        destino,
                        format!("ainda há R$ {devido} a receber; registre o pagamento"),
                    ));
                }
            }
            StatusOS::AguardandoPagamento => {
                if let Some((meio, valor)) = avanco.pagamento {
                    self.push_pagamento(&mut os, meio, valor, agora, usuario, &mut changes)?;
                }
            }
            StatusOS::EmAberto => {
                // Reatribuição depois da recusa do técnico
                let tecnico = texto_obrigatorio(avanco.tecnico_id.as_deref(), "tecnicoId")?;
                detalhe = format!("Reatribuída ao técnico {tecnico}");
                os.tecnico_id = Some(tecnico);
                os.recusada_tecnico = false;
                os.motivo_recusa = None;
            }
            _ => {}
        }

        // 2. Aplica a transição
        os.status = destino;
        os.atualizada_em = agora;
        os.versao += 1;

        changes.timeline.push(self.deps.timeline.entrada(
            os.id,
            TipoEvento::Transicao,
            format!("{origem} → {destino}"),
            detalhe,
            usuario,
        ));

        // 3. Reparo terminou: a tratativa vinculada pode ser concluída
        let mut imei_liberar = None;
        let _trava_garantia = match (os.tratativa_id, os.garantia_id) {
            (Some(tratativa_id), Some(garantia_id))
                if destino.reparo_concluido() && !origem.reparo_concluido() =>
            {
                let trava = self.deps.locks.garantia(garantia_id).await;
                imei_liberar = self
                    .avaliar_tratativa(tratativa_id, garantia_id, &os, usuario, &mut changes)
                    .await?;
                Some(trava)
            }
            _ => None,
        };

        changes.ordens.push(os.clone());
        self.deps.store.commit(changes).await?;

        if let Some(imei) = imei_liberar {
            self.deps.guard.release(&imei);
            tracing::info!(imei = %imei, os_id = %os.id, "🔓 IMEI liberado");
        }

        tracing::info!(os_id = %os.id, de = ?origem, para = ?destino, "OS avançada");
        Ok(self.view(os))
    }

    async fn avaliar_tratativa(
        &self,
        tratativa_id: Uuid,
        garantia_id: Uuid,
        os: &OrdemServico,
        usuario: &Usuario,
        changes: &mut Changeset,
    ) -> Result<Option<String>, AppError> {
        let Some(mut tratativa) = self.deps.store.get_tratativa(tratativa_id).await? else {
            return Ok(None);
        };
        let Some(mut garantia) = self.deps.store.get_garantia(garantia_id).await? else {
            return Ok(None);
        };
        if !tratativa.em_andamento() {
            return Ok(None);
        }

        if concluir_se_pronta(&self.deps, &mut tratativa, &mut garantia, true, usuario, changes) {
            let imei = tratativa.imei.clone();
            tratativa.os_id = Some(os.id);
            tratativa.versao += 1;
            garantia.versao += 1;
            changes.tratativas.push(tratativa);
            changes.garantias.push(garantia);
            return Ok(Some(imei));
        }

        changes.timeline.push(self.deps.timeline.entrada(
            garantia.id,
            TipoEvento::Tratativa,
            "Reparo concluído",
            format!(
                "OS #{} concluída; aguardando devolução do aparelho emprestado {}",
                os.numero,
                tratativa.aparelho_emprestado_id.as_deref().unwrap_or("-")
            ),
            usuario,
        ));
        Ok(None)
    }

    fn checar_transicao(&self, os: &OrdemServico, destino: StatusOS) -> Result<(), AppError> {
        if os.status.finalizado() {
            return Err(AppError::invalid_transition(
                os.status,
                destino,
                "OS finalizada não pode mais ser alterada",
            ));
        }
        if !os.status.pode_ir_para(destino) {
            let possiveis: Vec<String> = os.status.destinos().iter().map(|s| s.to_string()).collect();
            return Err(AppError::invalid_transition(
                os.status,
                destino,
                format!("transição não permitida; destinos possíveis: {}", possiveis.join(", ")),
            ));
        }
        Ok(())
    }

    /// Recusa do técnico. Exige motivo e mantém a trava do IMEI: o caso
    /// continua aberto esperando reatribuição.
    pub async fn reject_service_order(
        &self,
        os_id: Uuid,
        motivo: &str,
        usuario: &Usuario,
    ) -> Result<OrdemServicoView, AppError> {
        let motivo = texto_obrigatorio(Some(motivo), "motivo")?;

        let _trava_os = self.deps.locks.os(os_id).await;
        let mut os = self.load(os_id).await?;
        let origem = os.status;
        self.checar_transicao(&os, StatusOS::RecusadaPeloTecnico)?;

        os.status = StatusOS::RecusadaPeloTecnico;
        os.recusada_tecnico = true;
        os.motivo_recusa = Some(motivo.clone());
        os.atualizada_em = self.deps.clock.now();
        os.versao += 1;

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            os.id,
            TipoEvento::Recusa,
            format!("{origem} → {}", StatusOS::RecusadaPeloTecnico),
            motivo,
            usuario,
        ));
        changes.ordens.push(os.clone());
        self.deps.store.commit(changes).await?;

        tracing::info!(os_id = %os.id, imei = ?os.imei, "OS recusada pelo técnico; IMEI segue reservado");
        Ok(self.view(os))
    }

    // =========================================================================
    //  PEÇAS E PAGAMENTOS
    // =========================================================================

    pub async fn receive_part(
        &self,
        os_id: Uuid,
        peca_id: Uuid,
        usuario: &Usuario,
    ) -> Result<(OrdemServicoView, Efeito), AppError> {
        let _trava_os = self.deps.locks.os(os_id).await;
        let mut os = self.load(os_id).await?;
        if os.status.finalizado() {
            return Err(AppError::invalid_transition(
                os.status,
                os.status,
                "OS finalizada não pode mais ser alterada",
            ));
        }

        let agora = self.deps.clock.now();
        let peca = os
            .pecas
            .iter_mut()
            .find(|p| p.id == peca_id)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Peça {peca_id} na OS {os_id}")))?;

        if !peca.aguardando_fornecedor {
            return Ok((self.view(os), Efeito::NoOp));
        }
        peca.aguardando_fornecedor = false;
        peca.recebida_em = Some(agora);
        let descricao = peca.descricao.clone();

        os.atualizada_em = agora;
        os.versao += 1;

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            os.id,
            TipoEvento::Peca,
            "Peça recebida do fornecedor",
            format!(
                "{descricao}; restam {} aguardando",
                os.pecas_aguardando_fornecedor()
            ),
            usuario,
        ));
        changes.ordens.push(os.clone());
        self.deps.store.commit(changes).await?;

        Ok((self.view(os), Efeito::Aplicado))
    }

    pub async fn add_payment(
        &self,
        os_id: Uuid,
        meio: MeioPagamento,
        valor: Decimal,
        usuario: &Usuario,
    ) -> Result<OrdemServicoView, AppError> {
        let _trava_os = self.deps.locks.os(os_id).await;
        let mut os = self.load(os_id).await?;
        if os.status.finalizado() {
            return Err(AppError::invalid_transition(
                os.status,
                os.status,
                "OS finalizada não pode mais ser alterada",
            ));
        }

        let agora = self.deps.clock.now();
        let mut changes = Changeset::new();
        self.push_pagamento(&mut os, meio, valor, agora, usuario, &mut changes)?;
        os.atualizada_em = agora;
        os.versao += 1;
        changes.ordens.push(os.clone());
        self.deps.store.commit(changes).await?;

        Ok(self.view(os))
    }

    fn push_pagamento(
        &self,
        os: &mut OrdemServico,
        meio: MeioPagamento,
        valor: Decimal,
        agora: DateTime<Utc>,
        usuario: &Usuario,
        changes: &mut Changeset,
    ) -> Result<(), AppError> {
        if valor <= Decimal::ZERO {
            return Err(AppError::invalid_transition(
                os.status,
                os.status,
                "o valor do pagamento deve ser positivo",
            ));
        }
        os.pagamentos.push(PagamentoOS {
            id: Uuid::new_v4(),
            meio,
            valor,
            registrado_em: agora,
        });
        changes.timeline.push(self.deps.timeline.entrada(
            os.id,
            TipoEvento::Pagamento,
            "Pagamento registrado",
            format!("R$ {valor} via {meio:?}"),
            usuario,
        ));
        Ok(())
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub async fn get_service_order(&self, os_id: Uuid) -> Result<OrdemServicoView, AppError> {
        Ok(self.view(self.load(os_id).await?))
    }

    /// OS abertas cujo próximo atuante é `papel`, das mais antigas para as
    /// mais novas.
    pub async fn get_open_cases_by_actor(
        &self,
        papel: Atuacao,
    ) -> Result<Vec<OrdemServicoView>, AppError> {
        let mut fila: Vec<OrdemServicoView> = self
            .deps
            .store
            .list_os_abertas()
            .await?
            .into_iter()
            .filter(|os| os.proxima_atuacao() == papel)
            .map(|os| self.view(os))
            .collect();
        fila.sort_by(|a, b| {
            let dias = |v: &OrdemServicoView| v.sla.map(|s| s.dias_aberto).unwrap_or(0);
            dias(b).cmp(&dias(a)).then(a.os.numero.cmp(&b.os.numero))
        });
        Ok(fila)
    }

    pub(crate) async fn load(&self, os_id: Uuid) -> Result<OrdemServico, AppError> {
        self.deps
            .store
            .get_os(os_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("OS {os_id}")))
    }
}
