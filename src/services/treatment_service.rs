// src/services/treatment_service.rs

use serde::Serialize;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::Changeset,
    models::{
        garantia::{
            GarantiaItem, StatusGarantia, StatusTratativa, TipoTratativa, TratativaGarantia,
        },
        ordem_servico::OrigemOS,
        timeline::{TipoEvento, Usuario},
    },
    services::{
        collaborators::VendaRef,
        service_order_service::{NovaOS, OrdemServicoView, ServiceOrderService},
        Deps, Efeito,
    },
};

#[derive(Debug, Clone)]
pub struct IniciarTratativa {
    pub tipo: TipoTratativa,
    pub descricao: String,
    /// Obrigatório em `TrocaDireta`: aparelho entregue ao cliente.
    pub aparelho_troca_id: Option<String>,
    pub tecnico_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TratativaIniciada {
    pub tratativa: TratativaGarantia,
    pub os: Option<OrdemServicoView>,
    pub venda_troca: Option<VendaRef>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrocaConfirmada {
    pub tratativa: TratativaGarantia,
    pub venda: VendaRef,
    pub efeito: Efeito,
}

/// Conclui a tratativa (e a garantia) quando o reparo terminou e o
/// empréstimo, se houve, voltou. Não incrementa versões nem grava: quem
/// chama decide o que entra no `Changeset`.
pub(crate) fn concluir_se_pronta(
    deps: &Deps,
    tratativa: &mut TratativaGarantia,
    garantia: &mut GarantiaItem,
    reparo_concluido: bool,
    usuario: &Usuario,
    changes: &mut Changeset,
) -> bool {
    if !tratativa.em_andamento() || !reparo_concluido || !tratativa.emprestimo_resolvido() {
        return false;
    }

    tratativa.status = StatusTratativa::Concluido;
    tratativa.concluida_em = Some(deps.clock.now());
    garantia.status = StatusGarantia::Concluida;

    changes.timeline.push(deps.timeline.entrada(
        garantia.id,
        TipoEvento::Tratativa,
        "Tratativa concluída",
        format!("{} concluída; IMEI {} liberado", tratativa.tipo, tratativa.imei),
        usuario,
    ));
    true
}

#[derive(Clone)]
pub struct TreatmentService {
    deps: Deps,
    ordens: ServiceOrderService,
}

impl TreatmentService {
    pub fn new(deps: Deps, ordens: ServiceOrderService) -> Self {
        Self { deps, ordens }
    }

    // =========================================================================
    //  INÍCIO DA TRATATIVA
    // =========================================================================

    pub async fn start_treatment(
        &self,
        garantia_id: Uuid,
        inicio: IniciarTratativa,
        usuario: &Usuario,
    ) -> Result<TratativaIniciada, AppError> {
        let descricao = inicio.descricao.trim().to_string();
        if descricao.is_empty() {
            return Err(AppError::MissingRequiredField("descricao".into()));
        }

        // 1. Travas: imei → garantia
        let imei = self.load_garantia(garantia_id).await?.imei;
        let _trava_imei = self.deps.locks.imei(&imei).await;
        let _trava_garantia = self.deps.locks.garantia(garantia_id).await;
        let mut garantia = self.load_garantia(garantia_id).await?;

        // 2. Exclusividade do IMEI (para todos os tipos)
        let tratativa_id = Uuid::new_v4();
        let reserva = self.deps.guard.try_acquire(&imei, tratativa_id, garantia.id)?;

        // 3. Pré-condições da garantia
        if garantia.status != StatusGarantia::Ativa {
            return Err(AppError::invalid_transition(
                garantia.status,
                StatusGarantia::EmTratativa,
                "só garantias ativas podem receber uma nova tratativa",
            ));
        }
        let hoje = self.deps.clock.today();
        if !garantia.vigente_em(hoje) {
            return Err(AppError::invalid_transition(
                garantia.status,
                StatusGarantia::EmTratativa,
                format!(
                    "garantia expirou em {}; ofereça a garantia estendida",
                    garantia.data_fim_garantia
                ),
            ));
        }

        let aparelho_troca_id = match inicio.tipo {
            TipoTratativa::TrocaDireta => Some(
                inicio
                    .aparelho_troca_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| AppError::MissingRequiredField("aparelhoTrocaId".into()))?
                    .to_string(),
            ),
            _ => None,
        };

        // 4. OS de reparo (nasce junto com a tratativa)
        let os = if inicio.tipo.exige_assistencia() {
            let nova = NovaOS {
                origem: OrigemOS::Garantia,
                tratativa_id: Some(tratativa_id),
                garantia_id: Some(garantia.id),
                imei: Some(imei.clone()),
                modelo: garantia.modelo.clone(),
                cliente_nome: garantia.cliente_nome.clone(),
                descricao: descricao.clone(),
                tecnico_id: inicio.tecnico_id.clone(),
                pecas: Vec::new(),
            };
            Some(self.ordens.build_os(nova).await?)
        } else {
            None
        };

        // 5. Aparelho de empréstimo: alocado uma única vez, na abertura
        let aparelho_emprestado_id = if inicio.tipo == TipoTratativa::AssistenciaMaisEmprestimo {
            Some(self.deps.inventory.allocate_loaner(&garantia.modelo).await?)
        } else {
            None
        };

        let agora = self.deps.clock.now();
        let imediata = !inicio.tipo.exige_assistencia();
        let tratativa = TratativaGarantia {
            id: tratativa_id,
            garantia_id: garantia.id,
            imei: imei.clone(),
            tipo: inicio.tipo,
            status: if imediata {
                StatusTratativa::Concluido
            } else {
                StatusTratativa::EmAndamento
            },
            descricao: descricao.clone(),
            os_id: os.as_ref().map(|o| o.id),
            aparelho_emprestado_id: aparelho_emprestado_id.clone(),
            aparelho_troca_id,
            venda_troca_id: None,
            foto_devolucao: None,
            emprestimo_devolvido_em: None,
            aberta_em: agora,
            concluida_em: imediata.then_some(agora),
            versao: 1,
        };

        garantia.status = if imediata {
            StatusGarantia::Concluida
        } else {
            StatusGarantia::EmTratativa
        };
        garantia.versao += 1;

        let mut changes = Changeset::new();
        let mut detalhe = format!("{}: {descricao}", inicio.tipo);
        if let Some(o) = &os {
            detalhe.push_str(&format!(" - OS #{}", o.numero));
            changes.timeline.push(self.ordens.entrada_abertura(o, usuario));
            changes.ordens.push(o.clone());
        }
        changes.timeline.push(self.deps.timeline.entrada(
            garantia.id,
            TipoEvento::Tratativa,
            if imediata {
                "Tratativa concluída"
            } else {
                "Tratativa iniciada"
            },
            detalhe,
            usuario,
        ));
        if let Some(aparelho) = &aparelho_emprestado_id {
            changes.timeline.push(self.deps.timeline.entrada(
                garantia.id,
                TipoEvento::Emprestimo,
                "Aparelho emprestado",
                format!("Aparelho {aparelho} ({}) entregue ao cliente", garantia.modelo),
                usuario,
            ));
        }
        changes.tratativas.push(tratativa.clone());
        changes.garantias.push(garantia.clone());

        if let Err(e) = self.deps.store.commit(changes).await {
            // Empréstimo sem tratativa gravada volta para o estoque
            if let Some(aparelho) = &aparelho_emprestado_id {
                if let Err(devolucao) = self.deps.inventory.return_loaner(aparelho).await {
                    tracing::error!(aparelho = %aparelho, error = %devolucao, "Falha ao devolver empréstimo após erro no commit");
                }
            }
            return Err(e);
        }

        // 6. A trava fica só enquanto a tratativa estiver em andamento
        if imediata {
            drop(reserva);
        } else {
            reserva.confirmar();
        }

        tracing::info!(
            tratativa_id = %tratativa.id,
            garantia_id = %garantia.id,
            imei = %imei,
            tipo = ?tratativa.tipo,
            "✅ Tratativa registrada"
        );

        // 7. Troca direta: venda de valor zero, fora do commit
        let (tratativa, venda_troca) = if tratativa.tipo == TipoTratativa::TrocaDireta {
            match self.vincular_troca(tratativa.clone(), usuario).await {
                Ok(confirmada) => (confirmada.tratativa, Some(confirmada.venda)),
                Err(e) => {
                    tracing::warn!(tratativa_id = %tratativa.id, error = %e, "Venda de troca pendente; use a confirmação da troca");
                    (tratativa, None)
                }
            }
        } else {
            (tratativa, None)
        };

        Ok(TratativaIniciada {
            tratativa,
            os: os.map(|o| self.ordens.view(o)),
            venda_troca,
        })
    }

    // =========================================================================
    //  DEVOLUÇÃO DO EMPRÉSTIMO
    // =========================================================================

    pub async fn record_loaner_return(
        &self,
        tratativa_id: Uuid,
        foto_devolucao: Option<&str>,
        usuario: &Usuario,
    ) -> Result<(TratativaGarantia, Efeito), AppError> {
        let inicial = self.load_tratativa(tratativa_id).await?;

        // 1. Travas: imei → os → garantia
        let _trava_imei = self.deps.locks.imei(&inicial.imei).await;
        let _trava_os = match inicial.os_id {
            Some(os_id) => Some(self.deps.locks.os(os_id).await),
            None => None,
        };
        let _trava_garantia = self.deps.locks.garantia(inicial.garantia_id).await;

        let mut tratativa = self.load_tratativa(tratativa_id).await?;
        let Some(aparelho) = tratativa.aparelho_emprestado_id.clone() else {
            return Err(AppError::invalid_transition(
                tratativa.status,
                StatusTratativa::Concluido,
                "esta tratativa não tem aparelho emprestado",
            ));
        };
        if tratativa.emprestimo_devolvido_em.is_some() {
            // Repetir a devolução reenvia o aparelho ao estoque
            self.devolver_ao_estoque(&aparelho).await?;
            return Ok((tratativa, Efeito::NoOp));
        }
        if !tratativa.em_andamento() {
            return Err(AppError::invalid_transition(
                tratativa.status,
                StatusTratativa::Concluido,
                "tratativa já encerrada",
            ));
        }

        // 2. Evidência obrigatória
        let foto = foto_devolucao
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| AppError::MissingRequiredEvidence {
                evidencia: "fotoDevolucao".into(),
                motivo: format!("a devolução do aparelho {aparelho} exige foto do aparelho"),
            })?
            .to_string();

        let reparo_concluido = match tratativa.os_id {
            Some(os_id) => self
                .deps
                .store
                .get_os(os_id)
                .await?
                .map(|os| os.status.reparo_concluido())
                .unwrap_or(false),
            None => true,
        };
        let mut garantia = self.load_garantia(tratativa.garantia_id).await?;

        // 3. Devolução gravada primeiro; o estoque recebe o aparelho depois
        tratativa.foto_devolucao = Some(foto);
        tratativa.emprestimo_devolvido_em = Some(self.deps.clock.now());

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            garantia.id,
            TipoEvento::Devolucao,
            "Aparelho emprestado devolvido",
            format!("Aparelho {aparelho} devolvido com foto"),
            usuario,
        ));

        let concluida = concluir_se_pronta(
            &self.deps,
            &mut tratativa,
            &mut garantia,
            reparo_concluido,
            usuario,
            &mut changes,
        );
        tratativa.versao += 1;
        changes.tratativas.push(tratativa.clone());
        if concluida {
            garantia.versao += 1;
            changes.garantias.push(garantia);
        }
        self.deps.store.commit(changes).await?;

        if concluida {
            self.deps.guard.release(&tratativa.imei);
            tracing::info!(imei = %tratativa.imei, %tratativa_id, "🔓 IMEI liberado");
        } else {
            tracing::info!(%tratativa_id, "Empréstimo devolvido; aguardando conclusão do reparo");
        }

        self.devolver_ao_estoque(&aparelho).await?;
        Ok((tratativa, Efeito::Aplicado))
    }

    async fn devolver_ao_estoque(&self, aparelho: &str) -> Result<(), AppError> {
        self.deps.inventory.return_loaner(aparelho).await.map_err(|e| {
            tracing::warn!(aparelho = %aparelho, error = %e, "Devolução gravada sem baixa no estoque");
            AppError::collaborator(
                "estoque",
                format!("devolução gravada, mas o estoque não recebeu o aparelho {aparelho} ({e}); repita a devolução"),
            )
        })
    }

    // =========================================================================
    //  TROCA DIRETA
    // =========================================================================

    /// Garante a venda de troca da tratativa. Pode ser chamada quantas vezes
    /// for preciso: o livro de vendas devolve sempre a mesma venda.
    pub async fn confirm_exchange(
        &self,
        tratativa_id: Uuid,
        usuario: &Usuario,
    ) -> Result<TrocaConfirmada, AppError> {
        let inicial = self.load_tratativa(tratativa_id).await?;
        if inicial.tipo != TipoTratativa::TrocaDireta {
            return Err(AppError::invalid_transition(
                inicial.tipo,
                TipoTratativa::TrocaDireta,
                "apenas tratativas de troca direta geram venda de troca",
            ));
        }

        let _trava_garantia = self.deps.locks.garantia(inicial.garantia_id).await;
        let tratativa = self.load_tratativa(tratativa_id).await?;
        self.vincular_troca(tratativa, usuario).await
    }

    async fn vincular_troca(
        &self,
        mut tratativa: TratativaGarantia,
        usuario: &Usuario,
    ) -> Result<TrocaConfirmada, AppError> {
        let saida = tratativa
            .aparelho_troca_id
            .clone()
            .ok_or_else(|| AppError::MissingRequiredField("aparelhoTrocaId".into()))?;

        let venda = self
            .deps
            .sales
            .create_zero_cash_exchange(tratativa.id, &tratativa.imei, &saida)
            .await?;

        if tratativa.venda_troca_id == Some(venda.id) {
            return Ok(TrocaConfirmada {
                tratativa,
                venda,
                efeito: Efeito::NoOp,
            });
        }

        tratativa.venda_troca_id = Some(venda.id);
        tratativa.versao += 1;

        let mut changes = Changeset::new();
        changes.timeline.push(self.deps.timeline.entrada(
            tratativa.garantia_id,
            TipoEvento::Troca,
            "Venda de troca registrada",
            format!("Venda {} (valor zero): {} → {saida}", venda.id, tratativa.imei),
            usuario,
        ));
        changes.tratativas.push(tratativa.clone());
        self.deps.store.commit(changes).await?;

        tracing::info!(tratativa_id = %tratativa.id, venda_id = %venda.id, "🔁 Troca vinculada à venda");
        Ok(TrocaConfirmada {
            tratativa,
            venda,
            efeito: Efeito::Aplicado,
        })
    }

    async fn load_garantia(&self, id: Uuid) -> Result<GarantiaItem, AppError> {
        self.deps
            .store
            .get_garantia(id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Garantia {id}")))
    }

    async fn load_tratativa(&self, id: Uuid) -> Result<TratativaGarantia, AppError> {
        self.deps
            .store
            .get_tratativa(id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Tratativa {id}")))
    }
}
