// src/services/tools/create_agendamento.rs

//! Criação de agendamento: valida, resolve cliente e quadra, confere a
//! modalidade e os conflitos de horário, grava e cria o participante padrão.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::error::{RecoverableFailure, StepFailure, StoreError, WriteStep};
use crate::common::lenient::opt_string;
use crate::common::local_time::{local_day_range, local_to_utc, minute_of_local_day, minutes_to_hhmm, MINUTES_PER_DAY};
use crate::common::text::canonical;
use crate::models::agenda::{
    BookingSnapshot, BusyInterval, Court, CourtFilter, Customer, CustomerKey, NewBooking, NewParticipant,
    COURT_ACTIVE_STATUS,
};

use super::{Policy, ToolContext};

static RE_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static RE_TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}$").unwrap());

const DEFAULT_STATUS: &str = "scheduled";
const MIN_FREE_SLOT_MINUTES: i64 = 30;
const CUSTOMER_CANDIDATES_LOOKUP: i64 = 20;
const HISTORY_WINDOW: usize = 6;

#[derive(Debug, Default, Deserialize)]
pub struct CreateAgendamentoArgs {
    #[serde(default, deserialize_with = "opt_string")]
    pub cliente_codigo: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub cliente_nome: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub hora_inicio: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub hora_fim: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub quadra_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub modalidade: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub status: Option<String>,
}

// =============================================================================
//  RESULTADO
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerCandidate {
    pub id: Uuid,
    pub nome: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourtCandidate {
    pub id: Uuid,
    pub nome: String,
}

impl From<&Court> for CourtCandidate {
    fn from(court: &Court) -> Self {
        Self {
            id: court.id,
            nome: court.nome.clone(),
        }
    }
}

/// Intervalo em "HH:MM" no horário local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockInterval {
    pub inicio: String,
    pub fim: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateRejection {
    MissingFields,
    InvalidDate,
    InvalidTime,
    EndBeforeStart,
    CustomerCodeNotFound,
    AmbiguousCustomer(Vec<CustomerCandidate>),
    AmbiguousCourt(Vec<CourtCandidate>),
    ChooseCourt(Vec<CourtCandidate>),
    InvalidModality {
        quadra_id: Uuid,
        requested: Option<String>,
        available: Vec<String>,
    },
    Conflict {
        requested: ClockInterval,
        available: Vec<ClockInterval>,
    },
}

impl CreateRejection {
    pub fn message(&self) -> &'static str {
        match self {
            CreateRejection::MissingFields => {
                "cliente_nome, data, hora_inicio e hora_fim são obrigatórios para create_agendamento."
            }
            CreateRejection::InvalidDate => "Formato de data inválido. Use YYYY-MM-DD.",
            CreateRejection::InvalidTime => "Formato de hora inválido. Use HH:mm.",
            CreateRejection::EndBeforeStart => {
                "O horário final precisa ser depois do horário inicial (use 00:00 para meia-noite do dia seguinte)."
            }
            CreateRejection::CustomerCodeNotFound => {
                "Nenhum cliente encontrado com o código informado para esta empresa."
            }
            CreateRejection::AmbiguousCustomer(_) => {
                "Foram encontrados múltiplos clientes compatíveis com o nome informado. Preciso que você escolha um cliente específico antes de criar o agendamento."
            }
            CreateRejection::AmbiguousCourt(_) => {
                "Foram encontradas múltiplas quadras compatíveis com a referência informada. Preciso que você escolha uma quadra específica."
            }
            CreateRejection::ChooseCourt(_) => "Preciso que você escolha a quadra para este agendamento.",
            CreateRejection::InvalidModality { .. } => {
                "A modalidade informada não é válida para esta quadra. Escolha uma das modalidades disponíveis."
            }
            CreateRejection::Conflict { .. } => {
                "Já existe um agendamento nesse horário para esta quadra. Escolha um dos intervalos disponíveis."
            }
        }
    }

    fn write_details(&self, body: &mut Value) {
        match self {
            CreateRejection::AmbiguousCustomer(candidatos) => body["candidatos"] = json!(candidatos),
            CreateRejection::AmbiguousCourt(quadras) | CreateRejection::ChooseCourt(quadras) => {
                body["quadras_candidatas"] = json!(quadras)
            }
            CreateRejection::InvalidModality {
                quadra_id,
                requested,
                available,
            } => {
                body["quadra_id"] = json!(quadra_id);
                body["requested_modalidade"] = json!(requested);
                body["modalidades_disponiveis"] = json!(available);
            }
            CreateRejection::Conflict { requested, available } => {
                body["conflict"] = json!(true);
                body["requested_interval"] = json!({
                    "hora_inicio": requested.inicio,
                    "hora_fim": requested.fim,
                });
                body["available_intervals"] = json!(available);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created {
        snapshot: BookingSnapshot,
        /// Etapas de cascata que falharam sem derrubar a criação.
        warnings: Vec<RecoverableFailure>,
    },
    Rejected(CreateRejection),
    Failed {
        step: WriteStep,
        error: StoreError,
    },
}

impl From<CreateRejection> for CreateOutcome {
    fn from(rejection: CreateRejection) -> Self {
        CreateOutcome::Rejected(rejection)
    }
}

impl CreateOutcome {
    pub fn policy(&self) -> Policy {
        match self {
            CreateOutcome::Created { .. } => Policy::WriteAllowed("agendamentos:create"),
            CreateOutcome::Rejected(_) => Policy::WriteRejected,
            CreateOutcome::Failed { .. } => Policy::WriteError,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "ok": matches!(self, CreateOutcome::Created { .. }),
            "policy": self.policy().tag(),
            "domain": "agenda",
        });
        match self {
            CreateOutcome::Created { snapshot, .. } => {
                body["created_id"] = json!(snapshot.id);
                body["created_snapshot"] = json!(snapshot);
            }
            CreateOutcome::Rejected(rejection) => {
                body["error"] = json!(rejection.message());
                rejection.write_details(&mut body);
            }
            CreateOutcome::Failed { step, error } => {
                let message = match step {
                    WriteStep::CustomerCodeLookup => format!("Erro ao consultar cliente: {error}"),
                    _ => format!("Erro ao criar agendamento: {error}"),
                };
                body["error"] = json!(message);
            }
        }
        body
    }
}

// =============================================================================
//  REGRAS PURAS
// =============================================================================

fn parse_date(raw: &str) -> Option<NaiveDate> {
    RE_DATE
        .is_match(raw)
        .then(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .flatten()
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    RE_TIME
        .is_match(raw)
        .then(|| NaiveTime::parse_from_str(raw, "%H:%M").ok())
        .flatten()
}

/// Fim "00:00" é meia-noite do dia seguinte.
fn local_end(day: NaiveDate, end: NaiveTime) -> NaiveDateTime {
    if end == NaiveTime::MIN {
        day.and_time(end) + TimeDelta::days(1)
    } else {
        day.and_time(end)
    }
}

fn score_customer(candidate: &Customer, wanted: &str) -> u8 {
    let name = canonical(candidate.nome.as_deref().unwrap_or_default());
    if name == wanted {
        3
    } else if !name.is_empty() && (name.contains(wanted) || wanted.contains(&name)) {
        2
    } else {
        1
    }
}

/// Intervalos ocupados em minutos do dia local, já ordenados.
fn busy_minutes(day: NaiveDate, busy: &[BusyInterval]) -> Vec<(i64, i64)> {
    let mut minutes: Vec<(i64, i64)> = busy
        .iter()
        .map(|interval| {
            let start = minute_of_local_day(day, interval.inicio);
            let end = minute_of_local_day(day, interval.fim).max(start);
            (start, end)
        })
        .collect();
    minutes.sort_unstable();
    minutes
}

fn overlaps(busy: &[(i64, i64)], start: i64, end: i64) -> bool {
    busy.iter().any(|&(s, e)| e > start && s < end)
}

/// Buracos livres do dia com pelo menos 30 minutos.
fn free_intervals(busy: &[(i64, i64)]) -> Vec<ClockInterval> {
    let mut free = Vec::new();
    let mut cursor = 0;
    for &(start, end) in busy {
        if start - cursor >= MIN_FREE_SLOT_MINUTES {
            free.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if MINUTES_PER_DAY - cursor >= MIN_FREE_SLOT_MINUTES {
        free.push((cursor, MINUTES_PER_DAY));
    }
    free.into_iter()
        .map(|(s, e)| ClockInterval {
            inicio: minutes_to_hhmm(s),
            fim: minutes_to_hhmm(e),
        })
        .collect()
}

// =============================================================================
//  EXECUÇÃO
// =============================================================================

/// Estado da criação em andamento: avisos de cascata e cache das quadras.
struct Draft<'c, 'a> {
    ctx: &'c ToolContext<'a>,
    warnings: Vec<RecoverableFailure>,
    courts: Option<Vec<Court>>,
}

impl<'c, 'a> Draft<'c, 'a> {
    /// `Ok(None)` = falha recuperável já registrada; `Err` = falha fatal.
    fn check<T>(&mut self, step: WriteStep, result: Result<T, StoreError>) -> Result<Option<T>, CreateOutcome> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => match step.fail(error) {
                StepFailure::Fatal { step, error } => Err(CreateOutcome::Failed { step, error }),
                StepFailure::Recoverable(failure) => {
                    self.warnings.push(failure);
                    Ok(None)
                }
            },
        }
    }

    /// Todas as quadras do tenant, ordenadas por nome (carregadas uma vez).
    async fn all_courts(&mut self) -> Result<&[Court], CreateOutcome> {
        if self.courts.is_none() {
            let ctx = self.ctx;
            let result = ctx.store.list_courts(ctx.scope, &CourtFilter::default()).await;
            let loaded = self.check(WriteStep::CourtLookup, result)?;
            self.courts = Some(loaded.map(|page| page.rows).unwrap_or_default());
        }
        Ok(self.courts.as_deref().unwrap_or_default())
    }

    async fn resolve_customer(&mut self, args: &CreateAgendamentoArgs, nome: &str) -> Result<Option<Uuid>, CreateOutcome> {
        let ctx = self.ctx;

        if let Some(codigo) = &args.cliente_codigo {
            let key = if codigo.chars().all(|c| c.is_ascii_digit()) {
                CustomerKey::Codigo(codigo.clone())
            } else {
                match Uuid::parse_str(codigo) {
                    Ok(id) => CustomerKey::Id(id),
                    Err(_) => return Err(CreateRejection::CustomerCodeNotFound.into()),
                }
            };
            let result = ctx.store.find_customer(ctx.scope, &key).await;
            return match self.check(WriteStep::CustomerCodeLookup, result)? {
                Some(Some(customer)) => Ok(Some(customer.id)),
                _ => Err(CreateRejection::CustomerCodeNotFound.into()),
            };
        }

        let result = ctx.store.customers_named(ctx.scope, nome, CUSTOMER_CANDIDATES_LOOKUP).await;
        let Some(rows) = self.check(WriteStep::CustomerNameLookup, result)? else {
            return Ok(None);
        };
        if rows.is_empty() {
            return Ok(None);
        }

        let wanted = canonical(nome);
        let mut scored: Vec<CustomerCandidate> = rows
            .iter()
            .map(|c| CustomerCandidate {
                id: c.id,
                nome: c.nome.clone().unwrap_or_default(),
                score: score_customer(c, &wanted),
            })
            .collect();
        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let best = scored[0].score;
        let tied = scored.iter().filter(|c| c.score == best).count();
        if tied == 1 {
            return Ok(Some(scored[0].id));
        }
        scored.truncate(5);
        Err(CreateRejection::AmbiguousCustomer(scored).into())
    }

    /// Referência textual (índice "2" ou nome "quadra central").
    async fn court_by_reference(&mut self, reference: &str) -> Result<Option<Court>, CreateOutcome> {
        if let Ok(index) = reference.parse::<usize>() {
            if index >= 1 {
                if let Some(court) = self.all_courts().await?.get(index - 1) {
                    return Ok(Some(court.clone()));
                }
            }
        }

        let ctx = self.ctx;
        let result = ctx.store.courts_matching(ctx.scope, reference, 3).await;
        let Some(mut matches) = self.check(WriteStep::CourtLookup, result)? else {
            return Ok(None);
        };
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(CreateRejection::AmbiguousCourt(matches.iter().take(5).map(CourtCandidate::from).collect()).into()),
        }
    }

    /// Sem referência utilizável: quadra única, modalidade, nome citado na conversa.
    async fn infer_court(&mut self, modalidade: Option<&str>) -> Result<Option<Court>, CreateOutcome> {
        let ctx = self.ctx;
        let courts = self.all_courts().await?;

        let active: Vec<&Court> = courts
            .iter()
            .filter(|c| c.status.as_deref() == Some(COURT_ACTIVE_STATUS))
            .collect();
        if active.len() == 1 {
            return Ok(Some(active[0].clone()));
        }
        if courts.len() == 1 {
            return Ok(Some(courts[0].clone()));
        }

        if let Some(wanted) = modalidade.map(canonical) {
            let offering: Vec<&Court> = courts
                .iter()
                .filter(|c| c.modalidades.iter().any(|m| canonical(m) == wanted))
                .collect();
            if offering.len() == 1 {
                return Ok(Some(offering[0].clone()));
            }
        }

        let recent: Vec<&str> = ctx
            .history
            .iter()
            .rev()
            .take(HISTORY_WINDOW)
            .map(|turn| turn.content.as_str())
            .chain(std::iter::once(ctx.message))
            .collect();
        let conversation = canonical(&recent.join("\n"));
        let named: Vec<&Court> = courts
            .iter()
            .filter(|c| {
                let nome = canonical(&c.nome);
                !nome.is_empty() && conversation.contains(&nome)
            })
            .collect();
        if named.len() == 1 {
            return Ok(Some(named[0].clone()));
        }

        if courts.len() > 1 {
            return Err(CreateRejection::ChooseCourt(courts.iter().take(10).map(CourtCandidate::from).collect()).into());
        }
        Ok(None)
    }

    async fn resolve_court(&mut self, args: &CreateAgendamentoArgs) -> Result<(Option<Uuid>, Vec<String>), CreateOutcome> {
        let ctx = self.ctx;

        if let Some(reference) = &args.quadra_id {
            if let Ok(id) = Uuid::parse_str(reference) {
                let result = ctx.store.find_court(ctx.scope, id).await;
                let modalidades = self
                    .check(WriteStep::CourtLookup, result)?
                    .flatten()
                    .map(|court| court.modalidades)
                    .unwrap_or_default();
                return Ok((Some(id), modalidades));
            }
            if let Some(court) = self.court_by_reference(reference).await? {
                return Ok((Some(court.id), court.modalidades));
            }
        }

        Ok(match self.infer_court(args.modalidade.as_deref()).await? {
            Some(court) => (Some(court.id), court.modalidades),
            None => (None, Vec::new()),
        })
    }

    /// Fail-open: erro na leitura só gera aviso.
    async fn check_conflicts(
        &mut self,
        quadra_id: Uuid,
        day: NaiveDate,
        start: i64,
        end: i64,
    ) -> Result<(), CreateOutcome> {
        let ctx = self.ctx;
        let (from, to) = local_day_range(day);
        let result = ctx.store.court_busy_intervals(ctx.scope, quadra_id, from, to).await;
        let Some(busy) = self.check(WriteStep::ConflictCheck, result)? else {
            return Ok(());
        };

        let busy = busy_minutes(day, &busy);
        if overlaps(&busy, start, end) {
            return Err(CreateRejection::Conflict {
                requested: ClockInterval {
                    inicio: minutes_to_hhmm(start),
                    fim: minutes_to_hhmm(end),
                },
                available: free_intervals(&busy),
            }
            .into());
        }
        Ok(())
    }

    async fn add_participant(&mut self, booking_id: Uuid, cliente_id: Option<Uuid>, nome: &str) -> Result<(), CreateOutcome> {
        let ctx = self.ctx;
        let participant_id = match cliente_id {
            Some(id) => Some(id),
            None => {
                let result = ctx.store.walk_in_customer(ctx.scope).await;
                self.check(WriteStep::WalkInLookup, result)?.flatten()
            }
        };
        let Some(participant_id) = participant_id else {
            tracing::warn!(agendamento_id = %booking_id, "sem cliente para o participante padrão");
            return Ok(());
        };

        let participant = NewParticipant::default_for(booking_id, participant_id, nome);
        let result = ctx.store.insert_participant(ctx.scope, &participant).await;
        self.check(WriteStep::ParticipantInsert, result)?;
        Ok(())
    }
}

async fn create(draft: &mut Draft<'_, '_>, args: CreateAgendamentoArgs) -> Result<BookingSnapshot, CreateOutcome> {
    let (Some(nome), Some(data), Some(hora_inicio), Some(hora_fim)) =
        (&args.cliente_nome, &args.data, &args.hora_inicio, &args.hora_fim)
    else {
        return Err(CreateRejection::MissingFields.into());
    };

    let day = parse_date(data).ok_or(CreateRejection::InvalidDate)?;
    let (Some(start_time), Some(end_time)) = (parse_time(hora_inicio), parse_time(hora_fim)) else {
        return Err(CreateRejection::InvalidTime.into());
    };

    let cliente_id = draft.resolve_customer(&args, nome).await?;

    let local_start = day.and_time(start_time);
    let local_finish = local_end(day, end_time);
    if local_finish < local_start {
        return Err(CreateRejection::EndBeforeStart.into());
    }

    let (quadra_id, modalidades) = draft.resolve_court(&args).await?;

    let modalidade = match (quadra_id, modalidades.as_slice()) {
        (Some(_), [only]) => Some(only.clone()),
        (Some(quadra_id), available) if !available.is_empty() => {
            let wanted = args.modalidade.as_deref().map(canonical);
            let matched = wanted.and_then(|w| available.iter().find(|m| canonical(m) == w).cloned());
            match matched {
                Some(m) => Some(m),
                None => {
                    return Err(CreateRejection::InvalidModality {
                        quadra_id,
                        requested: args.modalidade.clone(),
                        available: available.to_vec(),
                    }
                    .into())
                }
            }
        }
        _ => args.modalidade.clone(),
    };

    if let Some(quadra_id) = quadra_id {
        let start = minute_of_local_day(day, local_to_utc(local_start));
        let end = minute_of_local_day(day, local_to_utc(local_finish));
        draft.check_conflicts(quadra_id, day, start, end).await?;
    }

    let booking = NewBooking {
        inicio: local_to_utc(local_start),
        fim: local_to_utc(local_finish),
        status: args.status.clone().unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        modalidade,
        quadra_id,
        cliente_id,
        cliente_nome: nome.clone(),
    };

    let ctx = draft.ctx;
    let result = ctx.store.insert_booking(ctx.scope, &booking).await;
    let Some(snapshot) = draft.check(WriteStep::BookingInsert, result)? else {
        // BookingInsert é etapa principal: nunca cai aqui como recuperável.
        return Err(CreateOutcome::Failed {
            step: WriteStep::BookingInsert,
            error: StoreError::Query("insert sem retorno".to_string()),
        });
    };

    draft.add_participant(snapshot.id, cliente_id, nome).await?;
    Ok(snapshot)
}

pub async fn execute(ctx: &ToolContext<'_>, args: CreateAgendamentoArgs) -> CreateOutcome {
    let mut draft = Draft {
        ctx,
        warnings: Vec::new(),
        courts: None,
    };

    match create(&mut draft, args).await {
        Ok(snapshot) => {
            tracing::info!(
                agendamento_id = %snapshot.id,
                warnings = draft.warnings.len(),
                "agendamento criado pela Ísis"
            );
            CreateOutcome::Created {
                snapshot,
                warnings: draft.warnings,
            }
        }
        Err(outcome) => outcome,
    }
}
