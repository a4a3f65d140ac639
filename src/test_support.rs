// src/test_support.rs

//! Dublês para os testes: um `AgendaStore` em memória e um cliente de LLM
//! que devolve respostas roteirizadas.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::common::error::{LlmError, StoreError};
use crate::db::AgendaStore;
use crate::models::agenda::{
    BookingChanges, BookingField, BookingFilter, BookingPage, BookingSnapshot, BookingView, BusyInterval, Court,
    CourtFilter, CourtPage, Customer, CustomerKey, CustomerPage, CustomerSearch, NewBooking, NewParticipant,
    PeriodBound, TenantScope, COURT_ACTIVE_STATUS,
};
use crate::services::llm_client::{ChatCompletionClient, Completion, CompletionRequest, LlmToolCall};

// =============================================================================
//  FÁBRICAS
// =============================================================================

pub fn utc(parts: (i32, u32, u32, u32, u32)) -> DateTime<Utc> {
    let (y, m, d, h, mi) = parts;
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

/// Agendamento "scheduled" de Futsal; horários em UTC.
pub fn booking(
    empresa: &str,
    inicio: (i32, u32, u32, u32, u32),
    fim: (i32, u32, u32, u32, u32),
    cliente: &str,
    quadra: &str,
) -> BookingView {
    BookingView {
        agendamento_id: Uuid::new_v4(),
        agendamento_codigo: None,
        codigo_empresa: empresa.to_string(),
        inicio: utc(inicio),
        fim: utc(fim),
        modalidade: Some("Futsal".to_string()),
        agendamento_status: Some("scheduled".to_string()),
        quadra_id: None,
        quadra_nome: Some(quadra.to_string()),
        representante_nome: Some(cliente.to_string()),
        participantes_total: Some(1),
        participantes_pagos: Some(0),
        participantes_pendentes: Some(1),
    }
}

pub fn customer(codigo: &str, nome: &str) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        codigo: Some(codigo.to_string()),
        nome: Some(nome.to_string()),
        email: None,
        telefone: None,
        status: Some("active".to_string()),
    }
}

pub fn court(nome: &str, modalidades: &[&str]) -> Court {
    Court {
        id: Uuid::new_v4(),
        nome: nome.to_string(),
        status: Some(COURT_ACTIVE_STATUS.to_string()),
        modalidades: modalidades.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn tool_call(name: &str, arguments: &str) -> LlmToolCall {
    LlmToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

// =============================================================================
//  STORE EM MEMÓRIA
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    bookings: Mutex<Vec<BookingView>>,
    participants: Mutex<Vec<NewParticipant>>,
    customers: Vec<(String, Customer)>,
    walk_ins: Vec<(String, Uuid)>,
    courts: Vec<(String, Court)>,
    fail_reads: bool,
    fail_writes: bool,
    fail_conflict_check: bool,
    fail_participants: bool,
}

fn boom() -> StoreError {
    StoreError::Query("connection reset by peer".to_string())
}

fn parse_bound(bound: &PeriodBound) -> Result<DateTime<Utc>, StoreError> {
    match bound {
        PeriodBound::Instant(instant) => Ok(*instant),
        PeriodBound::Text(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            })
            .map_err(|_| StoreError::Query(format!("invalid input syntax for type timestamp with time zone: \"{raw}\""))),
    }
}

fn ilike(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

impl MemoryStore {
    pub fn with_booking(self, row: BookingView) -> Self {
        self.bookings.lock().unwrap().push(row);
        self
    }

    pub fn with_customer(mut self, empresa: &str, customer: Customer) -> Self {
        self.customers.push((empresa.to_string(), customer));
        self
    }

    pub fn with_walk_in(mut self, empresa: &str, customer: Customer) -> Self {
        self.walk_ins.push((empresa.to_string(), customer.id));
        self.with_customer(empresa, customer)
    }

    pub fn with_court(mut self, empresa: &str, court: Court) -> Self {
        self.courts.push((empresa.to_string(), court));
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn failing_conflict_check(mut self) -> Self {
        self.fail_conflict_check = true;
        self
    }

    pub fn failing_participants(mut self) -> Self {
        self.fail_participants = true;
        self
    }

    pub fn bookings(&self) -> Vec<BookingView> {
        self.bookings.lock().unwrap().clone()
    }

    pub fn participants(&self) -> Vec<NewParticipant> {
        self.participants.lock().unwrap().clone()
    }

    pub fn clear_bookings(&self) {
        self.bookings.lock().unwrap().clear();
    }

    pub fn retain_booking_by_customer(&self, cliente: &str) {
        self.bookings
            .lock()
            .unwrap()
            .retain(|b| b.representante_nome.as_deref() == Some(cliente));
    }

    fn tenant_courts(&self, empresa: &str) -> Vec<Court> {
        let mut courts: Vec<Court> = self
            .courts
            .iter()
            .filter(|(e, _)| e == empresa)
            .map(|(_, c)| c.clone())
            .collect();
        courts.sort_by(|a, b| a.nome.cmp(&b.nome));
        courts
    }

    fn active_customers<'a>(&'a self, empresa: &'a str) -> impl Iterator<Item = &'a Customer> + 'a {
        self.customers
            .iter()
            .filter(move |(e, c)| e == empresa && c.status.as_deref() == Some("active"))
            .map(|(_, c)| c)
    }
}

fn snapshot(row: &BookingView) -> BookingSnapshot {
    BookingSnapshot {
        id: row.agendamento_id,
        codigo: row.agendamento_codigo,
        inicio: row.inicio,
        fim: row.fim,
        status: row.agendamento_status.clone(),
        modalidade: row.modalidade.clone(),
        quadra_id: row.quadra_id,
    }
}

#[async_trait]
impl AgendaStore for MemoryStore {
    async fn list_bookings(&self, scope: &TenantScope, filter: &BookingFilter) -> Result<BookingPage, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        let period = match &filter.period {
            Some((from, to)) => Some((parse_bound(from)?, parse_bound(to)?)),
            None => None,
        };

        let mut rows: Vec<BookingView> = self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.codigo_empresa == scope.empresa)
            .filter(|b| period.is_none_or(|(from, to)| b.inicio >= from && b.inicio < to))
            .filter(|b| filter.status.as_ref().is_none_or(|s| b.agendamento_status.as_ref() == Some(s)))
            .filter(|b| {
                filter
                    .quadra_id
                    .as_ref()
                    .is_none_or(|q| b.quadra_id.map(|id| id.to_string()).as_ref() == Some(q))
            })
            .filter(|b| filter.cliente_nome.as_ref().is_none_or(|n| ilike(b.representante_nome.as_deref(), n)))
            .filter(|b| {
                filter.representantes.is_empty()
                    || b.representante_nome.as_ref().is_some_and(|n| filter.representantes.contains(n))
            })
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.inicio);

        let total = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.map_or(usize::MAX, |l| l.max(0) as usize))
            .collect();
        Ok(BookingPage { rows, total })
    }

    async fn cancel_bookings(&self, scope: &TenantScope, ids: &[Uuid]) -> Result<u64, StoreError> {
        if self.fail_writes {
            return Err(boom());
        }
        let mut changed = 0;
        for row in self.bookings.lock().unwrap().iter_mut() {
            if row.codigo_empresa == scope.empresa && ids.contains(&row.agendamento_id) {
                row.agendamento_status = Some("canceled".to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn update_booking(
        &self,
        scope: &TenantScope,
        id: Uuid,
        changes: &BookingChanges,
    ) -> Result<Option<BookingSnapshot>, StoreError> {
        if self.fail_writes {
            return Err(boom());
        }
        let mut bookings = self.bookings.lock().unwrap();
        let Some(row) = bookings
            .iter_mut()
            .find(|b| b.codigo_empresa == scope.empresa && b.agendamento_id == id)
        else {
            return Ok(None);
        };

        for (field, value) in &changes.0 {
            match field {
                BookingField::Inicio | BookingField::Fim => {
                    let raw = value.clone().ok_or_else(|| StoreError::Query("null value in column".to_string()))?;
                    let instant = parse_bound(&PeriodBound::Text(raw))?;
                    if *field == BookingField::Inicio {
                        row.inicio = instant;
                    } else {
                        row.fim = instant;
                    }
                }
                BookingField::Status => row.agendamento_status = value.clone(),
                BookingField::Modalidade => row.modalidade = value.clone(),
            }
        }
        Ok(Some(snapshot(row)))
    }

    async fn insert_booking(&self, scope: &TenantScope, booking: &NewBooking) -> Result<BookingSnapshot, StoreError> {
        if self.fail_writes {
            return Err(boom());
        }
        let quadra_nome = booking.quadra_id.and_then(|id| {
            self.courts
                .iter()
                .find(|(_, c)| c.id == id)
                .map(|(_, c)| c.nome.clone())
        });
        let row = BookingView {
            agendamento_id: Uuid::new_v4(),
            agendamento_codigo: None,
            codigo_empresa: scope.empresa.clone(),
            inicio: booking.inicio,
            fim: booking.fim,
            modalidade: booking.modalidade.clone(),
            agendamento_status: Some(booking.status.clone()),
            quadra_id: booking.quadra_id,
            quadra_nome,
            representante_nome: Some(booking.cliente_nome.clone()),
            participantes_total: Some(0),
            participantes_pagos: Some(0),
            participantes_pendentes: Some(0),
        };
        let created = snapshot(&row);
        self.bookings.lock().unwrap().push(row);
        Ok(created)
    }

    async fn insert_participant(&self, _scope: &TenantScope, participant: &NewParticipant) -> Result<(), StoreError> {
        if self.fail_participants {
            return Err(boom());
        }
        self.participants.lock().unwrap().push(participant.clone());
        Ok(())
    }

    async fn court_busy_intervals(
        &self,
        scope: &TenantScope,
        quadra_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, StoreError> {
        if self.fail_conflict_check {
            return Err(boom());
        }
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.codigo_empresa == scope.empresa && b.quadra_id == Some(quadra_id))
            .filter(|b| b.inicio >= from && b.inicio < to)
            .filter(|b| !matches!(b.agendamento_status.as_deref(), Some("canceled" | "cancelled")))
            .map(|b| BusyInterval {
                inicio: b.inicio,
                fim: b.fim,
            })
            .collect())
    }

    async fn find_customer(&self, scope: &TenantScope, key: &CustomerKey) -> Result<Option<Customer>, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        Ok(self
            .customers
            .iter()
            .filter(|(e, _)| *e == scope.empresa)
            .map(|(_, c)| c)
            .find(|c| match key {
                CustomerKey::Codigo(codigo) => c.codigo.as_ref() == Some(codigo),
                CustomerKey::Id(id) => c.id == *id,
            })
            .cloned())
    }

    async fn search_customers(&self, scope: &TenantScope, search: &CustomerSearch) -> Result<CustomerPage, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        let hit = |c: &Customer| -> bool {
            let Some(term) = &search.term else { return true };
            let numeric = term.chars().all(|ch| ch.is_ascii_digit());
            if numeric && c.codigo.as_ref() == Some(term) {
                return true;
            }
            let without_h: String = term.chars().filter(|ch| !matches!(ch, 'h' | 'H')).collect();
            let mut patterns = vec![term.clone()];
            if !numeric && !without_h.is_empty() && without_h != *term {
                patterns.push(without_h);
            }
            patterns.iter().any(|p| {
                ilike(c.nome.as_deref(), p) || ilike(c.email.as_deref(), p) || ilike(c.telefone.as_deref(), p)
            })
        };

        let mut rows: Vec<Customer> = self.active_customers(&scope.empresa).filter(|c| hit(*c)).cloned().collect();
        rows.sort_by(|a, b| a.nome.cmp(&b.nome));
        let total = rows.len() as i64;
        rows.truncate(search.limit.max(0) as usize);
        Ok(CustomerPage { rows, total })
    }

    async fn customers_named(&self, scope: &TenantScope, name: &str, limit: i64) -> Result<Vec<Customer>, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        let mut rows: Vec<Customer> = self
            .active_customers(&scope.empresa)
            .filter(|c| ilike(c.nome.as_deref(), name))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.nome.cmp(&b.nome));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn walk_in_customer(&self, scope: &TenantScope) -> Result<Option<Uuid>, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        Ok(self.walk_ins.iter().find(|(e, _)| *e == scope.empresa).map(|(_, id)| *id))
    }

    async fn list_courts(&self, scope: &TenantScope, filter: &CourtFilter) -> Result<CourtPage, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        let mut rows: Vec<Court> = self
            .tenant_courts(&scope.empresa)
            .into_iter()
            .filter(|c| !filter.active_only || c.status.as_deref() == Some(COURT_ACTIVE_STATUS))
            .collect();
        let total = rows.len() as i64;
        if let Some(limit) = filter.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(CourtPage { rows, total })
    }

    async fn courts_matching(&self, scope: &TenantScope, reference: &str, limit: i64) -> Result<Vec<Court>, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        let mut rows: Vec<Court> = self
            .tenant_courts(&scope.empresa)
            .into_iter()
            .filter(|c| c.id.to_string() == reference || ilike(Some(c.nome.as_str()), reference))
            .collect();
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn find_court(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Court>, StoreError> {
        if self.fail_reads {
            return Err(boom());
        }
        Ok(self.tenant_courts(&scope.empresa).into_iter().find(|c| c.id == id))
    }
}

// =============================================================================
//  LLM ROTEIRIZADA
// =============================================================================

/// Devolve as respostas na ordem em que foram roteirizadas e guarda os pedidos.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<Completion, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn text(content: &str) -> Result<Completion, LlmError> {
    Ok(Completion {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
    })
}

pub fn calls(content: Option<&str>, tool_calls: Vec<LlmToolCall>) -> Result<Completion, LlmError> {
    Ok(Completion {
        content: content.map(str::to_string),
        tool_calls,
    })
}

#[async_trait]
impl ChatCompletionClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("roteiro esgotado".to_string())))
    }
}
