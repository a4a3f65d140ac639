// src/db/agenda_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_scoped, error::StoreError},
    db::agenda_store::AgendaStore,
    models::agenda::{
        BookingChanges, BookingFilter, BookingPage, BookingSnapshot, BookingView, BusyInterval,
        COURT_ACTIVE_STATUS, Court, CourtFilter, CourtPage, CourtRow, Customer, CustomerKey,
        CustomerPage, CustomerSearch, NewBooking, NewParticipant, PeriodBound, TenantScope,
    },
};

const BOOKING_VIEW_COLUMNS: &str = r#"
    agendamento_id, agendamento_codigo::bigint AS agendamento_codigo, codigo_empresa::text AS codigo_empresa,
    inicio, fim, modalidade, agendamento_status::text AS agendamento_status,
    quadra_id, quadra_nome, representante_nome,
    participantes_total::bigint AS participantes_total,
    participantes_pagos::bigint AS participantes_pagos,
    participantes_pendentes::bigint AS participantes_pendentes
"#;

const SNAPSHOT_COLUMNS: &str =
    "id, codigo::bigint AS codigo, inicio, fim, status::text AS status, modalidade, quadra_id";

const CUSTOMER_COLUMNS: &str =
    "id, codigo::text AS codigo, nome, email, telefone, status::text AS status";

const COURT_COLUMNS: &str =
    "id, nome, status::text AS status, to_jsonb(modalidades) AS modalidades";

#[derive(Clone)]
pub struct AgendaRepository {
    pool: PgPool,
}

impl AgendaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =========================================================================
//  FILTROS DINÂMICOS
// =========================================================================

fn push_booking_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &TenantScope, filter: &BookingFilter) {
    qb.push(" WHERE codigo_empresa = ").push_bind(scope.empresa.clone());

    if let Some((from, to)) = &filter.period {
        qb.push(" AND inicio >= ");
        push_period_bound(qb, from);
        qb.push(" AND inicio < ");
        push_period_bound(qb, to);
    }
    if let Some(status) = &filter.status {
        qb.push(" AND agendamento_status::text = ").push_bind(status.clone());
    }
    if let Some(quadra) = &filter.quadra_id {
        qb.push(" AND quadra_id::text = ").push_bind(quadra.clone());
    }
    if let Some(nome) = &filter.cliente_nome {
        qb.push(" AND representante_nome ILIKE ").push_bind(format!("%{nome}%"));
    }
    if !filter.representantes.is_empty() {
        qb.push(" AND representante_nome = ANY(")
            .push_bind(filter.representantes.clone())
            .push(")");
    }
}

// Datas vindas da LLM são texto livre: o Postgres faz a conversão (e o erro, se houver).
fn push_period_bound(qb: &mut QueryBuilder<'_, Postgres>, bound: &PeriodBound) {
    match bound {
        PeriodBound::Instant(instant) => {
            qb.push_bind(*instant);
        }
        PeriodBound::Text(raw) => {
            qb.push_bind(raw.clone()).push("::timestamptz");
        }
    }
}

fn push_customer_term(qb: &mut QueryBuilder<'_, Postgres>, term: &str) {
    let is_numeric = term.chars().all(|c| c.is_ascii_digit());
    let mut patterns = vec![term.to_string()];
    // "ithalo" x "italo": segunda passada sem a letra h
    let without_h: String = term.chars().filter(|c| !matches!(c, 'h' | 'H')).collect();
    if !is_numeric && !without_h.is_empty() && without_h != term {
        patterns.push(without_h);
    }

    qb.push(" AND (");
    if is_numeric {
        qb.push("codigo::text = ").push_bind(term.to_string()).push(" OR ");
    }
    let mut separated = qb.separated(" OR ");
    for pattern in patterns {
        let like = format!("%{pattern}%");
        separated.push("nome ILIKE ").push_bind_unseparated(like.clone());
        separated.push("email ILIKE ").push_bind_unseparated(like.clone());
        separated.push("telefone ILIKE ").push_bind_unseparated(like);
    }
    qb.push(")");
}

fn push_customer_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &TenantScope, search: &CustomerSearch) {
    qb.push(" WHERE status::text = 'active' AND flag_cliente = true AND codigo_empresa = ")
        .push_bind(scope.empresa.clone());
    if let Some(term) = &search.term {
        push_customer_term(qb, term);
    }
}

fn push_court_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &TenantScope, filter: &CourtFilter) {
    qb.push(" WHERE codigo_empresa = ").push_bind(scope.empresa.clone());
    if filter.active_only {
        qb.push(" AND status::text = ").push_bind(COURT_ACTIVE_STATUS);
    }
}

#[async_trait]
impl AgendaStore for AgendaRepository {
    // =========================================================================
    //  AGENDAMENTOS
    // =========================================================================

    async fn list_bookings(
        &self,
        scope: &TenantScope,
        filter: &BookingFilter,
    ) -> Result<BookingPage, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM v_agendamentos_isis");
        push_booking_filters(&mut count_qb, scope, filter);
        let total = count_qb.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {BOOKING_VIEW_COLUMNS} FROM v_agendamentos_isis"));
        push_booking_filters(&mut qb, scope, filter);
        qb.push(" ORDER BY inicio ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if filter.offset > 0 {
            qb.push(" OFFSET ").push_bind(filter.offset);
        }

        let rows = qb.build_query_as::<BookingView>().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(BookingPage { rows, total })
    }

    async fn cancel_bookings(&self, scope: &TenantScope, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let result = sqlx::query(
            r#"
            UPDATE agendamentos
            SET status = 'canceled'
            WHERE codigo_empresa = $1 AND id = ANY($2)
            "#,
        )
        .bind(&scope.empresa)
        .bind(ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn update_booking(
        &self,
        scope: &TenantScope,
        id: Uuid,
        changes: &BookingChanges,
    ) -> Result<Option<BookingSnapshot>, StoreError> {
        if changes.is_empty() {
            return Err(StoreError::InvalidValue("nenhum campo para atualizar".into()));
        }

        let mut tx = begin_scoped(&self.pool, scope).await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE agendamentos SET ");
        let mut separated = qb.separated(", ");
        for (field, value) in &changes.0 {
            separated.push(format!("{} = ", field.column()));
            separated.push_bind_unseparated(value.clone());
            if field.is_timestamp() {
                separated.push_unseparated("::timestamptz");
            }
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND codigo_empresa = ").push_bind(scope.empresa.clone());
        qb.push(format!(" RETURNING {SNAPSHOT_COLUMNS}"));

        let updated = qb.build_query_as::<BookingSnapshot>().fetch_optional(&mut *tx).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn insert_booking(
        &self,
        scope: &TenantScope,
        booking: &NewBooking,
    ) -> Result<BookingSnapshot, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let created = sqlx::query_as::<_, BookingSnapshot>(&format!(
            r#"
            INSERT INTO agendamentos (
                codigo_empresa, inicio, fim, status, modalidade, clientes, quadra_id, cliente_id, created_by_isis
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true)
            RETURNING {SNAPSHOT_COLUMNS}
            "#
        ))
        .bind(&scope.empresa)
        .bind(booking.inicio)
        .bind(booking.fim)
        .bind(&booking.status)
        .bind(&booking.modalidade)
        .bind(vec![booking.cliente_nome.clone()])
        .bind(booking.quadra_id)
        .bind(booking.cliente_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn insert_participant(
        &self,
        scope: &TenantScope,
        participant: &NewParticipant,
    ) -> Result<(), StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        sqlx::query(
            r#"
            INSERT INTO agendamento_participantes (
                codigo_empresa, agendamento_id, cliente_id, nome, valor_cota, status_pagamento, ordem
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&scope.empresa)
        .bind(participant.agendamento_id)
        .bind(participant.cliente_id)
        .bind(&participant.nome)
        .bind(participant.valor_cota)
        .bind(&participant.status_pagamento)
        .bind(participant.ordem)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn court_busy_intervals(
        &self,
        scope: &TenantScope,
        quadra_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let rows = sqlx::query_as::<_, BusyInterval>(
            r#"
            SELECT inicio, fim
            FROM agendamentos
            WHERE codigo_empresa = $1
              AND quadra_id = $2
              AND inicio >= $3 AND inicio < $4
              AND COALESCE(status::text, '') NOT IN ('canceled', 'cancelled')
            ORDER BY inicio ASC
            "#,
        )
        .bind(&scope.empresa)
        .bind(quadra_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows)
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    async fn find_customer(
        &self,
        scope: &TenantScope,
        key: &CustomerKey,
    ) -> Result<Option<Customer>, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM clientes WHERE codigo_empresa = "));
        qb.push_bind(scope.empresa.clone());
        match key {
            CustomerKey::Codigo(codigo) => qb.push(" AND codigo::text = ").push_bind(codigo.clone()),
            CustomerKey::Id(id) => qb.push(" AND id = ").push_bind(*id),
        };
        qb.push(" LIMIT 1");

        let customer = qb.build_query_as::<Customer>().fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(customer)
    }

    async fn search_customers(
        &self,
        scope: &TenantScope,
        search: &CustomerSearch,
    ) -> Result<CustomerPage, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clientes");
        push_customer_filters(&mut count_qb, scope, search);
        let total = count_qb.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM clientes"));
        push_customer_filters(&mut qb, scope, search);
        qb.push(" ORDER BY nome ASC LIMIT ").push_bind(search.limit);

        let rows = qb.build_query_as::<Customer>().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(CustomerPage { rows, total })
    }

    async fn customers_named(
        &self,
        scope: &TenantScope,
        name: &str,
        limit: i64,
    ) -> Result<Vec<Customer>, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let rows = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM clientes
            WHERE codigo_empresa = $1
              AND status::text = 'active'
              AND flag_cliente = true
              AND nome ILIKE $2
            ORDER BY nome ASC
            LIMIT $3
            "#
        ))
        .bind(&scope.empresa)
        .bind(format!("%{name}%"))
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows)
    }

    async fn walk_in_customer(&self, scope: &TenantScope) -> Result<Option<Uuid>, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM clientes WHERE codigo_empresa = $1 AND is_consumidor_final = true LIMIT 1",
        )
        .bind(&scope.empresa)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    // =========================================================================
    //  QUADRAS
    // =========================================================================

    async fn list_courts(
        &self,
        scope: &TenantScope,
        filter: &CourtFilter,
    ) -> Result<CourtPage, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quadras");
        push_court_filters(&mut count_qb, scope, filter);
        let total = count_qb.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COURT_COLUMNS} FROM quadras"));
        push_court_filters(&mut qb, scope, filter);
        qb.push(" ORDER BY nome ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb.build_query_as::<CourtRow>().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(CourtPage {
            rows: rows.into_iter().map(Court::from).collect(),
            total,
        })
    }

    async fn courts_matching(
        &self,
        scope: &TenantScope,
        reference: &str,
        limit: i64,
    ) -> Result<Vec<Court>, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let rows = sqlx::query_as::<_, CourtRow>(&format!(
            r#"
            SELECT {COURT_COLUMNS}
            FROM quadras
            WHERE codigo_empresa = $1
              AND (id::text = $2 OR nome ILIKE $3)
            ORDER BY nome ASC
            LIMIT $4
            "#
        ))
        .bind(&scope.empresa)
        .bind(reference)
        .bind(format!("%{reference}%"))
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows.into_iter().map(Court::from).collect())
    }

    async fn find_court(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Court>, StoreError> {
        let mut tx = begin_scoped(&self.pool, scope).await?;

        let row = sqlx::query_as::<_, CourtRow>(&format!(
            "SELECT {COURT_COLUMNS} FROM quadras WHERE codigo_empresa = $1 AND id = $2"
        ))
        .bind(&scope.empresa)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(Court::from))
    }
}
