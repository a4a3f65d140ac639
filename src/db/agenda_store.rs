// src/db/agenda_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::StoreError,
    models::agenda::{
        BookingChanges, BookingFilter, BookingPage, BookingSnapshot, BusyInterval, Court,
        CourtFilter, CourtPage, Customer, CustomerKey, CustomerPage, CustomerSearch, NewBooking,
        NewParticipant, TenantScope,
    },
};

/// Tudo que a orquestração precisa do banco da arena. Toda operação recebe o
/// escopo do tenant; nenhuma implementação pode devolver linhas de outro tenant.
#[async_trait]
pub trait AgendaStore: Send + Sync {
    // --- Agendamentos ---

    /// Consulta a view `v_agendamentos_isis`, ordenada por `inicio`.
    async fn list_bookings(
        &self,
        scope: &TenantScope,
        filter: &BookingFilter,
    ) -> Result<BookingPage, StoreError>;

    /// Marca os agendamentos como `canceled`. Devolve quantos foram alterados.
    async fn cancel_bookings(&self, scope: &TenantScope, ids: &[Uuid]) -> Result<u64, StoreError>;

    /// `Ok(None)` quando nenhum agendamento do tenant tem esse id.
    async fn update_booking(
        &self,
        scope: &TenantScope,
        id: Uuid,
        changes: &BookingChanges,
    ) -> Result<Option<BookingSnapshot>, StoreError>;

    async fn insert_booking(
        &self,
        scope: &TenantScope,
        booking: &NewBooking,
    ) -> Result<BookingSnapshot, StoreError>;

    async fn insert_participant(
        &self,
        scope: &TenantScope,
        participant: &NewParticipant,
    ) -> Result<(), StoreError>;

    /// Intervalos de agendamentos não cancelados da quadra com `inicio` em [from, to).
    async fn court_busy_intervals(
        &self,
        scope: &TenantScope,
        quadra_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, StoreError>;

    // --- Clientes ---

    async fn find_customer(
        &self,
        scope: &TenantScope,
        key: &CustomerKey,
    ) -> Result<Option<Customer>, StoreError>;

    /// Busca da tool `get_clientes` (apenas ativos com flag de cliente).
    async fn search_customers(
        &self,
        scope: &TenantScope,
        search: &CustomerSearch,
    ) -> Result<CustomerPage, StoreError>;

    /// Ativos com flag de cliente cujo nome contém `name` (ILIKE).
    async fn customers_named(
        &self,
        scope: &TenantScope,
        name: &str,
        limit: i64,
    ) -> Result<Vec<Customer>, StoreError>;

    /// Id do cliente "consumidor final" do tenant, se existir.
    async fn walk_in_customer(&self, scope: &TenantScope) -> Result<Option<Uuid>, StoreError>;

    // --- Quadras ---

    /// Quadras ordenadas por nome.
    async fn list_courts(
        &self,
        scope: &TenantScope,
        filter: &CourtFilter,
    ) -> Result<CourtPage, StoreError>;

    /// Quadras cujo id (texto) é igual à referência ou cujo nome a contém.
    async fn courts_matching(
        &self,
        scope: &TenantScope,
        reference: &str,
        limit: i64,
    ) -> Result<Vec<Court>, StoreError>;

    async fn find_court(&self, scope: &TenantScope, id: Uuid) -> Result<Option<Court>, StoreError>;
}
