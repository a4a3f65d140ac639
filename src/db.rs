pub mod agenda_store;
pub use agenda_store::AgendaStore;
pub mod agenda_repo;
pub use agenda_repo::AgendaRepository;
