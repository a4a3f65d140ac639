pub mod agenda;
pub mod chat;
