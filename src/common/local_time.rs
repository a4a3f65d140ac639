// src/common/local_time.rs

//! Fuso da arena: UTC-3 fixo, sem horário de verão.
//!
//! Todo timestamp que cruza a fronteira banco (UTC) <-> usuário (hora local)
//! passa por `utc_to_local` / `local_to_utc`. Nenhum outro módulo faz conta
//! com o offset diretamente.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};

/// Offset da arena em relação ao UTC, em minutos (UTC-3).
pub const TENANT_UTC_OFFSET_MINUTES: i64 = -180;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

pub fn utc_to_local(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + TimeDelta::minutes(TENANT_UTC_OFFSET_MINUTES)
}

pub fn local_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    (local - TimeDelta::minutes(TENANT_UTC_OFFSET_MINUTES)).and_utc()
}

/// Dia corrente no calendário da arena.
pub fn local_today(now: DateTime<Utc>) -> NaiveDate {
    utc_to_local(now).date()
}

/// Janela [00:00 local, 00:00 local do dia seguinte), já convertida para UTC.
pub fn local_day_range(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(day.and_time(NaiveTime::MIN));
    (start, start + TimeDelta::days(1))
}

/// "dd/mm/yyyy"
pub fn date_label(day: NaiveDate) -> String {
    format!("{:02}/{:02}/{}", day.day(), day.month(), day.year())
}

/// "HHhMM" no horário local.
pub fn hour_label(instant: DateTime<Utc>) -> String {
    let local = utc_to_local(instant);
    clock_label(local.hour(), local.minute())
}

pub fn clock_label(hour: u32, minute: u32) -> String {
    format!("{hour:02}h{minute:02}")
}

/// "HHhMM às HHhMM"
pub fn time_range_label(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!("{} às {}", hour_label(start), hour_label(end))
}

/// Minuto do dia local de `instant`, medido a partir do início de `day`
/// e limitado a [0, 1440]. Um fim que cai no dia seguinte vira 1440.
pub fn minute_of_local_day(day: NaiveDate, instant: DateTime<Utc>) -> i64 {
    let local = utc_to_local(instant);
    let minutes = (local - day.and_time(NaiveTime::MIN)).num_minutes();
    minutes.clamp(0, MINUTES_PER_DAY)
}

/// "HH:MM" a partir de minutos do dia (1440 vira "24:00").
pub fn minutes_to_hhmm(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
