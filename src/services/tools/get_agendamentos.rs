// src/services/tools/get_agendamentos.rs

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::error::StoreError;
use crate::common::lenient::{opt_i64, opt_string};
use crate::common::local_time::{local_day_range, local_today};
use crate::models::agenda::{BookingFilter, PeriodBound};
use crate::services::formatting::BookingItem;

use super::ToolContext;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct GetAgendamentosArgs {
    #[serde(default, deserialize_with = "opt_string")]
    pub data_inicio: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub data_fim: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub cliente_nome: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub quadra_id: Option<String>,
    #[serde(default, deserialize_with = "opt_i64")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "opt_i64")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingsResult {
    /// Argumentos originais + paginação/período efetivos.
    pub filters: Value,
    pub items: Vec<BookingItem>,
    pub rows_total: i64,
}

impl BookingsResult {
    pub fn to_json(&self) -> Value {
        json!({
            "ok": true,
            "policy": "read-only",
            "domain": "agenda",
            "filters": self.filters,
            "total": self.items.len(),
            "rows_total": self.rows_total,
            "items": self.items,
        })
    }
}

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn bound_text(bound: &PeriodBound) -> String {
    match bound {
        PeriodBound::Instant(instant) => iso(*instant),
        PeriodBound::Text(raw) => raw.clone(),
    }
}

/// Período efetivo: argumentos da LLM, depois o período do front, depois "hoje"
/// (este último só quando não há filtro por nome de cliente).
fn resolve_period(ctx: &ToolContext<'_>, args: &GetAgendamentosArgs) -> Option<(PeriodBound, PeriodBound)> {
    let mut from = args.data_inicio.clone();
    let mut to = args.data_fim.clone();

    if from.is_none() || to.is_none() {
        if let Some((default_from, default_to)) = ctx.default_period {
            from = Some(default_from.to_string());
            to = Some(default_to.to_string());
        }
    }

    match (from, to) {
        (Some(from), Some(to)) => Some((PeriodBound::Text(from), PeriodBound::Text(to))),
        _ if args.cliente_nome.is_none() => {
            let (start, end) = local_day_range(local_today(ctx.now));
            Some((PeriodBound::Instant(start), PeriodBound::Instant(end)))
        }
        _ => None,
    }
}

pub async fn execute(
    ctx: &ToolContext<'_>,
    args: GetAgendamentosArgs,
    raw_args: &Value,
) -> Result<BookingsResult, StoreError> {
    let page = args.page.unwrap_or(1).max(1);
    let page_size = args.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let period = resolve_period(ctx, &args);

    let filter = BookingFilter {
        period: period.clone(),
        status: args.status.clone(),
        quadra_id: args.quadra_id.clone(),
        cliente_nome: args.cliente_nome.clone(),
        representantes: Vec::new(),
        offset: page.saturating_sub(1).saturating_mul(page_size),
        limit: Some(page_size),
    };
    let result = ctx.store.list_bookings(ctx.scope, &filter).await?;

    let mut filters = match raw_args {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    filters.insert("page".into(), json!(page));
    filters.insert("page_size".into(), json!(page_size));
    let (from, to) = period
        .as_ref()
        .map(|(from, to)| (bound_text(from), bound_text(to)))
        .unwrap_or_default();
    filters.insert("data_inicio".into(), json!(from));
    filters.insert("data_fim".into(), json!(to));

    Ok(BookingsResult {
        filters: Value::Object(filters),
        items: result.rows.into_iter().map(BookingItem::from).collect(),
        rows_total: result.total,
    })
}
