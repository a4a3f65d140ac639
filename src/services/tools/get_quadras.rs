// src/services/tools/get_quadras.rs

use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::error::StoreError;
use crate::common::lenient::{opt_bool, opt_i64};
use crate::models::agenda::{Court, CourtFilter};

use super::ToolContext;

#[derive(Debug, Default, Deserialize)]
pub struct GetQuadrasArgs {
    #[serde(default, deserialize_with = "opt_bool")]
    pub apenas_ativas: Option<bool>,
    #[serde(default, deserialize_with = "opt_i64")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourtsResult {
    pub active_only: bool,
    pub limit: i64,
    pub items: Vec<Court>,
    pub rows_total: i64,
}

impl CourtsResult {
    pub fn to_json(&self) -> Value {
        json!({
            "ok": true,
            "policy": "read-only",
            "domain": "quadras",
            "filters": { "apenas_ativas": self.active_only, "limit": self.limit },
            "total": self.items.len(),
            "rows_total": self.rows_total,
            "items": self.items,
        })
    }
}

pub async fn execute(ctx: &ToolContext<'_>, args: GetQuadrasArgs) -> Result<CourtsResult, StoreError> {
    let filter = CourtFilter {
        active_only: args.apenas_ativas.unwrap_or(false),
        limit: Some(args.limit.unwrap_or(20).clamp(1, 50)),
    };
    let page = ctx.store.list_courts(ctx.scope, &filter).await?;

    Ok(CourtsResult {
        active_only: filter.active_only,
        limit: filter.limit.unwrap_or(20),
        items: page.rows,
        rows_total: page.total,
    })
}
