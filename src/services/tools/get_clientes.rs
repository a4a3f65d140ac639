// src/services/tools/get_clientes.rs

use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::error::StoreError;
use crate::common::lenient::{opt_i64, opt_string};
use crate::models::agenda::{Customer, CustomerSearch};

use super::ToolContext;

#[derive(Debug, Default, Deserialize)]
pub struct GetClientesArgs {
    #[serde(default, deserialize_with = "opt_string")]
    pub search_term: Option<String>,
    #[serde(default, deserialize_with = "opt_i64")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomersResult {
    pub search_term: Option<String>,
    pub limit: i64,
    pub items: Vec<Customer>,
    pub rows_total: i64,
}

impl CustomersResult {
    pub fn to_json(&self) -> Value {
        json!({
            "ok": true,
            "policy": "read-only",
            "domain": "clientes",
            "filters": { "search_term": self.search_term, "limit": self.limit },
            "total": self.items.len(),
            "rows_total": self.rows_total,
            "items": self.items,
        })
    }
}

pub async fn execute(ctx: &ToolContext<'_>, args: GetClientesArgs) -> Result<CustomersResult, StoreError> {
    let search = CustomerSearch {
        term: args.search_term,
        limit: args.limit.unwrap_or(20).clamp(1, 50),
    };
    let page = ctx.store.search_customers(ctx.scope, &search).await?;

    Ok(CustomersResult {
        search_term: search.term,
        limit: search.limit,
        items: page.rows,
        rows_total: page.total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agenda::TenantScope;
    use crate::test_support::{customer, MemoryStore};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn searches_active_customers_of_tenant() {
        let store = MemoryStore::default()
            .with_customer("1001", customer("12", "Italo Santos"))
            .with_customer("1001", customer("13", "Maria Souza"))
            .with_customer("2002", customer("14", "Italo de outro tenant"));
        let scope = TenantScope::new("1001", None);
        let ctx = ToolContext {
            store: &store,
            scope: &scope,
            now: Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(),
            message: "",
            history: &[],
            default_period: None,
        };

        // segunda passada sem "h": "Ithalo" também acha "Italo"
        let args: GetClientesArgs = serde_json::from_value(json!({"search_term": "Ithalo", "limit": 500})).unwrap();
        let result = execute(&ctx, args).await.unwrap();
        assert_eq!(result.limit, 50);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].nome.as_deref(), Some("Italo Santos"));

        let args: GetClientesArgs = serde_json::from_value(json!({"search_term": 13})).unwrap();
        let result = execute(&ctx, args).await.unwrap();
        assert_eq!(result.to_json()["items"][0]["nome"], "Maria Souza");
        assert_eq!(result.to_json()["filters"]["limit"], 20);
    }
}
