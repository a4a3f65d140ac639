use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::StoreError;
use crate::models::agenda::TenantScope;

// ---
// Helper de contexto: a "chave" do chamador para o banco
// ---
/// Abre uma transação curta e define o tenant e o Authorization do chamador
/// como configurações locais (valem só dentro da transação).
pub(crate) async fn begin_scoped(
    pool: &PgPool,
    scope: &TenantScope,
) -> Result<Transaction<'static, Postgres>, StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT set_config('app.codigo_empresa', $1, true)")
        .bind(&scope.empresa)
        .execute(&mut *tx)
        .await?;

    sqlx::query("SELECT set_config('app.authorization', $1, true)")
        .bind(scope.authorization.as_deref().unwrap_or(""))
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
