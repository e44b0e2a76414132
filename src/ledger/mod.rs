//! Ledger operations, one module per component.
//!
//! Every entity fetch is scoped to the owning user through a join on
//! `general_cycles.user_id`; a row that exists but belongs to someone else is
//! reported as not found.

mod daily_cycles;
mod general_cycles;
mod orders;
mod transactions;
mod vault;

use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{
    DailyCycle, DailyCycleRow, GeneralCycle, GeneralCycleRow, Order, OrderRow, OrderSide, Vault,
    VaultRow,
};

pub(crate) async fn general_cycle_scoped(
    conn: &mut SqliteConnection,
    cycle_id: Uuid,
    user_id: Uuid,
) -> Result<GeneralCycle, LedgerError> {
    let row = sqlx::query_as::<_, GeneralCycleRow>(
        "SELECT * FROM general_cycles WHERE id = $1 AND user_id = $2",
    )
    .bind(cycle_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(conn)
    .await?;

    row.map(GeneralCycle::from).ok_or(LedgerError::CycleNotFound)
}

pub(crate) async fn daily_cycle_scoped(
    conn: &mut SqliteConnection,
    daily_cycle_id: Uuid,
    user_id: Uuid,
) -> Result<DailyCycle, LedgerError> {
    let row = sqlx::query_as::<_, DailyCycleRow>(
        "SELECT dc.* FROM daily_cycles dc \
         JOIN general_cycles gc ON gc.id = dc.general_cycle_id \
         WHERE dc.id = $1 AND gc.user_id = $2",
    )
    .bind(daily_cycle_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(conn)
    .await?;

    row.map(DailyCycle::from).ok_or(LedgerError::CycleNotFound)
}

pub(crate) async fn order_scoped(
    conn: &mut SqliteConnection,
    order_id: Uuid,
    user_id: Uuid,
    side: Option<OrderSide>,
) -> Result<Order, LedgerError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT o.* FROM orders o \
         JOIN daily_cycles dc ON dc.id = o.daily_cycle_id \
         JOIN general_cycles gc ON gc.id = dc.general_cycle_id \
         WHERE o.id = $1 AND gc.user_id = $2 AND ($3 IS NULL OR o.side = $3)",
    )
    .bind(order_id.to_string())
    .bind(user_id.to_string())
    .bind(side)
    .fetch_optional(conn)
    .await?;

    row.map(Order::from).ok_or(LedgerError::OrderNotFound)
}

/// Fetch the user's vault, creating an empty one on first access.
pub(crate) async fn get_or_create_vault(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<Vault, LedgerError> {
    let existing = sqlx::query_as::<_, VaultRow>("SELECT * FROM vaults WHERE user_id = $1")
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok(row.into());
    }

    let now = chrono::Utc::now();
    let row = sqlx::query_as::<_, VaultRow>(
        "INSERT INTO vaults (id, user_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $3) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id.to_string())
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}
