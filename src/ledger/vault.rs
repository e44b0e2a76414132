//! Vault operations: deposits, cycle transfers, movement history.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::error::LedgerError;
use crate::models::{
    decimal_to_db, CycleTransfer, DayStatus, DepositOutcome, MovementKind, TransferOutcome, Vault,
    VaultDeposit, VaultMovement, VaultMovementRow,
};
use crate::observability::metrics;
use crate::Ledger;

const MAX_MOVEMENT_PAGE: i64 = 500;

impl Ledger {
    /// Current vault balances, creating the vault on first access.
    pub async fn vault_status(&self, user_id: Uuid) -> Result<Vault, LedgerError> {
        let mut tx = self.db.begin().await?;
        let vault = super::get_or_create_vault(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(vault)
    }

    /// Add external capital to the vault's available balance.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        input: VaultDeposit,
    ) -> Result<DepositOutcome, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let outcome = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.deposit_in_tx(user_id, &input)
        })
        .await?;
        self.metrics.increment(metrics::VAULT_DEPOSIT_TOTAL).await;
        info!(%user_id, amount = %outcome.amount, "vault deposit recorded");
        Ok(outcome)
    }

    async fn deposit_in_tx(
        &self,
        user_id: Uuid,
        input: &VaultDeposit,
    ) -> Result<DepositOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;
        let vault = super::get_or_create_vault(&mut tx, user_id).await?;
        let transfer = vault.apply_deposit(input.amount);
        let now = Utc::now();

        sqlx::query(
            "UPDATE vaults SET balance_available = $1, total_deposits = $2, updated_at = $3 \
             WHERE id = $4",
        )
        .bind(decimal_to_db(transfer.available_after))
        .bind(decimal_to_db(vault.total_deposits + input.amount))
        .bind(now)
        .bind(vault.id.to_string())
        .execute(&mut *tx)
        .await?;

        record_movement(
            &mut tx,
            &vault,
            MovementKind::Deposit,
            input.amount,
            transfer.available_before,
            transfer.available_after,
            None,
            input.description.as_deref().unwrap_or("deposit"),
        )
        .await?;

        tx.commit().await?;
        Ok(DepositOutcome {
            balance_before: transfer.available_before,
            balance_after: transfer.available_after,
            amount: input.amount,
        })
    }

    /// Commit available vault capital to a cycle (available -> invested).
    /// The cycle's daily balances are funded at creation; this records the
    /// allocation on the vault side.
    pub async fn transfer_to_cycle(
        &self,
        user_id: Uuid,
        input: CycleTransfer,
    ) -> Result<TransferOutcome, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let outcome = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.transfer_to_cycle_in_tx(user_id, &input)
        })
        .await?;
        self.metrics.increment(metrics::VAULT_TRANSFER_TOTAL).await;
        info!(%user_id, cycle_id = %input.general_cycle_id, amount = %input.amount,
            "capital committed to cycle");
        Ok(outcome)
    }

    async fn transfer_to_cycle_in_tx(
        &self,
        user_id: Uuid,
        input: &CycleTransfer,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;
        let cycle = super::general_cycle_scoped(&mut tx, input.general_cycle_id, user_id).await?;
        let vault = super::get_or_create_vault(&mut tx, user_id).await?;
        let transfer = vault.apply_transfer_out(input.amount)?;

        update_vault_balances(&mut tx, vault.id, transfer.available_after, transfer.invested_after)
            .await?;
        record_movement(
            &mut tx,
            &vault,
            MovementKind::TransferToCycle,
            input.amount,
            transfer.available_before,
            transfer.available_after,
            Some(cycle.id),
            input
                .description
                .as_deref()
                .unwrap_or("transfer to cycle"),
        )
        .await?;

        tx.commit().await?;
        Ok(TransferOutcome {
            balance_available: transfer.available_after,
            balance_invested: transfer.invested_after,
            amount: input.amount,
            day_fiat_balance: None,
        })
    }

    /// Repatriate fiat from a cycle's active day back to the vault.
    pub async fn transfer_from_cycle(
        &self,
        user_id: Uuid,
        input: CycleTransfer,
    ) -> Result<TransferOutcome, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let outcome = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.transfer_from_cycle_in_tx(user_id, &input)
        })
        .await?;
        self.metrics.increment(metrics::VAULT_TRANSFER_TOTAL).await;
        info!(%user_id, cycle_id = %input.general_cycle_id, amount = %input.amount,
            "capital repatriated from cycle");
        Ok(outcome)
    }

    async fn transfer_from_cycle_in_tx(
        &self,
        user_id: Uuid,
        input: &CycleTransfer,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;
        let cycle = super::general_cycle_scoped(&mut tx, input.general_cycle_id, user_id).await?;

        let day = sqlx::query_as::<_, crate::models::DailyCycleRow>(
            "SELECT * FROM daily_cycles \
             WHERE general_cycle_id = $1 AND status = $2 \
             ORDER BY day_number LIMIT 1",
        )
        .bind(cycle.id.to_string())
        .bind(DayStatus::Active)
        .fetch_optional(&mut *tx)
        .await?
        .map(crate::models::DailyCycle::from)
        .ok_or(LedgerError::NoActiveDay)?;

        if day.fiat_balance < input.amount {
            return Err(LedgerError::InsufficientCycleFunds {
                available: day.fiat_balance,
                requested: input.amount,
            });
        }

        let vault = super::get_or_create_vault(&mut tx, user_id).await?;
        let transfer = vault.apply_transfer_in(input.amount);
        let day_fiat_after = day.fiat_balance - input.amount;

        sqlx::query("UPDATE daily_cycles SET fiat_balance = $1 WHERE id = $2")
            .bind(decimal_to_db(day_fiat_after))
            .bind(day.id.to_string())
            .execute(&mut *tx)
            .await?;
        update_vault_balances(&mut tx, vault.id, transfer.available_after, transfer.invested_after)
            .await?;
        record_movement(
            &mut tx,
            &vault,
            MovementKind::TransferFromCycle,
            input.amount,
            transfer.available_before,
            transfer.available_after,
            Some(cycle.id),
            input
                .description
                .as_deref()
                .unwrap_or("transfer from cycle"),
        )
        .await?;

        tx.commit().await?;
        Ok(TransferOutcome {
            balance_available: transfer.available_after,
            balance_invested: transfer.invested_after,
            amount: input.amount,
            day_fiat_balance: Some(day_fiat_after),
        })
    }

    /// Movement history, newest first. The limit is clamped to
    /// `1..=MAX_MOVEMENT_PAGE`; SQLite treats a negative LIMIT as unbounded.
    pub async fn vault_movements(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<VaultMovement>, LedgerError> {
        let limit = limit.clamp(1, MAX_MOVEMENT_PAGE);
        let rows = sqlx::query_as::<_, VaultMovementRow>(
            "SELECT vm.* FROM vault_movements vm \
             JOIN vaults v ON v.id = vm.vault_id \
             WHERE v.user_id = $1 \
             ORDER BY vm.created_at DESC LIMIT $2",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(VaultMovement::from).collect())
    }
}

async fn update_vault_balances(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    vault_id: Uuid,
    available: rust_decimal::Decimal,
    invested: rust_decimal::Decimal,
) -> Result<(), LedgerError> {
    sqlx::query(
        "UPDATE vaults SET balance_available = $1, balance_invested = $2, updated_at = $3 \
         WHERE id = $4",
    )
    .bind(decimal_to_db(available))
    .bind(decimal_to_db(invested))
    .bind(Utc::now())
    .bind(vault_id.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn record_movement(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    vault: &Vault,
    kind: MovementKind,
    amount: rust_decimal::Decimal,
    balance_before: rust_decimal::Decimal,
    balance_after: rust_decimal::Decimal,
    general_cycle_id: Option<Uuid>,
    description: &str,
) -> Result<(), LedgerError> {
    sqlx::query(
        "INSERT INTO vault_movements \
         (id, vault_id, kind, amount, balance_before, balance_after, general_cycle_id, \
          description, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(vault.id.to_string())
    .bind(kind)
    .bind(decimal_to_db(amount))
    .bind(decimal_to_db(balance_before))
    .bind(decimal_to_db(balance_after))
    .bind(general_cycle_id.map(|id| id.to_string()))
    .bind(description)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
