//! General cycle lifecycle: creation with pre-provisioned days, listing,
//! detail, and completion.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::error::LedgerError;
use crate::models::{
    decimal_to_db, opt_decimal_to_db, CreatedCycle, CycleDetail, CycleOverview, CycleStatus,
    DailyCycle, DailyCycleRow, DayStatus, GeneralCycle, GeneralCycleRow, NewGeneralCycle,
};
use crate::observability::metrics;
use crate::Ledger;

#[derive(FromRow)]
struct CycleOverviewRow {
    #[sqlx(flatten)]
    cycle: GeneralCycleRow,
    total_days: i64,
    completed_days: i64,
}

impl Ledger {
    /// Create a cycle and provision all of its daily cycles up front. Day 1
    /// starts active and funded with the full initial capital; later days are
    /// pending with zero balances until the close cascade reaches them.
    pub async fn create_general_cycle(
        &self,
        user_id: Uuid,
        input: NewGeneralCycle,
    ) -> Result<CreatedCycle, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let created = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.create_general_cycle_in_tx(user_id, &input)
        })
        .await?;
        self.metrics.increment(metrics::CYCLE_CREATED_TOTAL).await;
        info!(%user_id, cycle_id = %created.cycle.id, days = created.days.len(),
            "general cycle created");
        Ok(created)
    }

    async fn create_general_cycle_in_tx(
        &self,
        user_id: Uuid,
        input: &NewGeneralCycle,
    ) -> Result<CreatedCycle, LedgerError> {
        let mut tx = self.db.begin().await?;
        let now = Utc::now();
        let start_date = now.date_naive();
        let end_date = start_date + Duration::days(input.duration_days);

        let cycle: GeneralCycle = sqlx::query_as::<_, GeneralCycleRow>(
            "INSERT INTO general_cycles \
             (id, user_id, name, initial_capital, duration_days, target_profit_rate, \
              commission_rate, platform, currency, start_date, end_date, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING *",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(&input.name)
        .bind(decimal_to_db(input.initial_capital))
        .bind(input.duration_days)
        .bind(decimal_to_db(input.target_profit_rate))
        .bind(decimal_to_db(input.commission_rate))
        .bind(&input.platform)
        .bind(&input.currency)
        .bind(start_date)
        .bind(end_date)
        .bind(CycleStatus::Active)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?
        .into();

        let mut days = Vec::with_capacity(input.duration_days as usize);
        for day_number in 1..=input.duration_days {
            let first = day_number == 1;
            let opening = if first {
                input.initial_capital
            } else {
                Decimal::ZERO
            };
            let status = if first {
                DayStatus::Active
            } else {
                DayStatus::Pending
            };
            let day: DailyCycle = sqlx::query_as::<_, DailyCycleRow>(
                "INSERT INTO daily_cycles \
                 (id, general_cycle_id, day_number, date, opening_capital, fiat_balance, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(cycle.id.to_string())
            .bind(day_number)
            .bind(start_date + Duration::days(day_number - 1))
            .bind(decimal_to_db(opening))
            .bind(decimal_to_db(opening))
            .bind(status)
            .fetch_one(&mut *tx)
            .await?
            .into();
            days.push(day);
        }

        tx.commit().await?;
        Ok(CreatedCycle { cycle, days })
    }

    /// Cycles newest-first, optionally filtered by status, with day progress.
    pub async fn list_general_cycles(
        &self,
        user_id: Uuid,
        status: Option<CycleStatus>,
    ) -> Result<Vec<CycleOverview>, LedgerError> {
        let rows = sqlx::query_as::<_, CycleOverviewRow>(
            "SELECT gc.*, \
                    COUNT(dc.id) AS total_days, \
                    COALESCE(SUM(CASE WHEN dc.status = 'completed' THEN 1 ELSE 0 END), 0) \
                        AS completed_days \
             FROM general_cycles gc \
             LEFT JOIN daily_cycles dc ON dc.general_cycle_id = gc.id \
             WHERE gc.user_id = $1 AND ($2 IS NULL OR gc.status = $2) \
             GROUP BY gc.id \
             ORDER BY gc.created_at DESC",
        )
        .bind(user_id.to_string())
        .bind(status)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CycleOverview {
                cycle: row.cycle.into(),
                total_days: row.total_days,
                completed_days: row.completed_days,
            })
            .collect())
    }

    /// One cycle with all of its days in order.
    pub async fn get_general_cycle(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<CycleDetail, LedgerError> {
        let mut conn = self.db.acquire().await?;
        let cycle = super::general_cycle_scoped(&mut conn, cycle_id, user_id).await?;
        let days = sqlx::query_as::<_, DailyCycleRow>(
            "SELECT * FROM daily_cycles WHERE general_cycle_id = $1 ORDER BY day_number",
        )
        .bind(cycle.id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        Ok(CycleDetail {
            cycle,
            days: days.into_iter().map(DailyCycle::from).collect(),
        })
    }

    /// Close out a cycle. The final capital is the last closed day's closing
    /// capital; total profit sums the closed days. Realized profit (or loss)
    /// is accrued on the vault. Completing an already-completed cycle is a
    /// no-op returning the stored figures.
    pub async fn complete_general_cycle(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<GeneralCycle, LedgerError> {
        let cycle = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.complete_general_cycle_in_tx(user_id, cycle_id)
        })
        .await?;
        self.metrics.increment(metrics::CYCLE_COMPLETED_TOTAL).await;
        info!(%user_id, %cycle_id, total_profit = ?cycle.total_profit, "general cycle completed");
        Ok(cycle)
    }

    async fn complete_general_cycle_in_tx(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<GeneralCycle, LedgerError> {
        let mut tx = self.db.begin().await?;
        let cycle = super::general_cycle_scoped(&mut tx, cycle_id, user_id).await?;
        if cycle.status == CycleStatus::Completed {
            tx.rollback().await?;
            return Ok(cycle);
        }

        let days: Vec<DailyCycle> = sqlx::query_as::<_, DailyCycleRow>(
            "SELECT * FROM daily_cycles WHERE general_cycle_id = $1 ORDER BY day_number",
        )
        .bind(cycle.id.to_string())
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(DailyCycle::from)
        .collect();

        let final_capital = days
            .iter()
            .rev()
            .find_map(|d| d.closing_capital)
            .unwrap_or(cycle.initial_capital);
        let total_profit: Decimal = days.iter().filter_map(|d| d.net_profit).sum();

        let updated: GeneralCycle = sqlx::query_as::<_, GeneralCycleRow>(
            "UPDATE general_cycles \
             SET status = $1, final_capital = $2, total_profit = $3, completed_at = $4 \
             WHERE id = $5 RETURNING *",
        )
        .bind(CycleStatus::Completed)
        .bind(opt_decimal_to_db(Some(final_capital)))
        .bind(opt_decimal_to_db(Some(total_profit)))
        .bind(Utc::now())
        .bind(cycle.id.to_string())
        .fetch_one(&mut *tx)
        .await?
        .into();

        let vault = super::get_or_create_vault(&mut tx, user_id).await?;
        sqlx::query(
            "UPDATE vaults SET realized_profit_accrued = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(decimal_to_db(vault.realized_profit_accrued + total_profit))
        .bind(Utc::now())
        .bind(vault.id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}
