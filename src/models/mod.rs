//! Ledger entities, status enums, operation inputs, and the pure state
//! transitions that every mutation is built from.
//!
//! Each entity comes in two shapes: a `*Row` struct matching the SQLite schema
//! (decimals stored as TEXT) and the domain struct used by the operation layer
//! and exposed to callers. Conversion is infallible; a corrupt decimal column
//! decodes as zero rather than poisoning reads.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::fmt::Hyphenated;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::LedgerError;

/// An order counts as fully executed once this percentage is reached.
pub const COMPLETION_THRESHOLD_PERCENT: Decimal = dec!(99.9);

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Published,
    Partial,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Deposit,
    TransferToCycle,
    TransferFromCycle,
}

// ---------------------------------------------------------------------------
// TEXT <-> Decimal helpers
// ---------------------------------------------------------------------------

pub fn decimal_from_db(s: &str) -> Decimal {
    s.parse().unwrap_or_default()
}

pub fn decimal_to_db(d: Decimal) -> String {
    d.to_string()
}

pub fn opt_decimal_from_db(s: &Option<String>) -> Option<Decimal> {
    s.as_deref().map(decimal_from_db)
}

pub fn opt_decimal_to_db(d: Option<Decimal>) -> Option<String> {
    d.map(decimal_to_db)
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A user's root capital pool. Created lazily on first access.
#[derive(Debug, Clone, Serialize)]
pub struct Vault {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance_available: Decimal,
    pub balance_invested: Decimal,
    pub total_deposits: Decimal,
    pub realized_profit_accrued: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VaultRow {
    pub id: Hyphenated,
    pub user_id: Hyphenated,
    pub balance_available: String,
    pub balance_invested: String,
    pub total_deposits: String,
    pub realized_profit_accrued: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VaultRow> for Vault {
    fn from(row: VaultRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            user_id: row.user_id.into_uuid(),
            balance_available: decimal_from_db(&row.balance_available),
            balance_invested: decimal_from_db(&row.balance_invested),
            total_deposits: decimal_from_db(&row.total_deposits),
            realized_profit_accrued: decimal_from_db(&row.realized_profit_accrued),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Balance pair produced by a vault transition.
#[derive(Debug, Clone)]
pub struct VaultTransfer {
    pub available_before: Decimal,
    pub available_after: Decimal,
    pub invested_after: Decimal,
}

impl Vault {
    /// Deposit: available grows, invested untouched.
    pub fn apply_deposit(&self, amount: Decimal) -> VaultTransfer {
        VaultTransfer {
            available_before: self.balance_available,
            available_after: self.balance_available + amount,
            invested_after: self.balance_invested,
        }
    }

    /// Move available capital into a cycle (available -> invested).
    pub fn apply_transfer_out(&self, amount: Decimal) -> Result<VaultTransfer, LedgerError> {
        if self.balance_available < amount {
            return Err(LedgerError::InsufficientVaultFunds {
                available: self.balance_available,
                requested: amount,
            });
        }
        Ok(VaultTransfer {
            available_before: self.balance_available,
            available_after: self.balance_available - amount,
            invested_after: self.balance_invested + amount,
        })
    }

    /// Repatriate capital from a cycle. Invested is floored at zero: profit
    /// withdrawn can exceed what was originally transferred in.
    pub fn apply_transfer_in(&self, amount: Decimal) -> VaultTransfer {
        VaultTransfer {
            available_before: self.balance_available,
            available_after: self.balance_available + amount,
            invested_after: (self.balance_invested - amount).max(Decimal::ZERO),
        }
    }
}

// ---------------------------------------------------------------------------
// General cycle
// ---------------------------------------------------------------------------

/// A fixed-duration capital allocation composed of sequential daily cycles.
#[derive(Debug, Clone, Serialize)]
pub struct GeneralCycle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub initial_capital: Decimal,
    pub duration_days: i64,
    pub target_profit_rate: Decimal,
    pub commission_rate: Decimal,
    pub platform: String,
    pub currency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CycleStatus,
    pub final_capital: Option<Decimal>,
    pub total_profit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GeneralCycleRow {
    pub id: Hyphenated,
    pub user_id: Hyphenated,
    pub name: String,
    pub initial_capital: String,
    pub duration_days: i64,
    pub target_profit_rate: String,
    pub commission_rate: String,
    pub platform: String,
    pub currency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CycleStatus,
    pub final_capital: Option<String>,
    pub total_profit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<GeneralCycleRow> for GeneralCycle {
    fn from(row: GeneralCycleRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            user_id: row.user_id.into_uuid(),
            name: row.name,
            initial_capital: decimal_from_db(&row.initial_capital),
            duration_days: row.duration_days,
            target_profit_rate: decimal_from_db(&row.target_profit_rate),
            commission_rate: decimal_from_db(&row.commission_rate),
            platform: row.platform,
            currency: row.currency,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status,
            final_capital: opt_decimal_from_db(&row.final_capital),
            total_profit: opt_decimal_from_db(&row.total_profit),
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Daily cycle
// ---------------------------------------------------------------------------

/// One trading day's balances, counters, and close-out figures.
#[derive(Debug, Clone, Serialize)]
pub struct DailyCycle {
    pub id: Uuid,
    pub general_cycle_id: Uuid,
    pub day_number: i64,
    pub date: NaiveDate,
    pub opening_capital: Decimal,
    pub asset_balance: Decimal,
    pub fiat_balance: Decimal,
    pub status: DayStatus,
    pub buys_count: i64,
    pub sells_count: i64,
    pub total_bought: Decimal,
    pub total_spent: Decimal,
    pub total_sold: Decimal,
    pub total_received: Decimal,
    pub commissions_paid: Decimal,
    pub has_active_orders: bool,
    pub closing_asset_price: Option<Decimal>,
    pub closing_asset_balance: Option<Decimal>,
    pub closing_fiat_balance: Option<Decimal>,
    pub closing_capital: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub profit_rate: Option<Decimal>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyCycleRow {
    pub id: Hyphenated,
    pub general_cycle_id: Hyphenated,
    pub day_number: i64,
    pub date: NaiveDate,
    pub opening_capital: String,
    pub asset_balance: String,
    pub fiat_balance: String,
    pub status: DayStatus,
    pub buys_count: i64,
    pub sells_count: i64,
    pub total_bought: String,
    pub total_spent: String,
    pub total_sold: String,
    pub total_received: String,
    pub commissions_paid: String,
    pub has_active_orders: bool,
    pub closing_asset_price: Option<String>,
    pub closing_asset_balance: Option<String>,
    pub closing_fiat_balance: Option<String>,
    pub closing_capital: Option<String>,
    pub net_profit: Option<String>,
    pub profit_rate: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<DailyCycleRow> for DailyCycle {
    fn from(row: DailyCycleRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            general_cycle_id: row.general_cycle_id.into_uuid(),
            day_number: row.day_number,
            date: row.date,
            opening_capital: decimal_from_db(&row.opening_capital),
            asset_balance: decimal_from_db(&row.asset_balance),
            fiat_balance: decimal_from_db(&row.fiat_balance),
            status: row.status,
            buys_count: row.buys_count,
            sells_count: row.sells_count,
            total_bought: decimal_from_db(&row.total_bought),
            total_spent: decimal_from_db(&row.total_spent),
            total_sold: decimal_from_db(&row.total_sold),
            total_received: decimal_from_db(&row.total_received),
            commissions_paid: decimal_from_db(&row.commissions_paid),
            has_active_orders: row.has_active_orders,
            closing_asset_price: opt_decimal_from_db(&row.closing_asset_price),
            closing_asset_balance: opt_decimal_from_db(&row.closing_asset_balance),
            closing_fiat_balance: opt_decimal_from_db(&row.closing_fiat_balance),
            closing_capital: opt_decimal_from_db(&row.closing_capital),
            net_profit: opt_decimal_from_db(&row.net_profit),
            profit_rate: opt_decimal_from_db(&row.profit_rate),
            closed_at: row.closed_at,
        }
    }
}

/// Balance deltas and audit snapshots produced by applying one execution to a
/// daily cycle. The transaction record is written verbatim from these fields.
#[derive(Debug, Clone)]
pub struct TradeApplication {
    pub asset_before: Decimal,
    pub asset_after: Decimal,
    pub fiat_before: Decimal,
    pub fiat_after: Decimal,
    /// Gross fiat value of the execution (quantity * price).
    pub gross_fiat: Decimal,
    /// Commission withheld; sells only.
    pub commission: Option<Decimal>,
    /// Fiat recorded on the transaction: spent for buys, net received for sells.
    pub fiat_amount: Decimal,
}

/// Close-out figures for a day.
#[derive(Debug, Clone)]
pub struct DayClose {
    pub closing_asset_balance: Decimal,
    pub closing_fiat_balance: Decimal,
    pub closing_capital: Decimal,
    pub net_profit: Decimal,
    /// Percent, e.g. -5 for a 5% loss. Zero when the day opened with no capital.
    pub profit_rate: Decimal,
}

impl DailyCycle {
    /// Capital valued with the asset at 1.0, the intraday convention.
    pub fn current_capital(&self) -> Decimal {
        self.asset_balance + self.fiat_balance
    }

    /// Apply a buy execution: fiat out, asset in.
    pub fn apply_buy(&self, quantity: Decimal, price: Decimal) -> Result<TradeApplication, LedgerError> {
        let fiat_spent = quantity * price;
        if self.fiat_balance < fiat_spent {
            return Err(LedgerError::InsufficientFiat {
                available: self.fiat_balance,
                requested: fiat_spent,
            });
        }
        Ok(TradeApplication {
            asset_before: self.asset_balance,
            asset_after: self.asset_balance + quantity,
            fiat_before: self.fiat_balance,
            fiat_after: self.fiat_balance - fiat_spent,
            gross_fiat: fiat_spent,
            commission: None,
            fiat_amount: fiat_spent,
        })
    }

    /// Apply a sell execution: asset out, net fiat (after commission) in.
    pub fn apply_sell(
        &self,
        quantity: Decimal,
        price: Decimal,
        commission_rate: Decimal,
    ) -> Result<TradeApplication, LedgerError> {
        if self.asset_balance < quantity {
            return Err(LedgerError::InsufficientAsset {
                available: self.asset_balance,
                requested: quantity,
            });
        }
        let gross_fiat = quantity * price;
        let commission = gross_fiat * commission_rate;
        let net_fiat = gross_fiat - commission;
        Ok(TradeApplication {
            asset_before: self.asset_balance,
            asset_after: self.asset_balance - quantity,
            fiat_before: self.fiat_balance,
            fiat_after: self.fiat_balance + net_fiat,
            gross_fiat,
            commission: Some(commission),
            fiat_amount: net_fiat,
        })
    }

    /// Compute the day's close-out figures at the supplied asset price.
    ///
    /// The asset quantity is carried to the next day as-is; only the capital
    /// and profit figures are valued at the closing price.
    pub fn close_at(&self, closing_asset_price: Decimal) -> Result<DayClose, LedgerError> {
        if self.asset_balance < Decimal::ZERO || self.fiat_balance < Decimal::ZERO {
            return Err(LedgerError::Invariant(format!(
                "day {} would carry negative balances forward (asset {}, fiat {})",
                self.day_number, self.asset_balance, self.fiat_balance
            )));
        }
        let closing_capital = self.asset_balance * closing_asset_price + self.fiat_balance;
        let net_profit = closing_capital - self.opening_capital;
        let profit_rate = if self.opening_capital.is_zero() {
            Decimal::ZERO
        } else {
            net_profit / self.opening_capital * dec!(100)
        };
        Ok(DayClose {
            closing_asset_balance: self.asset_balance,
            closing_fiat_balance: self.fiat_balance,
            closing_capital,
            net_profit,
            profit_rate,
        })
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A published buy or sell intent, executed incrementally.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub daily_cycle_id: Uuid,
    pub side: OrderSide,
    pub published_quantity: Decimal,
    pub published_price: Decimal,
    pub published_total: Decimal,
    pub executed_quantity: Decimal,
    pub executed_total: Decimal,
    pub execution_percent: Decimal,
    pub commission_accrued: Decimal,
    pub status: OrderStatus,
    pub is_active: bool,
    pub first_execution_at: Option<DateTime<Utc>>,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Hyphenated,
    pub daily_cycle_id: Hyphenated,
    pub side: OrderSide,
    pub published_quantity: String,
    pub published_price: String,
    pub published_total: String,
    pub executed_quantity: String,
    pub executed_total: String,
    pub execution_percent: String,
    pub commission_accrued: String,
    pub status: OrderStatus,
    pub is_active: bool,
    pub first_execution_at: Option<DateTime<Utc>>,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            daily_cycle_id: row.daily_cycle_id.into_uuid(),
            side: row.side,
            published_quantity: decimal_from_db(&row.published_quantity),
            published_price: decimal_from_db(&row.published_price),
            published_total: decimal_from_db(&row.published_total),
            executed_quantity: decimal_from_db(&row.executed_quantity),
            executed_total: decimal_from_db(&row.executed_total),
            execution_percent: decimal_from_db(&row.execution_percent),
            commission_accrued: decimal_from_db(&row.commission_accrued),
            status: row.status,
            is_active: row.is_active,
            first_execution_at: row.first_execution_at,
            last_execution_at: row.last_execution_at,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Updated execution figures after recording one fill against an order.
#[derive(Debug, Clone)]
pub struct FillProgress {
    pub executed_quantity: Decimal,
    pub executed_total: Decimal,
    pub execution_percent: Decimal,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, OrderStatus::Published | OrderStatus::Partial)
    }

    pub fn accepts_executions(&self) -> bool {
        matches!(self.status, OrderStatus::Published | OrderStatus::Partial)
    }

    /// Record one fill: quantity progresses monotonically and may never exceed
    /// the published quantity. `fiat_delta` is the fiat recorded for this fill
    /// (spent for buys, net received for sells).
    pub fn record_fill(
        &self,
        quantity: Decimal,
        fiat_delta: Decimal,
    ) -> Result<FillProgress, LedgerError> {
        if !self.accepts_executions() {
            return Err(LedgerError::OrderNotExecutable { status: self.status });
        }
        let remaining = self.published_quantity - self.executed_quantity;
        if quantity > remaining {
            return Err(LedgerError::ExecutionExceedsOrder {
                remaining,
                requested: quantity,
            });
        }
        let executed_quantity = self.executed_quantity + quantity;
        let executed_total = self.executed_total + fiat_delta;
        let execution_percent = executed_quantity / self.published_quantity * dec!(100);
        let status = if execution_percent >= COMPLETION_THRESHOLD_PERCENT {
            OrderStatus::Completed
        } else {
            OrderStatus::Partial
        };
        Ok(FillProgress {
            executed_quantity,
            executed_total,
            execution_percent,
            status,
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Immutable record of one order execution and its balance impact.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: Uuid,
    pub daily_cycle_id: Uuid,
    pub side: OrderSide,
    pub executed_quantity: Decimal,
    pub executed_price: Decimal,
    pub fiat_amount: Decimal,
    pub commission: Option<Decimal>,
    pub asset_balance_before: Decimal,
    pub asset_balance_after: Decimal,
    pub fiat_balance_before: Decimal,
    pub fiat_balance_after: Decimal,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Hyphenated,
    pub order_id: Hyphenated,
    pub daily_cycle_id: Hyphenated,
    pub side: OrderSide,
    pub executed_quantity: String,
    pub executed_price: String,
    pub fiat_amount: String,
    pub commission: Option<String>,
    pub asset_balance_before: String,
    pub asset_balance_after: String,
    pub fiat_balance_before: String,
    pub fiat_balance_after: String,
    pub executed_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            order_id: row.order_id.into_uuid(),
            daily_cycle_id: row.daily_cycle_id.into_uuid(),
            side: row.side,
            executed_quantity: decimal_from_db(&row.executed_quantity),
            executed_price: decimal_from_db(&row.executed_price),
            fiat_amount: decimal_from_db(&row.fiat_amount),
            commission: opt_decimal_from_db(&row.commission),
            asset_balance_before: decimal_from_db(&row.asset_balance_before),
            asset_balance_after: decimal_from_db(&row.asset_balance_after),
            fiat_balance_before: decimal_from_db(&row.fiat_balance_before),
            fiat_balance_after: decimal_from_db(&row.fiat_balance_after),
            executed_at: row.executed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Vault movement
// ---------------------------------------------------------------------------

/// Immutable record of capital moving into or out of the vault.
#[derive(Debug, Clone, Serialize)]
pub struct VaultMovement {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub general_cycle_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VaultMovementRow {
    pub id: Hyphenated,
    pub vault_id: Hyphenated,
    pub kind: MovementKind,
    pub amount: String,
    pub balance_before: String,
    pub balance_after: String,
    pub general_cycle_id: Option<Hyphenated>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<VaultMovementRow> for VaultMovement {
    fn from(row: VaultMovementRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            vault_id: row.vault_id.into_uuid(),
            kind: row.kind,
            amount: decimal_from_db(&row.amount),
            balance_before: decimal_from_db(&row.balance_before),
            balance_after: decimal_from_db(&row.balance_after),
            general_cycle_id: row.general_cycle_id.map(Hyphenated::into_uuid),
            description: row.description,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Operation inputs
// ---------------------------------------------------------------------------

fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must be positive"));
    }
    Ok(())
}

fn non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must not be negative"));
    }
    Ok(())
}

fn commission_rate_bounds(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value >= Decimal::ONE {
        return Err(ValidationError::new("must be within [0, 1)"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewGeneralCycle {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "positive_decimal")]
    pub initial_capital: Decimal,
    #[validate(range(min = 1, max = 365))]
    pub duration_days: i64,
    #[validate(custom = "non_negative_decimal")]
    pub target_profit_rate: Decimal,
    #[validate(custom = "commission_rate_bounds")]
    pub commission_rate: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub platform: String,
    #[validate(length(min = 1, max = 16))]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublishBuyOrder {
    pub daily_cycle_id: Uuid,
    #[validate(custom = "positive_decimal")]
    pub fiat_amount: Decimal,
    #[validate(custom = "positive_decimal")]
    pub price: Decimal,
    /// Competitor sell price the published price undercuts, recorded for audit.
    pub competitor_sell_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublishSellOrder {
    pub daily_cycle_id: Uuid,
    #[validate(custom = "positive_decimal")]
    pub asset_quantity: Decimal,
    #[validate(custom = "positive_decimal")]
    pub price: Decimal,
    /// Competitor buy price the published price sits above, recorded for audit.
    pub competitor_buy_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExecuteOrder {
    pub order_id: Uuid,
    #[validate(custom = "positive_decimal")]
    pub executed_quantity: Decimal,
    #[validate(custom = "positive_decimal")]
    pub executed_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VaultDeposit {
    #[validate(custom = "positive_decimal")]
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CycleTransfer {
    pub general_cycle_id: Uuid,
    #[validate(custom = "positive_decimal")]
    pub amount: Decimal,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DepositOutcome {
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub balance_available: Decimal,
    pub balance_invested: Decimal,
    pub amount: Decimal,
    /// Remaining fiat on the active day; repatriations only.
    pub day_fiat_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedCycle {
    pub cycle: GeneralCycle,
    pub days: Vec<DailyCycle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleOverview {
    pub cycle: GeneralCycle,
    pub total_days: i64,
    pub completed_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleDetail {
    pub cycle: GeneralCycle,
    pub days: Vec<DailyCycle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayStatusView {
    pub day: DailyCycle,
    pub current_capital: Decimal,
    pub orders: Vec<Order>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClosedDaySummary {
    pub day_number: i64,
    pub opening_capital: Decimal,
    pub closing_capital: Decimal,
    pub net_profit: Decimal,
    pub profit_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextDaySummary {
    pub day_number: i64,
    pub opening_capital: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayCloseOutcome {
    pub closed: ClosedDaySummary,
    /// None when the closed day was the last of its cycle.
    pub next: Option<NextDaySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub transaction: Transaction,
    pub order: Order,
    pub asset_balance: Decimal,
    pub fiat_balance: Decimal,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
