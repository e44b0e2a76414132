//! End-to-end lifecycle tests over an in-memory database.

use std::str::FromStr;

use cycle_ledger::models::{
    CycleStatus, CycleTransfer, DayStatus, ExecuteOrder, NewGeneralCycle, OrderStatus,
    PublishBuyOrder, PublishSellOrder, VaultDeposit,
};
use cycle_ledger::{Ledger, LedgerError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

async fn test_ledger() -> Ledger {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid url")
        .foreign_keys(true);
    // A single connection keeps the in-memory database alive for the test.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    Ledger::new(pool)
}

fn cycle_input(initial: Decimal, days: i64) -> NewGeneralCycle {
    NewGeneralCycle {
        name: "usdt-ars arbitrage".to_string(),
        initial_capital: initial,
        duration_days: days,
        target_profit_rate: dec!(0.0257),
        commission_rate: dec!(0.0035),
        platform: "p2p".to_string(),
        currency: "ARS".to_string(),
    }
}

#[tokio::test]
async fn full_cycle_lifecycle() {
    let ledger = test_ledger().await;
    let user = Uuid::new_v4();

    // Fund the vault and commit capital to a three-day cycle.
    let deposit = ledger
        .deposit(user, VaultDeposit { amount: dec!(1500), description: None })
        .await
        .unwrap();
    assert_eq!(deposit.balance_after, dec!(1500));

    let created = ledger
        .create_general_cycle(user, cycle_input(dec!(1000), 3))
        .await
        .unwrap();
    assert_eq!(created.days.len(), 3);
    assert_eq!(
        created.cycle.end_date,
        created.cycle.start_date + chrono::Duration::days(3)
    );
    assert_eq!(created.days[0].status, DayStatus::Active);
    assert_eq!(created.days[0].opening_capital, dec!(1000));
    assert_eq!(created.days[0].fiat_balance, dec!(1000));
    assert_eq!(created.days[1].status, DayStatus::Pending);
    assert_eq!(created.days[1].opening_capital, Decimal::ZERO);

    let transfer = ledger
        .transfer_to_cycle(
            user,
            CycleTransfer {
                general_cycle_id: created.cycle.id,
                amount: dec!(1000),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(transfer.balance_available, dec!(500));
    assert_eq!(transfer.balance_invested, dec!(1000));

    // Day 1: buy the full fiat balance, then sell everything back.
    let day1 = created.days[0].id;
    let buy = ledger
        .publish_buy_order(
            user,
            PublishBuyOrder {
                daily_cycle_id: day1,
                fiat_amount: dec!(1000),
                price: dec!(1.024),
                competitor_sell_price: Some(dec!(1.025)),
            },
        )
        .await
        .unwrap();
    assert_eq!(buy.published_quantity, dec!(976.5625));
    assert_eq!(buy.status, OrderStatus::Published);

    let buy_exec = ledger
        .execute_buy(
            user,
            ExecuteOrder {
                order_id: buy.id,
                executed_quantity: dec!(976.5625),
                executed_price: dec!(1.024),
            },
        )
        .await
        .unwrap();
    assert_eq!(buy_exec.order.status, OrderStatus::Completed);
    assert_eq!(buy_exec.asset_balance, dec!(976.5625));
    assert_eq!(buy_exec.fiat_balance, dec!(0.000));
    assert_eq!(buy_exec.transaction.fiat_amount, dec!(1000.000));
    assert_eq!(buy_exec.transaction.commission, None);

    let sell = ledger
        .publish_sell_order(
            user,
            PublishSellOrder {
                daily_cycle_id: day1,
                asset_quantity: dec!(976.5625),
                price: dec!(1.054),
                competitor_buy_price: None,
            },
        )
        .await
        .unwrap();

    let sell_exec = ledger
        .execute_sell(
            user,
            ExecuteOrder {
                order_id: sell.id,
                executed_quantity: dec!(976.5625),
                executed_price: dec!(1.054),
            },
        )
        .await
        .unwrap();
    let gross = dec!(976.5625) * dec!(1.054);
    let commission = gross * dec!(0.0035);
    let net = gross - commission;
    assert_eq!(sell_exec.transaction.commission, Some(commission));
    assert_eq!(sell_exec.transaction.fiat_amount, net);
    assert_eq!(sell_exec.asset_balance, Decimal::ZERO);
    assert_eq!(sell_exec.fiat_balance, net);
    assert_eq!(sell_exec.order.status, OrderStatus::Completed);
    assert_eq!(sell_exec.order.executed_total, net);

    // Close day 1; the closing capital cascades into day 2 unchanged.
    let close1 = ledger.close_day(user, day1, dec!(1.0)).await.unwrap();
    assert_eq!(close1.closed.closing_capital, net);
    assert_eq!(close1.closed.net_profit, net - dec!(1000));
    let next = close1.next.expect("day 2 follows day 1");
    assert_eq!(next.day_number, 2);
    assert_eq!(next.opening_capital, close1.closed.closing_capital);

    let status2 = ledger.day_status(user, created.days[1].id).await.unwrap();
    assert_eq!(status2.day.status, DayStatus::Active);
    assert_eq!(status2.day.opening_capital, net);
    assert_eq!(status2.current_capital, net);

    // Quiet days close flat.
    let close2 = ledger
        .close_day(user, created.days[1].id, dec!(1.0))
        .await
        .unwrap();
    assert_eq!(close2.closed.net_profit, Decimal::ZERO);

    let close3 = ledger
        .close_day(user, created.days[2].id, dec!(1.0))
        .await
        .unwrap();
    assert!(close3.next.is_none());

    // Complete the cycle; realized profit lands on the vault.
    let completed = ledger
        .complete_general_cycle(user, created.cycle.id)
        .await
        .unwrap();
    assert_eq!(completed.status, CycleStatus::Completed);
    assert_eq!(completed.final_capital, Some(net));
    assert_eq!(completed.total_profit, Some(net - dec!(1000)));

    let vault = ledger.vault_status(user).await.unwrap();
    assert_eq!(vault.realized_profit_accrued, net - dec!(1000));

    let overviews = ledger.list_general_cycles(user, None).await.unwrap();
    assert_eq!(overviews.len(), 1);
    assert_eq!(overviews[0].total_days, 3);
    assert_eq!(overviews[0].completed_days, 3);
}

#[tokio::test]
async fn close_day_blocked_by_open_orders() {
    let ledger = test_ledger().await;
    let user = Uuid::new_v4();
    let created = ledger
        .create_general_cycle(user, cycle_input(dec!(500), 2))
        .await
        .unwrap();
    let day1 = created.days[0].id;

    let order = ledger
        .publish_buy_order(
            user,
            PublishBuyOrder {
                daily_cycle_id: day1,
                fiat_amount: dec!(100),
                price: dec!(1.0),
                competitor_sell_price: None,
            },
        )
        .await
        .unwrap();

    let err = ledger.close_day(user, day1, dec!(1.0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ActiveOrdersRemaining { pending: 1 }));

    let cancelled = ledger.cancel_order(user, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(!cancelled.is_active);

    ledger.close_day(user, day1, dec!(1.0)).await.unwrap();

    // A closed day cannot be closed again.
    let err = ledger.close_day(user, day1, dec!(1.0)).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::DayNotActive { status: DayStatus::Completed }
    ));
}

#[tokio::test]
async fn partial_executions_progress_and_cap() {
    let ledger = test_ledger().await;
    let user = Uuid::new_v4();
    let created = ledger
        .create_general_cycle(user, cycle_input(dec!(1000), 1))
        .await
        .unwrap();
    let day1 = created.days[0].id;

    let order = ledger
        .publish_buy_order(
            user,
            PublishBuyOrder {
                daily_cycle_id: day1,
                fiat_amount: dec!(1000),
                price: dec!(1.0),
                competitor_sell_price: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(order.published_quantity, dec!(1000));

    let first = ledger
        .execute_buy(
            user,
            ExecuteOrder {
                order_id: order.id,
                executed_quantity: dec!(400),
                executed_price: dec!(1.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(first.order.status, OrderStatus::Partial);
    assert_eq!(first.order.execution_percent, dec!(40));
    assert!(first.order.first_execution_at.is_some());

    let err = ledger
        .execute_buy(
            user,
            ExecuteOrder {
                order_id: order.id,
                executed_quantity: dec!(700),
                executed_price: dec!(1.0),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ExecutionExceedsOrder { .. }));

    let last = ledger
        .execute_buy(
            user,
            ExecuteOrder {
                order_id: order.id,
                executed_quantity: dec!(600),
                executed_price: dec!(1.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(last.order.status, OrderStatus::Completed);
    assert_eq!(last.order.executed_quantity, dec!(1000));
    assert_eq!(last.fiat_balance, Decimal::ZERO);

    // Completed orders accept neither executions nor cancellation.
    let err = ledger
        .execute_buy(
            user,
            ExecuteOrder {
                order_id: order.id,
                executed_quantity: dec!(1),
                executed_price: dec!(1.0),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotExecutable { .. }));

    let err = ledger.cancel_order(user, order.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotCancellable { .. }));

    let transactions = ledger.list_transactions(user, day1).await.unwrap();
    assert_eq!(transactions.len(), 2);
}

#[tokio::test]
async fn repatriation_debits_active_day() {
    let ledger = test_ledger().await;
    let user = Uuid::new_v4();
    ledger
        .deposit(user, VaultDeposit { amount: dec!(1000), description: None })
        .await
        .unwrap();
    let created = ledger
        .create_general_cycle(user, cycle_input(dec!(800), 1))
        .await
        .unwrap();
    ledger
        .transfer_to_cycle(
            user,
            CycleTransfer {
                general_cycle_id: created.cycle.id,
                amount: dec!(800),
                description: None,
            },
        )
        .await
        .unwrap();

    let err = ledger
        .transfer_from_cycle(
            user,
            CycleTransfer {
                general_cycle_id: created.cycle.id,
                amount: dec!(900),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientCycleFunds { .. }));

    let back = ledger
        .transfer_from_cycle(
            user,
            CycleTransfer {
                general_cycle_id: created.cycle.id,
                amount: dec!(300),
                description: Some("partial repatriation".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(back.balance_available, dec!(500));
    assert_eq!(back.balance_invested, dec!(500));
    assert_eq!(back.day_fiat_balance, Some(dec!(500)));

    ledger
        .close_day(user, created.days[0].id, dec!(1.0))
        .await
        .unwrap();

    // With every day closed there is nothing left to repatriate from.
    let err = ledger
        .transfer_from_cycle(
            user,
            CycleTransfer {
                general_cycle_id: created.cycle.id,
                amount: dec!(10),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NoActiveDay));

    let movements = ledger.vault_movements(user, 10).await.unwrap();
    assert_eq!(movements.len(), 3);

    // Non-positive limits must not fall through to SQLite's unbounded LIMIT.
    let movements = ledger.vault_movements(user, -1).await.unwrap();
    assert_eq!(movements.len(), 1);
    let movements = ledger.vault_movements(user, 0).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn liquidity_checks_on_publish() {
    let ledger = test_ledger().await;
    let user = Uuid::new_v4();
    let created = ledger
        .create_general_cycle(user, cycle_input(dec!(100), 1))
        .await
        .unwrap();
    let day1 = created.days[0].id;

    let err = ledger
        .publish_buy_order(
            user,
            PublishBuyOrder {
                daily_cycle_id: day1,
                fiat_amount: dec!(150),
                price: dec!(1.0),
                competitor_sell_price: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFiat { .. }));

    let err = ledger
        .publish_sell_order(
            user,
            PublishSellOrder {
                daily_cycle_id: day1,
                asset_quantity: dec!(1),
                price: dec!(1.0),
                competitor_buy_price: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientAsset { .. }));
}

#[tokio::test]
async fn entities_are_scoped_to_their_owner() {
    let ledger = test_ledger().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let created = ledger
        .create_general_cycle(owner, cycle_input(dec!(100), 1))
        .await
        .unwrap();
    let order = ledger
        .publish_buy_order(
            owner,
            PublishBuyOrder {
                daily_cycle_id: created.days[0].id,
                fiat_amount: dec!(50),
                price: dec!(1.0),
                competitor_sell_price: None,
            },
        )
        .await
        .unwrap();

    let err = ledger
        .get_general_cycle(stranger, created.cycle.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CycleNotFound));

    let err = ledger
        .day_status(stranger, created.days[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CycleNotFound));

    let err = ledger.cancel_order(stranger, order.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotFound));

    assert!(ledger
        .list_general_cycles(stranger, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn rejects_invalid_inputs() {
    let ledger = test_ledger().await;
    let user = Uuid::new_v4();

    let err = ledger
        .deposit(user, VaultDeposit { amount: dec!(-10), description: None })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let mut input = cycle_input(dec!(100), 1);
    input.duration_days = 0;
    let err = ledger.create_general_cycle(user, input).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let created = ledger
        .create_general_cycle(user, cycle_input(dec!(100), 1))
        .await
        .unwrap();
    let err = ledger
        .close_day(user, created.days[0].id, dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
