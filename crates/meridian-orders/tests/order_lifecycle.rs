//! End-to-end lifecycle tests against an in-memory SQLite database.
//!
//! These drive the public service operations the way a controller layer
//! would and assert the §-level behavior: totals tracking cart edits,
//! clamping with warnings, eligibility aborts, settlement + cashback, and
//! cancellation restoring stock and bonus.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};

use meridian_core::error::ErrorKind;
use meridian_core::{Customer, Money, OrderStatus, Product};
use meridian_db::repository::{customer, generate_id, loyalty, product};
use meridian_db::{Database, DbConfig};
use meridian_orders::{LoyaltyService, OrderService};

// =============================================================================
// Test Fixtures
// =============================================================================

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

async fn setup() -> (Database, OrderService, LoyaltyService) {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let orders = OrderService::new(db.clone());
    let accounts = LoyaltyService::new(db.clone());
    (db, orders, accounts)
}

async fn seed_customer(db: &Database, birth_date: Option<NaiveDate>) -> Customer {
    let now = Utc::now();
    let c = Customer {
        id: generate_id(),
        name: "Jane".to_string(),
        surname: "Doe".to_string(),
        email: format!("{}@example.com", generate_id()),
        birth_date,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let mut conn = db.pool().acquire().await.unwrap();
    customer::insert(&mut *conn, &c).await.unwrap();
    c
}

async fn seed_product(
    db: &Database,
    price_cents: i64,
    quantity: i64,
    min_age: Option<i64>,
) -> Product {
    let now = Utc::now();
    let p = Product {
        id: generate_id(),
        name: "Test Product".to_string(),
        price_cents,
        quantity,
        is_restricted: min_age.is_some(),
        min_age,
        created_at: now,
        updated_at: now,
    };
    let mut conn = db.pool().acquire().await.unwrap();
    product::insert(&mut *conn, &p).await.unwrap();
    p
}

async fn stock_of(db: &Database, product_id: &str) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    product::get(&mut *conn, product_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

async fn balance_of(db: &Database, customer_id: &str) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    loyalty::get_by_customer(&mut *conn, customer_id)
        .await
        .unwrap()
        .unwrap()
        .balance_cents
}

fn lines(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
    entries
        .iter()
        .map(|(id, qty)| (id.to_string(), *qty))
        .collect()
}

fn adult_birth_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1990, 5, 20)
}

/// A birth date exactly `years` ago (clamped off month-end edges), so
/// age-sensitive tests keep working whatever today is.
fn birth_date_years_ago(years: i32) -> Option<NaiveDate> {
    let today = Utc::now().date_naive();
    NaiveDate::from_ymd_opt(today.year() - years, today.month(), today.day().min(28))
}

// =============================================================================
// Cart Behavior
// =============================================================================

#[tokio::test]
async fn total_tracks_every_cart_edit() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;
    let coffee = seed_product(&db, 1200, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    assert_eq!(draft.total_cost_cents, 0);

    let snap = orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 2), (&coffee.id, 3)]))
        .await
        .unwrap();
    assert_eq!(snap.total_cost_cents, 2 * 350 + 3 * 1200);
    assert!(snap.warnings.is_empty());

    let snap = orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 1)]))
        .await
        .unwrap();
    assert_eq!(snap.total_cost_cents, 3 * 350 + 3 * 1200);

    let snap = orders.remove_from_cart(&draft.id, &coffee.id).await.unwrap();
    assert_eq!(snap.total_cost_cents, 3 * 350);
    assert_eq!(snap.lines.len(), 1);
}

#[tokio::test]
async fn draft_is_reused_per_customer() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;

    let first = orders.create_or_get_draft(&jane.id).await.unwrap();
    let second = orders.create_or_get_draft(&jane.id).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn add_to_cart_clamps_to_stock_with_warning() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let scarce = seed_product(&db, 1000, 10, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    let snap = orders
        .add_to_cart(&draft.id, &lines(&[(&scarce.id, 15)]))
        .await
        .unwrap();

    assert_eq!(snap.lines.get(&scarce.id), Some(&10));
    assert_eq!(snap.warnings.len(), 1);
    assert_eq!(snap.warnings[0].requested, 15);
    assert_eq!(snap.warnings[0].supplied, 10);
    assert_eq!(snap.total_cost_cents, 10 * 1000);
}

#[tokio::test]
async fn cart_rejections() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let gone = seed_product(&db, 1000, 0, None).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();

    // Zero stock is an error, not a clamp
    let err = orders
        .add_to_cart(&draft.id, &lines(&[(&gone.id, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfStock);

    // Non-positive quantities
    let err = orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 0)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuantity);

    // Removing a line that was never added
    let err = orders.remove_from_cart(&draft.id, &tea.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Unknown order
    let err = orders
        .add_to_cart("ghost", &lines(&[(&tea.id, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Confirmation
// =============================================================================

#[tokio::test]
async fn confirm_settles_bonus_and_pays_cashback() {
    let (db, orders, accounts) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let gadget = seed_product(&db, 3500, 50, None).await;

    accounts.open_account(&jane.id, "MC-0001").await.unwrap();
    accounts
        .credit(&jane.id, Money::from_cents(3000))
        .await
        .unwrap();

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&gadget.id, 2)]))
        .await
        .unwrap();

    // Balance $30, cart $70
    let snap = orders.confirm(&draft.id).await.unwrap();
    assert_eq!(snap.status, OrderStatus::Processing);
    assert_eq!(snap.bonus_used_cents, 3000);
    assert_eq!(snap.total_cost_cents, 4000);

    // Settlement drained the balance to 0, then 5% cashback on the $40
    // actually charged landed: $2.00.
    assert_eq!(balance_of(&db, &jane.id).await, 200);

    // Stock locked in exactly once
    assert_eq!(stock_of(&db, &gadget.id).await, 48);
}

#[tokio::test]
async fn confirm_without_account_charges_full_total() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let gadget = seed_product(&db, 3500, 50, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&gadget.id, 2)]))
        .await
        .unwrap();

    let snap = orders.confirm(&draft.id).await.unwrap();
    assert_eq!(snap.total_cost_cents, 7000);
    assert_eq!(snap.bonus_used_cents, 0);
}

#[tokio::test]
async fn confirm_clamps_against_live_stock() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let scarce = seed_product(&db, 1000, 10, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&scarce.id, 8)]))
        .await
        .unwrap();

    // Stock drops to 5 between the cart edit and the confirmation
    {
        let mut conn = db.pool().acquire().await.unwrap();
        product::adjust_stock(&mut *conn, &scarce.id, -5)
            .await
            .unwrap();
    }

    let snap = orders.confirm(&draft.id).await.unwrap();
    assert_eq!(snap.lines.get(&scarce.id), Some(&5));
    assert_eq!(snap.warnings.len(), 1);
    assert_eq!(snap.warnings[0].requested, 8);
    assert_eq!(snap.warnings[0].supplied, 5);
    assert_eq!(snap.total_cost_cents, 5 * 1000);
    assert_eq!(stock_of(&db, &scarce.id).await, 0);
}

#[tokio::test]
async fn confirm_rejects_underage_customer_without_touching_stock() {
    let (db, orders, _) = setup().await;
    let teen = seed_customer(&db, birth_date_years_ago(16)).await;
    let whisky = seed_product(&db, 2500, 30, Some(18)).await;

    let draft = orders.create_or_get_draft(&teen.id).await.unwrap();

    // Cart edits deliberately skip the age check
    let snap = orders
        .add_to_cart(&draft.id, &lines(&[(&whisky.id, 1)]))
        .await
        .unwrap();
    assert_eq!(snap.lines.len(), 1);

    let err = orders.confirm(&draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AgeRestricted);

    // The whole transition aborted: no stock committed, order still DRAFT
    assert_eq!(stock_of(&db, &whisky.id).await, 30);
    let snap = orders.order(&draft.id).await.unwrap();
    assert_eq!(snap.status, OrderStatus::Draft);
}

#[tokio::test]
async fn confirm_requires_lines_and_happens_once() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();

    let err = orders.confirm(&draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyOrder);

    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 4)]))
        .await
        .unwrap();
    orders.confirm(&draft.id).await.unwrap();
    assert_eq!(stock_of(&db, &tea.id).await, 96);

    // Second confirm is an invalid transition and stock moves only once
    let err = orders.confirm(&draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(stock_of(&db, &tea.id).await, 96);
}

#[tokio::test]
async fn cart_is_immutable_after_confirmation() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 4)]))
        .await
        .unwrap();
    orders.confirm(&draft.id).await.unwrap();

    let err = orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = orders.remove_from_cart(&draft.id, &tea.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

// =============================================================================
// Status Advances and Cancellation
// =============================================================================

#[tokio::test]
async fn forward_advances_are_pure_status_changes() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 4)]))
        .await
        .unwrap();
    let confirmed = orders.confirm(&draft.id).await.unwrap();

    let shipped = orders
        .set_status(&draft.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.total_cost_cents, confirmed.total_cost_cents);
    assert_eq!(stock_of(&db, &tea.id).await, 96);

    let delivered = orders
        .set_status(&draft.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    // Terminal orders accept nothing further
    let err = orders.cancel(&draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    let err = orders
        .set_status(&draft.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn skipping_a_stage_is_rejected() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    let err = orders
        .set_status(&draft.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn cancel_processing_restores_stock_and_bonus() {
    let (db, orders, accounts) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let gadget = seed_product(&db, 3500, 50, None).await;

    accounts.open_account(&jane.id, "MC-0002").await.unwrap();
    accounts
        .credit(&jane.id, Money::from_cents(3000))
        .await
        .unwrap();

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&gadget.id, 2)]))
        .await
        .unwrap();
    orders.confirm(&draft.id).await.unwrap();
    // After confirm: stock 48, balance 200 (cashback), bonus held 3000

    let snap = orders.cancel(&draft.id).await.unwrap();
    assert_eq!(snap.status, OrderStatus::Canceled);
    assert_eq!(snap.bonus_used_cents, 0);
    // Pre-bonus total restored onto the terminal record
    assert_eq!(snap.total_cost_cents, 7000);

    assert_eq!(stock_of(&db, &gadget.id).await, 50);
    assert_eq!(balance_of(&db, &jane.id).await, 3200);
}

#[tokio::test]
async fn cancel_draft_touches_nothing() {
    let (db, orders, accounts) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    accounts.open_account(&jane.id, "MC-0003").await.unwrap();
    accounts
        .credit(&jane.id, Money::from_cents(500))
        .await
        .unwrap();

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 4)]))
        .await
        .unwrap();

    let snap = orders.cancel(&draft.id).await.unwrap();
    assert_eq!(snap.status, OrderStatus::Canceled);

    // No stock was ever locked in, no bonus ever held
    assert_eq!(stock_of(&db, &tea.id).await, 100);
    assert_eq!(balance_of(&db, &jane.id).await, 500);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn orders_are_queryable_by_customer_and_status() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 1)]))
        .await
        .unwrap();
    orders.confirm(&draft.id).await.unwrap();

    let mine = orders.orders_for_customer(&jane.id).await.unwrap();
    assert_eq!(mine.len(), 1);

    let processing = orders
        .orders_with_status(OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, draft.id);

    let drafts = orders.orders_with_status(OrderStatus::Draft).await.unwrap();
    assert!(drafts.is_empty());
}

// =============================================================================
// Sentinel Reassignment and Retirement
// =============================================================================

#[tokio::test]
async fn retire_customer_parks_history_on_sentinel() {
    let (db, orders, accounts) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    accounts.open_account(&jane.id, "MC-0004").await.unwrap();

    // One delivered order...
    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 1)]))
        .await
        .unwrap();
    orders.confirm(&draft.id).await.unwrap();
    orders
        .set_status(&draft.id, OrderStatus::Shipped)
        .await
        .unwrap();
    orders
        .set_status(&draft.id, OrderStatus::Delivered)
        .await
        .unwrap();

    // ...and a leftover cart
    let leftover = orders.create_or_get_draft(&jane.id).await.unwrap();

    orders.retire_customer(&jane.id).await.unwrap();

    // Customer and account are gone
    {
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(customer::get(&mut *conn, &jane.id).await.unwrap().is_none());
        assert!(loyalty::get_by_customer(&mut *conn, &jane.id)
            .await
            .unwrap()
            .is_none());
    }

    // History survived under the sentinel owner
    let delivered = orders.order(&draft.id).await.unwrap();
    assert_ne!(delivered.customer_id, jane.id);
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let parked = orders.order(&leftover.id).await.unwrap();
    assert_eq!(parked.status, OrderStatus::Canceled);
    assert_eq!(parked.customer_id, delivered.customer_id);
}

#[tokio::test]
async fn retire_customer_blocked_by_orders_in_flight() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 1)]))
        .await
        .unwrap();
    orders.confirm(&draft.id).await.unwrap();

    let err = orders.retire_customer(&jane.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Nothing happened
    let mut conn = db.pool().acquire().await.unwrap();
    assert!(customer::get(&mut *conn, &jane.id).await.unwrap().is_some());
}

#[tokio::test]
async fn reassign_owner_requires_terminal_status() {
    let (db, orders, _) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;
    let john = seed_customer(&db, adult_birth_date()).await;
    let tea = seed_product(&db, 350, 100, None).await;

    let draft = orders.create_or_get_draft(&jane.id).await.unwrap();
    orders
        .add_to_cart(&draft.id, &lines(&[(&tea.id, 1)]))
        .await
        .unwrap();

    let err = orders.reassign_owner(&draft.id, &john.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    orders.confirm(&draft.id).await.unwrap();
    orders.cancel(&draft.id).await.unwrap();

    let moved = orders.reassign_owner(&draft.id, &john.id).await.unwrap();
    assert_eq!(moved.customer_id, john.id);
}

// =============================================================================
// Loyalty Surface
// =============================================================================

#[tokio::test]
async fn loyalty_accounts_open_and_credit() {
    let (db, _, accounts) = setup().await;
    let jane = seed_customer(&db, adult_birth_date()).await;

    let account = accounts.open_account(&jane.id, "MC-1000").await.unwrap();
    assert_eq!(account.balance_cents, 0);

    let updated = accounts
        .credit(&jane.id, Money::from_cents(1500))
        .await
        .unwrap();
    assert_eq!(updated.balance_cents, 1500);

    let found = accounts.find_by_card_number("MC-1000").await.unwrap();
    assert_eq!(found.id, account.id);

    // Non-positive promotional credit is refused
    let err = accounts.credit(&jane.id, Money::zero()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Duplicate card number is refused
    let john = seed_customer(&db, adult_birth_date()).await;
    let err = accounts.open_account(&john.id, "MC-1000").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
