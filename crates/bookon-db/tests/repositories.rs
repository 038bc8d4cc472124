//! Repository integration tests.
//!
//! These run against a real PostgreSQL database:
//!
//! ```bash
//! TEST_DATABASE_URL=postgres://localhost/bookon_test cargo test -p bookon-db
//! ```
//!
//! Every test creates its own business account and parent, so tests can
//! share one database and run in parallel. Without `TEST_DATABASE_URL`
//! each test returns early.

use chrono::{Duration, Utc};
use uuid::Uuid;

use bookon_core::booking::{BookingStatus, NewBooking};
use bookon_core::bulk::BulkTfcAction;
use bookon_core::credit::CreditSource;
use bookon_core::fees::{FeeConfig, FranchiseFee};
use bookon_core::register::AttendanceStatus;
use bookon_core::tfc::{TfcAction, TfcFilter, TfcStatus};
use bookon_core::{CoreError, Money, PageRequest, PaymentMethod, PaymentStatus, Rate, VatMode};
use bookon_db::{Database, DbConfig, DbError, WebhookProvider, WebhookStatus};

const ACTOR: &str = "test-admin";

async fn test_db() -> Option<Database> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = Database::new(DbConfig::new(url).max_connections(5))
        .await
        .expect("test database should be reachable");
    Some(db)
}

fn id() -> String {
    Uuid::new_v4().to_string()
}

/// 10% inclusive, 50p admin fee, in effect since yesterday.
async fn seed_fee_config(db: &Database, business: &str) {
    let config = FeeConfig::new(
        business,
        FranchiseFee::Percent(Rate::from_bps(1_000)),
        VatMode::Inclusive,
        Money::from_pence(50),
    )
    .effective_from(Utc::now() - Duration::days(1));
    db.fee_configs().insert(&config, ACTOR).await.unwrap();
}

fn booking(business: &str, parent: &str, pence: i64, method: PaymentMethod) -> NewBooking {
    NewBooking {
        business_account_id: business.to_string(),
        activity_id: id(),
        child_id: id(),
        parent_id: parent.to_string(),
        date: Utc::now().date_naive() + Duration::days(3),
        amount: Money::from_pence(pence),
        payment_method: method,
    }
}

#[tokio::test]
async fn test_tfc_mark_paid_confirms_booking_and_writes_ledger() {
    let Some(db) = test_db().await else { return };
    let business = id();
    seed_fee_config(&db, &business).await;

    let checkout = db
        .bookings()
        .create(booking(&business, &id(), 10_000, PaymentMethod::Tfc), ACTOR)
        .await
        .unwrap();
    let tfc = checkout.tfc.expect("tfc booking gets a TFC record");
    assert!(tfc.payment_reference.starts_with("TFC-"));
    assert_eq!(checkout.booking.status, BookingStatus::Pending);

    let applied = db
        .tfc()
        .apply(&tfc.id, &TfcAction::MarkPaid, ACTOR, Some(&business))
        .await
        .unwrap();
    assert_eq!(applied.tfc.status, TfcStatus::Paid);
    assert_eq!(applied.tfc.amount_received_pence, 10_000);
    assert_eq!(applied.booking.status, BookingStatus::Confirmed);
    assert_eq!(applied.booking.payment_status, PaymentStatus::Paid);

    let entry = db
        .ledger()
        .for_booking(&checkout.booking.id)
        .await
        .unwrap()
        .expect("settled booking has a ledger row");
    assert_eq!(entry.gross_pence, 10_000);
    assert_eq!(entry.franchise_fee_pence, 1_000);
    assert_eq!(entry.vat_pence, 167);
    assert_eq!(entry.net_to_venue_pence, 8_950);

    let summary = db
        .ledger()
        .summary(
            &business,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(summary.transactions, 1);
    assert_eq!(summary.gross_pence, 10_000);
    assert_eq!(
        summary.net_to_venue_pence + summary.franchise_fee_pence + summary.admin_fee_pence,
        summary.gross_pence
    );

    // paid is terminal
    let again = db
        .tfc()
        .apply(&tfc.id, &TfcAction::Cancel, ACTOR, Some(&business))
        .await;
    assert!(matches!(
        again,
        Err(DbError::Core(CoreError::InvalidTransition { .. }))
    ));
}

#[tokio::test]
async fn test_tfc_scope_hides_other_tenants() {
    let Some(db) = test_db().await else { return };
    let business = id();

    let checkout = db
        .bookings()
        .create(booking(&business, &id(), 2_000, PaymentMethod::Tfc), ACTOR)
        .await
        .unwrap();
    let tfc = checkout.tfc.unwrap();

    let result = db
        .tfc()
        .apply(&tfc.id, &TfcAction::Cancel, ACTOR, Some(&id()))
        .await;
    assert!(matches!(result, Err(DbError::NotFound { .. })));
}

#[tokio::test]
async fn test_part_paid_then_convert_to_credit() {
    let Some(db) = test_db().await else { return };
    let business = id();
    let parent = id();

    let checkout = db
        .bookings()
        .create(booking(&business, &parent, 3_000, PaymentMethod::Tfc), ACTOR)
        .await
        .unwrap();
    let tfc = checkout.tfc.unwrap();

    db.tfc()
        .apply(&tfc.id, &TfcAction::MarkPartPaid { amount: 1_200 }, ACTOR, None)
        .await
        .unwrap();

    // part-paid money cannot simply be cancelled away
    let cancel = db.tfc().apply(&tfc.id, &TfcAction::Cancel, ACTOR, None).await;
    assert!(cancel.is_err());

    let applied = db
        .tfc()
        .apply(&tfc.id, &TfcAction::ConvertToCredit { amount: None }, ACTOR, None)
        .await
        .unwrap();
    assert_eq!(applied.tfc.status, TfcStatus::Cancelled);
    assert_eq!(applied.booking.status, BookingStatus::Cancelled);

    let credit = applied.credit.expect("conversion issues a credit");
    assert_eq!(credit.amount_pence, 1_200);
    assert_eq!(credit.source, CreditSource::TfcConversion);
    assert_eq!(applied.tfc.credit_id.as_deref(), Some(credit.id.as_str()));

    let balance = db.credits().balance(&parent).await.unwrap();
    assert_eq!(balance, Money::from_pence(1_200));
}

#[tokio::test]
async fn test_bulk_mark_paid_reports_each_id() {
    let Some(db) = test_db().await else { return };
    let business = id();
    seed_fee_config(&db, &business).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let checkout = db
            .bookings()
            .create(booking(&business, &id(), 1_500, PaymentMethod::Tfc), ACTOR)
            .await
            .unwrap();
        ids.push(checkout.tfc.unwrap().id);
    }
    ids.push(id());

    let bulk = db
        .tfc()
        .bulk_apply(&ids, BulkTfcAction::MarkPaid, ACTOR, Some(&business))
        .await;
    let report = &bulk.report;

    assert_eq!(bulk.applied.len(), 2);
    assert!(bulk
        .applied
        .iter()
        .all(|applied| applied.booking.status == BookingStatus::Confirmed));
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.results.len(), 3);
    assert!(report.results[0].success);
    assert!(report.results[1].success);
    assert!(!report.results[2].success);
    let error = report.results[2].error.as_deref().unwrap();
    assert!(error.starts_with("TFC booking not found"), "{error}");
}

#[tokio::test]
async fn test_missing_fee_config_rolls_back_settlement() {
    let Some(db) = test_db().await else { return };
    let business = id();

    let checkout = db
        .bookings()
        .create(booking(&business, &id(), 1_000, PaymentMethod::Tfc), ACTOR)
        .await
        .unwrap();
    let tfc = checkout.tfc.unwrap();

    let result = db.tfc().apply(&tfc.id, &TfcAction::MarkPaid, ACTOR, None).await;
    assert!(matches!(
        result,
        Err(DbError::Core(CoreError::NoFeeConfig { .. }))
    ));

    let stored = db.tfc().get_by_id(&tfc.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TfcStatus::PendingPayment);
    let stored = db.bookings().get_by_id(&checkout.booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_credit_checkout_redeems_and_rejects_overspend() {
    let Some(db) = test_db().await else { return };
    let business = id();
    let parent = id();
    seed_fee_config(&db, &business).await;

    db.credits()
        .grant(&parent, Money::from_pence(2_000), None, ACTOR)
        .await
        .unwrap();
    db.credits()
        .grant(
            &parent,
            Money::from_pence(1_000),
            Some(Utc::now() + Duration::days(10)),
            ACTOR,
        )
        .await
        .unwrap();

    let checkout = db
        .bookings()
        .create(booking(&business, &parent, 1_500, PaymentMethod::Credit), ACTOR)
        .await
        .unwrap();
    assert_eq!(checkout.booking.status, BookingStatus::Confirmed);
    assert_eq!(checkout.redemptions.len(), 2);
    // expiring credit first
    assert_eq!(checkout.redemptions[0].amount, Money::from_pence(1_000));
    assert_eq!(checkout.redemptions[1].amount, Money::from_pence(500));

    assert_eq!(
        db.credits().balance(&parent).await.unwrap(),
        Money::from_pence(1_500)
    );

    let overspend = db
        .bookings()
        .create(booking(&business, &parent, 1_600, PaymentMethod::Credit), ACTOR)
        .await;
    assert!(matches!(
        overspend,
        Err(DbError::Core(CoreError::InsufficientCredit { .. }))
    ));
    assert_eq!(
        db.credits().balance(&parent).await.unwrap(),
        Money::from_pence(1_500)
    );
}

#[tokio::test]
async fn test_cancel_part_paid_booking_converts_to_credit() {
    let Some(db) = test_db().await else { return };
    let business = id();
    let parent = id();

    let checkout = db
        .bookings()
        .create(booking(&business, &parent, 4_000, PaymentMethod::Tfc), ACTOR)
        .await
        .unwrap();
    let tfc = checkout.tfc.unwrap();
    db.tfc()
        .apply(&tfc.id, &TfcAction::MarkPartPaid { amount: 1_000 }, ACTOR, None)
        .await
        .unwrap();

    let (cancelled, credit) = db
        .bookings()
        .cancel(
            &checkout.booking.id,
            ACTOR,
            Some("Child unwell".to_string()),
            false,
            Some(&business),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Child unwell"));
    assert_eq!(credit.map(|c| c.amount_pence), Some(1_000));

    let stored = db.tfc().get_by_id(&tfc.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TfcStatus::Cancelled);
}

#[tokio::test]
async fn test_concurrent_tfc_cancel_and_booking_cancel_do_not_deadlock() {
    let Some(db) = test_db().await else { return };
    let business = id();

    for _ in 0..10 {
        let checkout = db
            .bookings()
            .create(booking(&business, &id(), 2_500, PaymentMethod::Tfc), ACTOR)
            .await
            .unwrap();
        let tfc = checkout.tfc.unwrap();

        let tfc_repo = db.tfc();
        let bookings = db.bookings();
        let (by_admin, by_parent) = tokio::join!(
            tfc_repo.apply(&tfc.id, &TfcAction::Cancel, ACTOR, Some(&business)),
            bookings.cancel(&checkout.booking.id, ACTOR, None, false, Some(&business)),
        );

        // one of them wins; the loser sees a rule error, never a deadlock
        let wins = [by_admin.is_ok(), by_parent.is_ok()];
        assert_eq!(wins.iter().filter(|w| **w).count(), 1, "{wins:?}");
        for err in [by_admin.err(), by_parent.err()].into_iter().flatten() {
            assert!(
                matches!(err, DbError::Core(CoreError::InvalidTransition { .. })),
                "{err}"
            );
        }

        let stored = db.tfc().get_by_id(&tfc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TfcStatus::Cancelled);
    }
}

#[tokio::test]
async fn test_refund_to_credit_and_to_card() {
    let Some(db) = test_db().await else { return };
    let business = id();
    let parent = id();
    seed_fee_config(&db, &business).await;

    let first = db
        .bookings()
        .create(booking(&business, &parent, 2_500, PaymentMethod::Card), ACTOR)
        .await
        .unwrap();
    db.bookings().confirm_paid(&first.booking.id, ACTOR).await.unwrap();

    let (refunded, credit) = db
        .bookings()
        .cancel(&first.booking.id, ACTOR, None, true, None)
        .await
        .unwrap();
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    let credit = credit.expect("refund to credit issues a credit");
    assert_eq!(credit.source, CreditSource::Refund);
    assert_eq!(credit.amount_pence, 2_500);

    let second = db
        .bookings()
        .create(booking(&business, &parent, 900, PaymentMethod::Card), ACTOR)
        .await
        .unwrap();
    db.bookings().confirm_paid(&second.booking.id, ACTOR).await.unwrap();
    let (refunded, credit) = db
        .bookings()
        .mark_refunded(&second.booking.id, ACTOR, bookon_db::RefundTarget::OriginalPayment)
        .await
        .unwrap();
    assert_eq!(refunded.status, BookingStatus::Cancelled);
    assert!(credit.is_none());

    // ledger rows stay, but refunded revenue moves out of the totals
    assert!(db.ledger().for_booking(&first.booking.id).await.unwrap().is_some());
    let summary = db
        .ledger()
        .summary(
            &business,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(summary.transactions, 0);
    assert_eq!(summary.gross_pence, 0);
    assert_eq!(summary.refunded_transactions, 2);
    assert_eq!(summary.refunded_pence, 3_400);
}

#[tokio::test]
async fn test_settlement_uses_fee_config_from_booking_time() {
    let Some(db) = test_db().await else { return };
    let business = id();
    seed_fee_config(&db, &business).await;

    let checkout = db
        .bookings()
        .create(booking(&business, &id(), 10_000, PaymentMethod::Tfc), ACTOR)
        .await
        .unwrap();
    let tfc = checkout.tfc.unwrap();

    // terms change after checkout but before the money arrives
    let raised = FeeConfig::new(
        &business,
        FranchiseFee::Percent(Rate::from_bps(2_000)),
        VatMode::Inclusive,
        Money::zero(),
    )
    .effective_from(Utc::now());
    db.fee_configs().insert(&raised, ACTOR).await.unwrap();

    db.tfc()
        .apply(&tfc.id, &TfcAction::MarkPaid, ACTOR, Some(&business))
        .await
        .unwrap();

    let entry = db
        .ledger()
        .for_booking(&checkout.booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(entry.fee_config_id, raised.id);
    assert_eq!(entry.franchise_fee_pence, 1_000);
    assert_eq!(entry.admin_fee_pence, 50);
    assert_eq!(entry.net_to_venue_pence, 8_950);
}

#[tokio::test]
async fn test_tfc_list_filters_by_status() {
    let Some(db) = test_db().await else { return };
    let business = id();

    for _ in 0..3 {
        db.bookings()
            .create(booking(&business, &id(), 1_000, PaymentMethod::Tfc), ACTOR)
            .await
            .unwrap();
    }

    let filter = TfcFilter {
        status: Some(TfcStatus::PendingPayment),
        overdue: Some(false),
        ..Default::default()
    };
    let page = db
        .tfc()
        .list(Some(&business), &filter, PageRequest::new(Some(1), Some(2)))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 2);
}

#[tokio::test]
async fn test_register_create_is_idempotent() {
    let Some(db) = test_db().await else { return };
    let business = id();

    let mut input = booking(&business, &id(), 0, PaymentMethod::Free);
    let activity = input.activity_id.clone();
    let date = input.date;
    let first = db.bookings().create(input.clone(), ACTOR).await.unwrap();

    let sheet = db
        .registers()
        .create(&business, &activity, date, ACTOR)
        .await
        .unwrap();
    assert_eq!(sheet.attendance.len(), 1);

    input.child_id = id();
    db.bookings().create(input, ACTOR).await.unwrap();

    let again = db
        .registers()
        .create(&business, &activity, date, ACTOR)
        .await
        .unwrap();
    assert_eq!(again.register.id, sheet.register.id);
    assert_eq!(again.attendance.len(), 2);

    let line = db
        .registers()
        .mark_attendance(
            &sheet.register.id,
            &first.booking.id,
            AttendanceStatus::Present,
            ACTOR,
            Some(&business),
        )
        .await
        .unwrap();
    assert_eq!(line.status, AttendanceStatus::Present);
    assert_eq!(line.marked_by.as_deref(), Some(ACTOR));
}

#[tokio::test]
async fn test_webhook_receive_is_idempotent() {
    let Some(db) = test_db().await else { return };
    let external_id = format!("evt_{}", Uuid::new_v4().simple());
    let payload = serde_json::json!({ "id": external_id, "type": "payment_intent.succeeded" });

    let first = db
        .webhooks()
        .receive(WebhookProvider::Stripe, &external_id, "payment_intent.succeeded", &payload)
        .await
        .unwrap();
    let second = db
        .webhooks()
        .receive(WebhookProvider::Stripe, &external_id, "payment_intent.succeeded", &payload)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.status, WebhookStatus::Received);

    db.webhooks().mark_failed(&first.id, "booking not found").await.unwrap();
    let failed = db.webhooks().get(&first.id).await.unwrap();
    assert_eq!(failed.status, WebhookStatus::Failed);
    assert_eq!(failed.attempts, 1);

    db.webhooks().mark_processed(&first.id).await.unwrap();
    let processed = db.webhooks().get(&first.id).await.unwrap();
    assert!(!processed.is_pending());
    assert!(processed.last_error.is_none());
}
