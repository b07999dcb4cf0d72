use payhist_common::memo::{self, InvoiceMemo};
use payhist_common::payment::PaymentType;
use payhist_daemon::error::ReconcileError;
use payhist_daemon::notify::NotificationEvent;
use payhist_integration::harness::Harness;
use payhist_integration::{hash_hex, ROUTING_NODE, SHOP_NODE};

fn shop_memo(description: &str) -> String {
    memo::encode(&InvoiceMemo {
        description: description.to_string(),
        payee_name: "Corner Shop".to_string(),
        payee_image_url: "https://shop.example/logo.png".to_string(),
        ..Default::default()
    })
    .unwrap()
}

/// Record an outgoing payment the way a send would: request saved, ledger entry present.
fn sent_payment(h: &Harness, n: u8, destination: &str, description: &str, value: i64, date: i64) {
    let request = format!("lnbc{}", n);
    h.node
        .register_request(&request, n, destination, description, value, date - 1);
    h.store
        .save_payment_request(&hash_hex(n), &request)
        .unwrap();
    h.node.add_ledger_payment(n, value, date);
}

/// Payments to the routing node are withdrawals; everything else is a plain send.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn classifies_withdrawals_by_destination() {
    let mut h = Harness::new();
    sent_payment(&h, 1, ROUTING_NODE, &shop_memo("cash out"), 5_000, 1_000);
    sent_payment(&h, 2, SHOP_NODE, &shop_memo("coffee"), 300, 1_100);

    let report = h.history.sync().await.unwrap();
    assert_eq!(report.added, 2);
    assert_eq!(report.last_sent_payment_timestamp, 1_100);

    let mut payments = h.store.payments().unwrap();
    payments.sort_by_key(|p| p.creation_timestamp);
    assert_eq!(payments[0].payment_type, PaymentType::Withdrawal);
    assert_eq!(payments[0].amount, 5_000);
    assert_eq!(payments[0].destination, ROUTING_NODE);
    assert_eq!(payments[1].payment_type, PaymentType::Sent);
    assert_eq!(payments[1].description, "coffee");
    assert_eq!(payments[1].payee_name, "Corner Shop");
    assert_eq!(payments[1].payment_hash, hash_hex(2));

    let events = h.drain_events();
    assert_eq!(events, vec![NotificationEvent::AccountChanged]);
}

/// Running sync twice imports nothing the second time and stays quiet.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rerun_is_idempotent() {
    let mut h = Harness::new();
    sent_payment(&h, 1, SHOP_NODE, &shop_memo("bread"), 120, 2_000);

    assert_eq!(h.history.sync().await.unwrap().added, 1);
    h.drain_events();

    let report = h.history.sync().await.unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(report.last_sent_payment_timestamp, 2_000);
    assert_eq!(h.store.payments().unwrap().len(), 1);
    assert!(h.drain_events().is_empty());
}

/// A payment landing on the cursor's exact timestamp after a sync is still imported.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_timestamp_payment_is_not_dropped() {
    let h = Harness::new();
    sent_payment(&h, 1, SHOP_NODE, &shop_memo("first"), 100, 3_000);
    h.history.sync().await.unwrap();

    sent_payment(&h, 2, SHOP_NODE, &shop_memo("second"), 200, 3_000);
    let report = h.history.sync().await.unwrap();
    assert_eq!(report.added, 1);
    assert!(h.store.has_payment(&hash_hex(2)).unwrap());
    assert_eq!(h.store.payments().unwrap().len(), 2);
}

/// A failed lookup halfway through keeps what was imported and resumes later.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_mid_pass_keeps_earlier_records() {
    let mut h = Harness::new();
    sent_payment(&h, 1, SHOP_NODE, &shop_memo("one"), 100, 1_000);
    sent_payment(&h, 2, SHOP_NODE, &shop_memo("two"), 200, 2_000);
    h.node
        .state
        .lock()
        .failing_requests
        .insert("lnbc2".to_string());

    let err = h.history.sync().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Node(_)));
    assert!(h.store.has_payment(&hash_hex(1)).unwrap());
    assert!(!h.store.has_payment(&hash_hex(2)).unwrap());
    assert_eq!(h.store.cursor().unwrap().last_sent_payment_timestamp, 1_000);
    // The payment that did land is still announced.
    assert_eq!(h.drain_events(), vec![NotificationEvent::AccountChanged]);

    h.node.state.lock().failing_requests.clear();
    let report = h.history.sync().await.unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.last_sent_payment_timestamp, 2_000);
}

/// ListPayments failing leaves the store untouched.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ledger_failure_changes_nothing() {
    let h = Harness::new();
    sent_payment(&h, 1, SHOP_NODE, &shop_memo("one"), 100, 1_000);
    h.node.fail("ListPayments");

    assert!(h.history.sync().await.is_err());
    assert!(h.store.payments().unwrap().is_empty());
    assert_eq!(h.store.cursor().unwrap().last_sent_payment_timestamp, 0);
    assert_eq!(h.backups.count(), 0);
}

/// A ledger payment with no saved request is kept as a bare send.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn payment_without_saved_request() {
    let h = Harness::new();
    h.node.add_ledger_payment(7, 900, 4_000);

    let report = h.history.sync().await.unwrap();
    assert_eq!(report.added, 1);

    let payments = h.store.payments().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment_type, PaymentType::Sent);
    assert_eq!(payments[0].payment_hash, hash_hex(7));
    assert_eq!(payments[0].amount, 900);
    assert!(payments[0].description.is_empty());
    assert!(payments[0].destination.is_empty());
    assert_eq!(h.node.calls("DecodePayReq"), 0);
}

/// Requests written in the `description | name | image` form keep their fields.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn legacy_memo_is_split() {
    let h = Harness::new();
    sent_payment(
        &h,
        3,
        SHOP_NODE,
        "Two lattes | Corner Shop | https://shop.example/logo.png",
        640,
        5_000,
    );

    h.history.sync().await.unwrap();
    let payment = h.store.payments().unwrap().remove(0);
    assert_eq!(payment.description, "Two lattes");
    assert_eq!(payment.payee_name, "Corner Shop");
    assert_eq!(payment.payee_image_url, "https://shop.example/logo.png");
    assert_eq!(payment.amount, 640);
}

/// Unseen ledger entries are imported oldest first, whatever order the node lists them in.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn imports_in_timestamp_order() {
    let h = Harness::new();
    sent_payment(&h, 9, SHOP_NODE, &shop_memo("late"), 10, 9_000);
    sent_payment(&h, 8, SHOP_NODE, &shop_memo("early"), 10, 8_000);
    h.node
        .state
        .lock()
        .failing_requests
        .insert("lnbc9".to_string());

    assert!(h.history.sync().await.is_err());
    assert!(h.store.has_payment(&hash_hex(8)).unwrap());
    assert_eq!(h.store.cursor().unwrap().last_sent_payment_timestamp, 8_000);
}
