mod common;

use booking_reconciler::application::reconciler::PaymentReconciler;
use booking_reconciler::domain::payment::{ChannelMessage, PaymentStatus};
use booking_reconciler::infrastructure::scripted::{ChannelStep, ScriptedConnector, ScriptedGateway};
use common::CountingStore;
use rand::Rng;
use std::sync::atomic::Ordering;
use tokio::sync::oneshot;

#[tokio::test(start_paused = true)]
async fn test_flood_of_unrelated_frames_does_not_disturb_the_attempt() {
    let mut rng = rand::thread_rng();

    // A noisy shared relay: results for a hundred other checkouts, some of
    // them failures, before ours finally shows up.
    let mut steps = Vec::new();
    for _ in 0..100 {
        let id = format!("CO-{}", rng.gen_range(0..u32::MAX));
        if rng.gen_bool(0.3) {
            steps.push(ChannelStep::deliver(ChannelMessage::declined(
                &id,
                1032,
                "Request cancelled by user",
            )));
        } else {
            steps.push(ChannelStep::deliver(ChannelMessage::success(&id)));
        }
    }
    steps.push(ChannelStep::deliver(ChannelMessage::success("OURS")));

    let (store, persist_calls) = CountingStore::new();
    let reconciler = PaymentReconciler::new(
        Box::new(ScriptedGateway::acking("OURS")),
        Box::new(ScriptedConnector::new(vec![steps])),
        Box::new(store),
        common::fast_config(),
    );

    let (_cancel, cancel_rx) = oneshot::channel();
    let report = reconciler.reconcile(common::order("busy.co.ke"), cancel_rx).await;

    assert_eq!(report.request.status, PaymentStatus::Confirmed);
    assert_eq!(persist_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_disconnects_eventually_recover() {
    // Four flappy connections before one that delivers.
    let mut connections = Vec::new();
    for _ in 0..4 {
        connections.push(vec![ChannelStep::close_after(std::time::Duration::from_millis(5))]);
    }
    connections.push(vec![ChannelStep::deliver(ChannelMessage::success("CO-FLAP"))]);

    let (store, persist_calls) = CountingStore::new();
    let connector = ScriptedConnector::new(connections);
    let subscriptions = connector.subscription_log();
    let reconciler = PaymentReconciler::new(
        Box::new(ScriptedGateway::acking("CO-FLAP")),
        Box::new(connector),
        Box::new(store),
        common::fast_config(),
    );

    let (_cancel, cancel_rx) = oneshot::channel();
    let report = reconciler.reconcile(common::order("flappy.ke"), cancel_rx).await;

    assert_eq!(report.request.status, PaymentStatus::Confirmed);
    assert_eq!(persist_calls.load(Ordering::SeqCst), 1);
    assert_eq!(subscriptions.lock().unwrap().len(), 5);
}
