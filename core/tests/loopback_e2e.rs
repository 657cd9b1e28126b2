use std::sync::{Arc, Mutex};
use std::time::Duration;

use pushlink_core::platform::loopback::LoopbackHost;
use pushlink_core::{
    Messenger, MessengerConfig, Payload, PushlinkError, RoleKind, Topic, WorkerActivationState,
};
use serde_json::json;
use tokio::sync::oneshot;

fn count(messenger: &Messenger, topic: Topic) -> Arc<Mutex<u32>> {
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    messenger.on(topic, move |_| *sink.lock().unwrap() += 1);
    hits
}

fn page_for(host: &LoopbackHost, url: &str) -> (Messenger, Arc<pushlink_core::platform::loopback::LoopbackPage>) {
    let handle = host.open_page(url);
    let messenger = Messenger::for_page(
        handle.clone(),
        Arc::new(handle.activation_context()),
        MessengerConfig::default(),
    );
    (messenger, handle)
}

#[tokio::test]
async fn worker_unicast_without_target_is_rejected() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    let (page, _) = page_for(&host, "https://example.com");
    host.activate(WorkerActivationState::WorkerA);
    host.claim_clients();
    page.listen(false).await.unwrap();
    let hits = count(&page, Topic::RedirectPage);

    let err = worker
        .unicast(Topic::RedirectPage, json!("https://example.com/inbox"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PushlinkError::InvalidArgument(_)));
    assert_eq!(*hits.lock().unwrap(), 0);
    assert_eq!(worker.stats().sent, 0);
}

#[tokio::test]
async fn worker_unicast_reaches_only_target() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    let (page_a, handle_a) = page_for(&host, "https://example.com/a");
    let (page_b, _) = page_for(&host, "https://example.com/b");
    host.activate(WorkerActivationState::WorkerA);
    host.claim_clients();
    page_a.listen(false).await.unwrap();
    page_b.listen(false).await.unwrap();
    let hits_a = count(&page_a, Topic::RedirectPage);
    let hits_b = count(&page_b, Topic::RedirectPage);

    let target = handle_a.client_handle().expect("page is open");
    worker
        .unicast(Topic::RedirectPage, json!("/a/inbox"), Some(&target))
        .await
        .unwrap();

    assert_eq!(*hits_a.lock().unwrap(), 1);
    assert_eq!(*hits_b.lock().unwrap(), 0);
}

#[tokio::test]
async fn broadcast_can_skip_uncontrolled_clients() {
    let host = LoopbackHost::new();
    let (controlled, _) = page_for(&host, "https://example.com/old-tab");
    host.activate(WorkerActivationState::WorkerA);
    host.claim_clients();
    // Hard reload: the tab loads without a controller.
    let reloaded = host.open_uncontrolled_page("https://example.com/new-tab");
    let fresh = Messenger::for_page(
        reloaded.clone(),
        Arc::new(reloaded.activation_context()),
        MessengerConfig::default(),
    );

    controlled.listen(false).await.unwrap();
    fresh.listen(true).await.unwrap();
    let controlled_hits = count(&controlled, Topic::NotificationDismissed);
    let fresh_hits = count(&fresh, Topic::NotificationDismissed);

    let strict = Messenger::for_worker(
        host.worker(),
        MessengerConfig {
            include_uncontrolled_clients: false,
            log_payloads: true,
        },
    );
    let posted = strict
        .broadcast(Topic::NotificationDismissed, json!({"id": "n-3"}))
        .await
        .unwrap();
    assert_eq!(posted, 1);
    assert_eq!(*fresh_hits.lock().unwrap(), 0);

    let inclusive = Messenger::for_worker(
        host.worker(),
        MessengerConfig {
            include_uncontrolled_clients: true,
            log_payloads: false,
        },
    );
    let posted = inclusive
        .broadcast(Topic::NotificationDismissed, json!({"id": "n-3"}))
        .await
        .unwrap();
    assert_eq!(posted, 2);
    assert_eq!(*controlled_hits.lock().unwrap(), 2);
    assert_eq!(*fresh_hits.lock().unwrap(), 1);
    assert_eq!(inclusive.stats().sent, 2);
}

#[tokio::test]
async fn broadcast_from_page_is_skipped() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    worker.listen(false).await.unwrap();
    let hits = count(&worker, Topic::NotificationClicked);
    let (page, _) = page_for(&host, "https://example.com");
    host.activate(WorkerActivationState::WorkerA);
    host.claim_clients();

    assert_eq!(page.role(), RoleKind::Page);
    let posted = page
        .broadcast(Topic::NotificationClicked, json!({"id": "n-1"}))
        .await
        .unwrap();

    assert_eq!(posted, 0);
    assert_eq!(*hits.lock().unwrap(), 0);
}

#[tokio::test]
async fn version_query_round_trip() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    let (page, _) = page_for(&host, "https://example.com");
    worker.listen(false).await.unwrap();

    {
        let replier = worker.clone();
        worker.on(Topic::WorkerVersion, move |_| {
            let replier = replier.clone();
            tokio::spawn(async move {
                let _ = replier
                    .broadcast(Topic::WorkerVersion, json!("151500"))
                    .await;
            });
        });
    }

    let (tx, rx) = oneshot::channel::<Payload>();
    let tx = Mutex::new(Some(tx));
    page.once(Topic::WorkerVersion, move |p| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(p.clone());
        }
    });

    host.activate(WorkerActivationState::WorkerA);
    host.claim_clients();
    page.listen(false).await.unwrap();
    page.unicast(Topic::WorkerVersion, Payload::Null, None)
        .await
        .unwrap();

    let version = tokio::time::timeout(Duration::from_millis(500), rx)
        .await
        .expect("timeout")
        .expect("reply dropped");
    assert_eq!(version, json!("151500"));
    assert_eq!(page.registry().listener_count(Topic::WorkerVersion), 0);
}

#[tokio::test]
async fn page_opened_after_activation_can_unicast() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    worker.listen(false).await.unwrap();
    let hits = count(&worker, Topic::WorkerVersion);
    host.activate(WorkerActivationState::WorkerA);
    host.claim_clients();

    let (late, handle) = page_for(&host, "https://example.com/late");
    assert!(handle.is_controlled());
    assert!(late.is_worker_controlling_page().await.unwrap());

    tokio::time::timeout(
        Duration::from_millis(100),
        late.unicast(Topic::WorkerVersion, Payload::Null, None),
    )
    .await
    .expect("gate should be open")
    .unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn unicast_between_activate_and_claim_waits_for_claim() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    worker.listen(false).await.unwrap();
    let hits = count(&worker, Topic::Subscribe);
    let (page, _) = page_for(&host, "https://example.com");

    host.activate(WorkerActivationState::WorkerA);
    assert!(!page.is_worker_controlling_page().await.unwrap());

    let sender = page.clone();
    let pending = tokio::spawn(async move {
        sender.unicast(Topic::Subscribe, Payload::Null, None).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished(), "activation alone must not open the page gate");
    assert_eq!(*hits.lock().unwrap(), 0);

    host.claim_clients();
    pending.await.unwrap().unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn broadcast_fails_when_a_client_closes_midway() {
    let host = LoopbackHost::new();
    let worker = Messenger::for_worker(host.worker(), MessengerConfig::default());
    host.activate(WorkerActivationState::WorkerA);
    let (first, _) = page_for(&host, "https://example.com/first");
    let (second, second_handle) = page_for(&host, "https://example.com/second");
    first.listen(false).await.unwrap();
    second.listen(false).await.unwrap();
    let second_hits = count(&second, Topic::NotificationDisplayed);

    // The first client's listener closes the second tab while the
    // broadcast is still walking the client list.
    {
        let host = host.clone();
        let handle = Arc::clone(&second_handle);
        first.on(Topic::NotificationDisplayed, move |_| host.close_page(&handle));
    }

    let err = worker
        .broadcast(Topic::NotificationDisplayed, json!({"id": "n-9"}))
        .await
        .unwrap_err();

    assert!(matches!(err, PushlinkError::Platform(_)));
    assert_eq!(*second_hits.lock().unwrap(), 0);
    assert_eq!(worker.stats().sent, 0);
}
