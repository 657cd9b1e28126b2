mod config;
use config::DemoConfig;
use pushlink_core::platform::loopback::LoopbackHost;
use pushlink_core::{Messenger, Payload, Topic};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pushlink_core::telemetry::init_logging("info,pushlink=debug,page_worker=info");

    info!(
        target = "page_worker",
        "Starting page/worker demo: listen → activate → version query → notification → redirect"
    );

    let cfg = DemoConfig::load();
    let host = LoopbackHost::new();

    // 1) Worker side: listen right away, answer version queries by broadcast
    let worker = Messenger::for_worker(host.worker(), cfg.messenger.clone());
    worker.listen(false).await?;
    {
        let replier = worker.clone();
        let version = cfg.worker_version.clone();
        worker.on(Topic::WorkerVersion, move |_| {
            let replier = replier.clone();
            let version = version.clone();
            tokio::spawn(async move {
                if let Err(e) = replier.broadcast(Topic::WorkerVersion, json!(version)).await {
                    warn!(target = "page_worker", error = %e, "Version reply failed");
                }
            });
        });
    }

    // 2) Page side: one messenger per tab, all waiting for a controller
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<(usize, Payload)>();
    let mut pages = Vec::new();
    let mut pending = Vec::new();
    for (idx, url) in cfg.pages.iter().enumerate() {
        let handle = host.open_page(url.clone());
        let page = Messenger::for_page(
            handle.clone(),
            Arc::new(handle.activation_context()),
            cfg.messenger.clone(),
        );

        let tx = reply_tx.clone();
        page.once(Topic::WorkerVersion, move |p| {
            let _ = tx.send((idx, p.clone()));
        });
        page.on(Topic::NotificationDisplayed, move |p| {
            info!(target = "page_worker", page = idx, payload = %p, "Notification displayed");
        });
        page.once(Topic::RedirectPage, move |p| {
            info!(target = "page_worker", page = idx, url = %p, "Redirect requested");
        });

        let waiter = page.clone();
        pending.push(tokio::spawn(async move {
            waiter.listen(false).await?;
            waiter
                .unicast(Topic::WorkerVersion, Payload::Null, None)
                .await
        }));
        pages.push((page, handle));
    }
    drop(reply_tx);

    // 3) Worker activates and claims the open tabs
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(target = "page_worker", generation = ?cfg.generation, "Activating worker");
    host.activate(cfg.generation);
    host.claim_clients();

    for task in pending {
        task.await??;
    }

    // 4) Each page hears the version once
    let mut replies = 0;
    while replies < pages.len() {
        match tokio::time::timeout(Duration::from_secs(1), reply_rx.recv()).await {
            Ok(Some((idx, version))) => {
                info!(target = "page_worker", page = idx, %version, "Worker version received");
                replies += 1;
            }
            Ok(None) => break,
            Err(_) => {
                warn!(target = "page_worker", replies, "Timed out waiting for version replies");
                break;
            }
        }
    }

    // 5) Notification lifecycle broadcast and a targeted redirect
    let posted = worker
        .broadcast(
            Topic::NotificationDisplayed,
            json!({"id": "demo-notification", "title": "Hello from the worker"}),
        )
        .await?;
    info!(target = "page_worker", posted, "Notification broadcast");

    if let Some(client) = pages.first().and_then(|(_, handle)| handle.client_handle()) {
        worker
            .unicast(Topic::RedirectPage, json!(cfg.redirect_url), Some(&client))
            .await?;
    }

    // Let spawned replies drain before reporting
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(
        target = "page_worker",
        stats = %serde_json::to_string(&worker.stats())?,
        "Worker messenger stats"
    );
    for (idx, (page, _)) in pages.iter().enumerate() {
        info!(
            target = "page_worker",
            page = idx,
            stats = %serde_json::to_string(&page.stats())?,
            "Page messenger stats"
        );
    }

    Ok(())
}
