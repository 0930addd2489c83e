//! End-to-end demo of feeding a progress tree from a background task.

use std::time::Duration;

use opwatch_bridge::channel;
use opwatch_core::{ScopeSpec, Watcher};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    println!("=== Opwatch Background Report Demo ===\n");

    let watcher = Watcher::new();
    let base = watcher.begin(2, "syncing")?;
    println!("[OK] Watching a base scope of {} steps\n", base.all_steps());

    // Step 1: a download reported from a spawned task
    let reporter = base.reporter(ScopeSpec::default().with_status("downloading"))?;
    let (sender, relay) = channel(reporter);

    let producer = tokio::spawn(async move {
        for tenths in 1..=10u32 {
            sender.report(f64::from(tenths) / 10.0);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    relay.run().await;
    producer.await?;
    println!(
        "[OK] Download finished: aggregate={:.2} status={:?}\n",
        watcher.aggregate_progress(),
        watcher.status()
    );

    // Step 2: plain synchronous work on the base scope
    base.set_status("installing");
    base.advance(1)?;
    println!(
        "[OK] Install finished: aggregate={:.2} completed={}\n",
        watcher.aggregate_progress(),
        base.is_completed()
    );

    println!("Snapshot: {:?}\n", watcher.snapshot());

    base.dispose();
    println!("[OK] Base scope disposed, watcher reset\n");

    println!("=== Event Log ===");
    for event in watcher.drain_events() {
        println!("  {}", event);
    }

    Ok(())
}
