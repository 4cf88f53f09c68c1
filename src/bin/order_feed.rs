//! Tail the order and kitchen streams of one restaurant
//!
//! Usage: `order_feed <restaurant-id>` (or `RESTAURANT_ID` in the environment)

use anyhow::{bail, Result};
use orderdesk::bin_common::{
    load_realtime_config, parse_args, BinaryRunner, RunConfig, ShutdownManager,
};
use realtime::{
    init_tracing, AdapterOptions, ChannelTracker, ConnectionManager, EventBus, NotificationKind,
    OrderCallbacks, RealtimeAdapter,
};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

struct OrderFeedApp {
    run_config: RunConfig,
    adapter: RealtimeAdapter,
    restaurant_id: String,
    shutdown: ShutdownManager,
}

impl OrderFeedApp {
    fn new(adapter: RealtimeAdapter, restaurant_id: String) -> Self {
        Self {
            run_config: RunConfig::new(format!("Order feed [{}]", restaurant_id))
                .with_status_interval(60),
            adapter,
            restaurant_id,
            shutdown: ShutdownManager::new(),
        }
    }

    fn order_callbacks() -> OrderCallbacks {
        OrderCallbacks::new()
            .on_created(|order| {
                info!("New order {} ({})", order.order_id, status_label(&order.status));
            })
            .on_updated(|order| {
                info!("Order {} updated", order.order_id);
            })
            .on_status_changed(|order| {
                info!("Order {} is now {}", order.order_id, status_label(&order.status));
            })
    }
}

impl BinaryRunner for OrderFeedApp {
    async fn run(&mut self) -> Result<()> {
        self.shutdown.spawn_signal_handler();

        let activation = self.adapter.activate();
        let orders = self
            .adapter
            .watch_orders(&self.restaurant_id, Self::order_callbacks());
        let kitchen = self.adapter.watch_kitchen(&self.restaurant_id, |note| match note.kind {
            NotificationKind::Error => error!("Kitchen: {}", note.message),
            NotificationKind::Warning => warn!("Kitchen: {}", note.message),
            _ => info!("Kitchen: {}", note.message),
        });

        let status_interval = Duration::from_secs(self.run_config.status_interval_secs);
        let mut last_status = Instant::now();

        while self.shutdown.is_running() {
            if last_status.elapsed() >= status_interval {
                let view = activation.view();
                match view.error {
                    Some(err) if !view.is_connected => warn!("Status: offline ({})", err),
                    _ => info!(
                        "Status: connected={} connecting={}",
                        view.is_connected, view.is_connecting
                    ),
                }
                last_status = Instant::now();
            }

            self.shutdown
                .interruptible_sleep(Duration::from_secs(1))
                .await;
        }

        orders.close();
        kitchen.close();
        activation.deactivate();
        self.adapter.manager().disconnect();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        let metrics = self.adapter.manager().metrics();
        Some(format!(
            "Frames sent: {}, received: {}, reconnects: {}",
            metrics.messages_sent, metrics.messages_received, metrics.reconnect_count
        ))
    }
}

fn status_label(status: &Option<realtime::OrderStatus>) -> &str {
    status.as_ref().map_or("unknown", |status| status.as_str())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let config = load_realtime_config()?;
    init_tracing(config.debug);
    config.log();

    let restaurant_id = match parse_args().into_iter().next() {
        Some(id) => id,
        None => match std::env::var("RESTAURANT_ID") {
            Ok(id) => id,
            Err(_) => bail!("usage: order_feed <restaurant-id>"),
        },
    };

    let manager = ConnectionManager::new(config, EventBus::new());
    let adapter = RealtimeAdapter::new(ChannelTracker::new(manager), AdapterOptions::default());

    let mut app = OrderFeedApp::new(adapter, restaurant_id);
    app.execute().await
}
