//! Integration tests for channel subscriptions across reconnects

mod common;

use common::*;
use realtime::*;
use serde_json::{json, Value};
use std::time::Duration;

fn control(link: &MockLink, event: &str) -> Vec<Value> {
    let mut channels: Vec<Value> = link
        .sent_events()
        .into_iter()
        .filter(|(name, _)| name == event)
        .map(|(_, data)| data)
        .collect();
    channels.sort_by_key(|data| data["channel"].as_str().unwrap_or_default().to_string());
    channels
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_while_disconnected_is_sent_on_connect() {
    verbose_println!("Testing channel intent recorded before connect...");

    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());

    let _orders = tracker.subscribe(Channel::orders("r1"));
    assert_eq!(connector.open_count(), 0);

    manager.connect().await.unwrap();
    settle().await;

    assert_eq!(
        connector.last_link().sent_events(),
        vec![(
            events::SUBSCRIBE.to_string(),
            json!({ "channel": "orders:r1" })
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_channels_reasserted_once_per_reconnect() {
    verbose_println!("Testing re-subscription after reconnect...");

    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());
    let _orders = tracker.subscribe(Channel::orders("r1"));
    let _kitchen = tracker.subscribe(Channel::kitchen("r1"));

    manager.connect().await.unwrap();
    settle().await;

    for round in 1..=2 {
        connector.last_link().close();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.link_count(), round + 1);

        let link = connector.last_link();
        assert_eq!(
            control(&link, events::SUBSCRIBE),
            vec![
                json!({ "channel": "kitchen:r1" }),
                json!({ "channel": "orders:r1" })
            ],
            "round {}",
            round
        );
    }
}

#[tokio::test]
async fn test_subscribe_while_connected_is_sent_immediately() {
    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());
    manager.connect().await.unwrap();

    let _kitchen = tracker.subscribe(Channel::kitchen("r9"));
    settle().await;

    let link = connector.last_link();
    assert_eq!(control(&link, events::SUBSCRIBE), vec![json!({ "channel": "kitchen:r9" })]);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_while_disconnected_prevents_reassertion() {
    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());
    let orders = tracker.subscribe(Channel::orders("r1"));

    manager.connect().await.unwrap();
    connector.last_link().close();
    settle().await;
    assert!(!manager.is_connected());

    // Released during backoff: nothing to send now, nothing to re-assert later
    orders.unsubscribe();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(manager.is_connected());
    let link = connector.last_link();
    assert!(link.sent_events().is_empty());
    assert!(tracker.desired_channels().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_while_connected_tells_server() {
    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());
    manager.connect().await.unwrap();

    let orders = tracker.subscribe(Channel::orders("r1"));
    orders.unsubscribe();
    settle().await;

    let link = connector.last_link();
    assert_eq!(
        link.sent_events(),
        vec![
            (events::SUBSCRIBE.to_string(), json!({ "channel": "orders:r1" })),
            (events::UNSUBSCRIBE.to_string(), json!({ "channel": "orders:r1" })),
        ]
    );
}

#[tokio::test]
async fn test_shared_channel_sends_control_on_edges_only() {
    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());
    manager.connect().await.unwrap();

    let first = tracker.subscribe(Channel::orders("r1"));
    let second = tracker.subscribe(Channel::orders("r1"));
    first.unsubscribe();
    settle().await;

    let link = connector.last_link();
    assert_eq!(control(&link, events::SUBSCRIBE).len(), 1);
    assert!(control(&link, events::UNSUBSCRIBE).is_empty());

    second.unsubscribe();
    settle().await;
    assert_eq!(control(&link, events::UNSUBSCRIBE).len(), 1);
}

#[tokio::test]
async fn test_explicit_disconnect_keeps_desired_set() {
    let (connector, manager) = mock_manager(mock_config(100, 3));
    let tracker = ChannelTracker::new(manager.clone());
    let _orders = tracker.subscribe(Channel::orders("r1"));

    manager.connect().await.unwrap();
    manager.disconnect();
    manager.connect().await.unwrap();
    settle().await;

    assert_eq!(connector.link_count(), 2);
    assert_eq!(
        control(&connector.link(1), events::SUBSCRIBE),
        vec![json!({ "channel": "orders:r1" })]
    );
}
