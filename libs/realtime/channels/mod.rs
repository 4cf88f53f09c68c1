//! Channel subscription bookkeeping

pub mod tracker;

pub use tracker::{Channel, ChannelSubscription, ChannelTracker};
