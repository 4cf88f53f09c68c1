//! Order desk - Main Library
//!
//! Thin host crate around the realtime connection layer.
//!
//! ## Architecture
//!
//! - **realtime**: Connection manager, event bus, channel tracking and
//!   lifecycle adapter (re-exported from workspace)
//! - **bin_common**: Common utilities for binary executables (CLI, runners, shutdown)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use orderdesk::bin_common::{load_realtime_config, ConfigType};
//! use orderdesk::realtime::{RealtimeAdapter, ChannelTracker};
//! ```

// Re-export workspace libraries for convenience
pub use realtime;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables
    //!
    //! Configuration lookup, the runner trait and Ctrl+C handling shared
    //! by every binary.

    pub mod cli;
    pub mod runner;
    pub mod shutdown;

    pub use cli::{load_config_from_env, load_realtime_config, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
    pub use shutdown::ShutdownManager;
}
