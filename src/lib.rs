//! uh-ring - Ultrahuman ring metrics in the terminal and in Prometheus
//!
//! uh-ring polls the Ultrahuman partner API, decodes its loosely-typed metric
//! envelopes into canonical records, and either renders them for a person or
//! forwards the numeric readings to a Prometheus remote-write endpoint:
//! fetch → decode (via the metric registry) → render | forward.
//!
//! ## Modules
//!
//! - **Decoding**: [`registry`], [`decoder`] and [`types`] turn API payloads into
//!   time-series, scalar and sleep records
//! - **Forwarding**: [`tracker`], [`forward`] and [`remote_write`] send each
//!   sample once, stamped with its original sensor time
//! - **Service**: [`client`], [`poller`] and [`server`] run the periodic
//!   fetch-and-forward loop with its status endpoints

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod forward;
pub mod logging;
pub mod poller;
pub mod registry;
pub mod remote_write;
pub mod render;
pub mod server;
pub mod tracker;
pub mod types;

pub use client::{MetricsSource, UltrahumanClient};
pub use error::{ConfigError, DecodeError, FetchError, TransportError};
pub use forward::{CommitPolicy, ForwardEncoder, ForwardPlan};
pub use poller::Poller;
pub use registry::{MetricRegistry, RegistryEntry};
pub use remote_write::{RemoteWriteClient, SampleSink};
pub use render::{Renderer, TextRenderer};
pub use tracker::TrackerState;

/// uh-ring version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
