//! Telemetry poller for EPEVER solar charge controllers over Modbus RTU.

pub mod config;
pub mod decode;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod reader;
pub mod registers;
pub mod retry;
pub mod snapshot;
pub mod status;
pub mod transport;

pub use config::Config;
pub use error::TransportError;
pub use metrics::MetricsRegistry;
pub use poller::{PollOptions, Poller};
pub use reader::{ConnectionState, RegisterReader};
pub use snapshot::TelemetrySnapshot;
