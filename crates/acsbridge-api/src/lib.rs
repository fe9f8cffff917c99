// acsbridge-api: async client for the ACS northbound interface (GenieACS NBI)

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{AcsClient, TaskOptions};
pub use error::Error;
pub use models::{FaultRecord, TaskReceipt, TaskRecord, TaskRequest};
pub use transport::{TlsMode, TransportConfig};
