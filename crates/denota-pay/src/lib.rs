//! Service shell around the `settlement` core: environment configuration,
//! provider bootstrap, webhook delivery and prometheus metrics.

pub mod bootstrap;
pub mod config;
pub mod hmac;
pub mod metrics;
pub mod webhook;

pub use bootstrap::{bootstrap, PayOrchestrator, PayService};
pub use config::{InvoiceRequest, PayConfig};
