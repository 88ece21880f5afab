//! # Lumen Client
//!
//! Watch-and-sync uploader for the Lumen media vault. Monitors a local
//! folder, waits for new files to settle, and delivers them to the server
//! over HTTP multipart. A local [`ledger::DeliveryLedger`] remembers what
//! was already uploaded so restarts never re-send old files.

pub mod config;
pub mod delivery;
pub mod ledger;
pub mod queue;
pub mod watch;

pub use config::ClientConfig;
pub use delivery::{Delivery, DeliveryError, HttpDelivery};
pub use ledger::DeliveryLedger;
pub use queue::UploadQueue;
pub use watch::FolderMonitor;
