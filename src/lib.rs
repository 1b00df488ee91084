//! TCP/UDP connection snapshot for Solaris and illumos.
//!
//! The kernel publishes its connection tables only as MIB2 records behind a
//! STREAMS control device. [`snapshot::snapshot`] opens the device, pushes the
//! `tcp` and `udp` modules, asks for the current IP-level tables and decodes
//! every TCP4, TCP6, UDP4 and UDP6 entry into a [`model::ConnectionRecord`].
//!
//! Decoding and the reply drain are platform-independent and driven through
//! the [`snapshot::MessageChannel`] trait; only [`streams`] touches the device.

pub mod cli;
pub mod error;
pub mod mib2;
pub mod model;
pub mod output;
pub mod snapshot;
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub mod streams;
pub mod tpi;

pub use error::NatstatError;
pub use mib2::KernelCapabilities;
pub use model::{ConnectionRecord, ConnectionState, Protocol};
pub use snapshot::{DrainBudget, SnapshotConfig, snapshot};
