//! Fault injection flags.
//!
//! Chaos-testing switches are read through a [`FaultInjector`], which never
//! fails: any provider error evaluates to the flag's default. Providers:
//! - [`InMemoryFlags`]: set and cleared at runtime, used by tests and demos
//! - [`FlagdFileProvider`]: reads a flagd flag definition file on every
//!   evaluation, so edits take effect without a restart

pub mod error;
pub mod flagd;
pub mod injector;
pub mod memory;
pub mod provider;

pub use error::FlagError;
pub use flagd::FlagdFileProvider;
pub use injector::{FaultInjector, KAFKA_QUEUE_PROBLEMS, PAYMENT_UNREACHABLE};
pub use memory::InMemoryFlags;
pub use provider::{FlagProvider, FlagValue};
