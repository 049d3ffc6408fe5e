//! Built-in bus observers.
//!
//! Production observers (the dashboard's real-time transport) subscribe to
//! the [`LogBus`](crate::LogBus) directly; this module only carries the
//! stdout [`LogWriter`] used by demos and local debugging.

mod log;

pub use log::LogWriter;
