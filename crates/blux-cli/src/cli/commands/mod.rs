use super::args::*;

pub mod dispatch;
pub(crate) mod receipt;
pub(crate) mod replay;
pub(crate) mod snapshot;

pub use dispatch::dispatch;
