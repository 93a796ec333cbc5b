//! Arguments and runtime options

mod args;
mod options;

pub use args::AppArgs;
pub use options::{RuntimeOptions, WaitMode};
