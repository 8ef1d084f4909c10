#[macro_use]
pub mod logging;

pub use logging::truncate_for_log;
