pub mod shutdown;
pub mod startup;

pub use shutdown::shutdown;
pub use startup::{StartupContext, effective_config, prepare_startup};
