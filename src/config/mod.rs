mod settings;

pub use settings::{Config, TransferConfig, EXAMPLE_CONFIG};
