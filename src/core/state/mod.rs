pub mod config;
pub mod oracle;

pub use config::{default_data_dir, SwitcherConfig, SETTINGS_FILE};
pub use oracle::StateOracle;
