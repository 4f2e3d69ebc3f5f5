pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{LauncherError, LauncherResult, Stage};
pub use crate::core::lifecycle::{ActivationReport, InstalledVersion, VersionSwitcher};
pub use crate::core::progress::{
    ChannelSink, LifecycleEvent, NoopSink, Progress, StatusCallbacks, StatusSink,
};
pub use crate::core::state::SwitcherConfig;
pub use crate::core::version::{Channel, SemVersion, Version, VersionCatalog};

/// Install the `tracing` subscriber. `RUST_LOG` wins over the built-in filter.
pub fn init_tracing() {
    // A host application may already have installed one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bedrock_switcher=debug")),
        )
        .try_init();

    tracing::debug!("Bedrock switcher core {} ready", env!("CARGO_PKG_VERSION"));
}
