pub mod orchestrator;

pub use orchestrator::{ActivationReport, InstalledVersion, VersionSwitcher, PROXY_ARTIFACT_NAME};
