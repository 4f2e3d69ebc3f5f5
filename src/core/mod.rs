// ─── Bedrock Switcher Core ───
// Keeps exactly one Minecraft Bedrock version registered with the OS and
// survives crashes at any point of the swap.
//
// Architecture:
//   core/
//     version/    — Semantic versions, channels, remote catalog
//     layout      — On-disk naming under the versions root
//     lock        — Per-version install markers
//     downloader/ — Streaming archive fetcher
//     archive/    — Two-pass zip extraction with exclusions
//     registrar/  — OS package registry (AppX) + polling
//     state/      — Installation oracle + persisted settings
//     lifecycle/  — ensure_active state machine
//     progress    — Status / progress sinks

pub mod archive;
pub mod downloader;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod lock;
pub mod progress;
pub mod registrar;
pub mod state;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;
