// ── Entity registry ──
//
// Single-writer mirror of the Miniserver configuration. The supervisor task
// owns the registry outright; everyone else reads published snapshots.

mod registry;
mod snapshot;
mod sync;

pub(crate) use registry::EntityRegistry;
pub use snapshot::RegistrySnapshot;
pub(crate) use sync::ConfigSynchronizer;
pub use sync::SyncReport;
