//! Configuration schema types for the mesh.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod capture;
mod relay;
mod session;
mod signaling;
mod system;

pub use capture::*;
pub use relay::*;
pub use session::*;
pub use signaling::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct MeshConfig {
    pub signaling: SignalingConfig,
    pub capture: CaptureConfig,
    pub session: SessionConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}
