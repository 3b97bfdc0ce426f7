// Error taxonomy for instance bootstrap
//
// Two fatal kinds: configuration problems caught before any API resource
// exists (missing validation layers), and platform failures reported by the
// loader or driver. Nothing here is retried; everything propagates to main.

use ash::vk;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Requested validation layer(s) are not installed on this system.
    /// Raised before the instance is created.
    #[error("validation layers requested, but not available: {missing:?}")]
    MissingLayers { missing: Vec<String> },

    /// The Vulkan shared library could not be loaded.
    #[error("failed to load the Vulkan library")]
    Library(#[from] ash::LoadingError),

    /// A name destined for the driver contained an interior NUL byte.
    #[error("invalid string in instance metadata")]
    InvalidString(#[from] std::ffi::NulError),

    /// A driver call failed. Covers instance creation, enumeration, and
    /// debug-messenger setup (including ERROR_EXTENSION_NOT_PRESENT when the
    /// debug-utils entry points cannot be resolved).
    #[error("{call} failed: {result}")]
    Platform {
        call: &'static str,
        result: vk::Result,
    },
}
