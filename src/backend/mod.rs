// Backend module - Vulkan instance bootstrap
//
// Design: thin trait boundary over ash so the bootstrap logic can be tested
// against a mock driver, no Vulkan loader required

pub mod bootstrap;
pub mod error;
pub mod platform;

pub use bootstrap::{BootstrapConfig, Bootstrapper};
pub use platform::{extension_names, AshApi};
