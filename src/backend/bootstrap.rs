// Instance bootstrap - layer check, extension assembly, debug messenger
//
// Owns the instance and messenger handles. Drop releases the messenger
// strictly before the instance, whichever way startup ended.

use super::error::BootstrapError;
use super::platform::{InstanceDesc, VulkanApi, DEBUG_UTILS_EXTENSION};

/// Bootstrap settings, passed in explicitly so tests can pin down the layer
/// set without touching global state.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Application name reported in the instance metadata
    pub app_name: String,
    /// Request validation layers and a debug messenger
    pub enable_validation: bool,
    /// Layers to request when validation is enabled
    pub validation_layers: Vec<String>,
}

/// The window system's required extensions, plus the debug-utils extension
/// when validation is enabled.
pub fn required_extensions(window_extensions: &[String], enable_validation: bool) -> Vec<String> {
    let mut extensions = window_extensions.to_vec();
    if enable_validation {
        extensions.push(DEBUG_UTILS_EXTENSION.to_string());
    }
    extensions
}

/// Brings up a Vulkan instance and tears it down again.
///
/// Holding a `Bootstrapper` means the instance exists; dropping it destroys
/// the messenger (if attached) and then the instance. Re-initialization
/// requires a fresh value.
pub struct Bootstrapper<A: VulkanApi> {
    api: A,
    config: BootstrapConfig,
    // Both are Some until drop; Option only so Drop can move them out
    instance: Option<A::Instance>,
    messenger: Option<A::Messenger>,
}

impl<A: VulkanApi> Bootstrapper<A> {
    /// Creates the instance.
    ///
    /// `window_extensions` is the window system's required instance
    /// extension list, queried from the windowing layer at startup.
    ///
    /// Fails with [`BootstrapError::MissingLayers`] before anything is
    /// created if validation is enabled and a requested layer is absent, or
    /// with [`BootstrapError::Platform`] if the driver rejects the
    /// instance-creation call.
    pub fn initialize(
        api: A,
        config: BootstrapConfig,
        window_extensions: &[String],
    ) -> Result<Self, BootstrapError> {
        if config.enable_validation {
            let available = api.enumerate_layers()?;
            let missing: Vec<String> = config
                .validation_layers
                .iter()
                .filter(|requested| !available.contains(requested))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BootstrapError::MissingLayers { missing });
            }
        }

        let available = api.enumerate_extensions()?;
        log::info!("available extensions:");
        for name in &available {
            log::info!("\t{name}");
        }

        let extensions = required_extensions(window_extensions, config.enable_validation);
        log::info!("required extensions:");
        for name in &extensions {
            log::info!("\t{name}");
        }
        // Informational only; the driver call below is the arbiter
        if extensions.iter().all(|name| available.contains(name)) {
            log::info!("all required extensions available");
        } else {
            log::warn!("not all required extensions available");
        }

        let layers = if config.enable_validation {
            config.validation_layers.clone()
        } else {
            Vec::new()
        };

        let desc = InstanceDesc {
            app_name: config.app_name.clone(),
            layers,
            extensions,
        };
        let instance = api.create_instance(&desc)?;
        log::info!("Vulkan instance created");

        Ok(Self {
            api,
            config,
            instance: Some(instance),
            messenger: None,
        })
    }

    /// Registers the validation-layer debug messenger. Does nothing when
    /// validation is disabled.
    ///
    /// On failure the instance stays owned by `self`, so teardown ordering
    /// still holds for the early-error exit.
    pub fn setup_debug_messenger(&mut self) -> Result<(), BootstrapError> {
        if !self.config.enable_validation || self.messenger.is_some() {
            return Ok(());
        }
        if let Some(instance) = self.instance.as_ref() {
            self.messenger = Some(self.api.create_messenger(instance)?);
            log::info!("Debug messenger attached");
        }
        Ok(())
    }
}

impl<A: VulkanApi> Drop for Bootstrapper<A> {
    fn drop(&mut self) {
        // Messenger first: its lifetime is nested inside the instance's
        if let Some(instance) = self.instance.take() {
            if let Some(messenger) = self.messenger.take() {
                self.api.destroy_messenger(&instance, messenger);
            }
            self.api.destroy_instance(instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use ash::vk;

    use super::*;

    #[derive(Default)]
    struct Ledger {
        instances_created: usize,
        instances_destroyed: usize,
        messengers_created: usize,
        messengers_destroyed: usize,
        events: Vec<&'static str>,
    }

    /// Counting stand-in for the driver. Rejects instance creation when a
    /// requested extension is not in its available set, like a real loader.
    #[derive(Clone)]
    struct MockApi {
        layers: Vec<String>,
        extensions: Vec<String>,
        fail_messenger: bool,
        ledger: Rc<RefCell<Ledger>>,
    }

    impl MockApi {
        fn new(layers: &[&str], extensions: &[&str]) -> Self {
            Self {
                layers: layers.iter().map(|s| s.to_string()).collect(),
                extensions: extensions.iter().map(|s| s.to_string()).collect(),
                fail_messenger: false,
                ledger: Rc::default(),
            }
        }
    }

    impl VulkanApi for MockApi {
        type Instance = u64;
        type Messenger = u64;

        fn enumerate_layers(&self) -> Result<Vec<String>, BootstrapError> {
            Ok(self.layers.clone())
        }

        fn enumerate_extensions(&self) -> Result<Vec<String>, BootstrapError> {
            Ok(self.extensions.clone())
        }

        fn create_instance(&self, desc: &InstanceDesc) -> Result<u64, BootstrapError> {
            if desc
                .extensions
                .iter()
                .any(|ext| !self.extensions.contains(ext))
            {
                return Err(BootstrapError::Platform {
                    call: "vkCreateInstance",
                    result: vk::Result::ERROR_EXTENSION_NOT_PRESENT,
                });
            }
            let mut ledger = self.ledger.borrow_mut();
            ledger.instances_created += 1;
            ledger.events.push("create_instance");
            Ok(ledger.instances_created as u64)
        }

        fn destroy_instance(&self, _instance: u64) {
            let mut ledger = self.ledger.borrow_mut();
            ledger.instances_destroyed += 1;
            ledger.events.push("destroy_instance");
        }

        fn create_messenger(&self, _instance: &u64) -> Result<u64, BootstrapError> {
            if self.fail_messenger {
                return Err(BootstrapError::Platform {
                    call: "vkCreateDebugUtilsMessengerEXT",
                    result: vk::Result::ERROR_EXTENSION_NOT_PRESENT,
                });
            }
            let mut ledger = self.ledger.borrow_mut();
            ledger.messengers_created += 1;
            ledger.events.push("create_messenger");
            Ok(ledger.messengers_created as u64)
        }

        fn destroy_messenger(&self, _instance: &u64, _messenger: u64) {
            let mut ledger = self.ledger.borrow_mut();
            ledger.messengers_destroyed += 1;
            ledger.events.push("destroy_messenger");
        }
    }

    fn config(enable_validation: bool) -> BootstrapConfig {
        BootstrapConfig {
            app_name: "test-app".to_string(),
            enable_validation,
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
        }
    }

    fn window_extensions() -> Vec<String> {
        vec!["VK_KHR_surface".to_string()]
    }

    #[test]
    fn missing_layer_fails_before_instance_creation() {
        let api = MockApi::new(&[], &["VK_KHR_surface", "VK_EXT_debug_utils"]);
        let ledger = api.ledger.clone();

        let err = Bootstrapper::initialize(api, config(true), &window_extensions())
            .err()
            .expect("initialize should fail");

        assert!(matches!(err, BootstrapError::MissingLayers { ref missing }
            if missing == &["VK_LAYER_KHRONOS_validation"]));
        assert_eq!(ledger.borrow().instances_created, 0);
    }

    #[test]
    fn validation_disabled_requests_only_window_extensions() {
        assert_eq!(
            required_extensions(&window_extensions(), false),
            window_extensions()
        );
        assert_eq!(
            required_extensions(&window_extensions(), true),
            ["VK_KHR_surface", "VK_EXT_debug_utils"]
        );
    }

    #[test]
    fn validation_disabled_skips_messenger() {
        // No layers installed at all; must not matter with validation off
        let api = MockApi::new(&[], &["VK_KHR_surface"]);
        let ledger = api.ledger.clone();

        let mut bootstrap =
            Bootstrapper::initialize(api, config(false), &window_extensions()).unwrap();
        bootstrap.setup_debug_messenger().unwrap();
        drop(bootstrap);

        let ledger = ledger.borrow();
        assert_eq!(ledger.messengers_created, 0);
        assert_eq!(ledger.events, ["create_instance", "destroy_instance"]);
    }

    #[test]
    fn zero_available_extensions_is_a_platform_error() {
        let api = MockApi::new(&["VK_LAYER_KHRONOS_validation"], &[]);
        let ledger = api.ledger.clone();

        let err = Bootstrapper::initialize(api, config(true), &window_extensions())
            .err()
            .expect("initialize should fail");

        match err {
            BootstrapError::Platform { call, result } => {
                assert_eq!(call, "vkCreateInstance");
                assert_eq!(result, vk::Result::ERROR_EXTENSION_NOT_PRESENT);
            }
            other => panic!("unexpected error: {other}"),
        }
        let ledger = ledger.borrow();
        assert_eq!(ledger.instances_created, 0);
        assert_eq!(ledger.instances_destroyed, 0);
    }

    #[test]
    fn teardown_destroys_messenger_before_instance() {
        let api = MockApi::new(
            &["VK_LAYER_KHRONOS_validation"],
            &["VK_KHR_surface", "VK_EXT_debug_utils"],
        );
        let ledger = api.ledger.clone();

        let mut bootstrap =
            Bootstrapper::initialize(api, config(true), &window_extensions()).unwrap();
        bootstrap.setup_debug_messenger().unwrap();
        drop(bootstrap);

        let ledger = ledger.borrow();
        assert_eq!(
            ledger.events,
            [
                "create_instance",
                "create_messenger",
                "destroy_messenger",
                "destroy_instance",
            ]
        );
        assert_eq!(ledger.instances_created, ledger.instances_destroyed);
        assert_eq!(ledger.messengers_created, ledger.messengers_destroyed);
    }

    #[test]
    fn messenger_failure_still_releases_instance() {
        let mut api = MockApi::new(
            &["VK_LAYER_KHRONOS_validation"],
            &["VK_KHR_surface", "VK_EXT_debug_utils"],
        );
        api.fail_messenger = true;
        let ledger = api.ledger.clone();

        let mut bootstrap =
            Bootstrapper::initialize(api, config(true), &window_extensions()).unwrap();
        let result = bootstrap.setup_debug_messenger();
        assert!(matches!(result, Err(BootstrapError::Platform { .. })));
        drop(bootstrap);

        let ledger = ledger.borrow();
        assert_eq!(ledger.instances_destroyed, 1);
        assert_eq!(ledger.messengers_created, 0);
        assert_eq!(ledger.messengers_destroyed, 0);
    }

    #[test]
    fn repeated_cycles_do_not_leak() {
        let api = MockApi::new(
            &["VK_LAYER_KHRONOS_validation"],
            &["VK_KHR_surface", "VK_EXT_debug_utils"],
        );
        let ledger = api.ledger.clone();

        for _ in 0..5 {
            let mut bootstrap =
                Bootstrapper::initialize(api.clone(), config(true), &window_extensions()).unwrap();
            bootstrap.setup_debug_messenger().unwrap();
        }

        let ledger = ledger.borrow();
        assert_eq!(ledger.instances_created, 5);
        assert_eq!(ledger.instances_destroyed, 5);
        assert_eq!(ledger.messengers_created, 5);
        assert_eq!(ledger.messengers_destroyed, 5);
    }

    #[test]
    fn setup_debug_messenger_is_idempotent() {
        let api = MockApi::new(
            &["VK_LAYER_KHRONOS_validation"],
            &["VK_KHR_surface", "VK_EXT_debug_utils"],
        );
        let ledger = api.ledger.clone();

        let mut bootstrap =
            Bootstrapper::initialize(api, config(true), &window_extensions()).unwrap();
        bootstrap.setup_debug_messenger().unwrap();
        bootstrap.setup_debug_messenger().unwrap();
        drop(bootstrap);

        let ledger = ledger.borrow();
        assert_eq!(ledger.messengers_created, 1);
        assert_eq!(ledger.messengers_destroyed, 1);
    }
}
