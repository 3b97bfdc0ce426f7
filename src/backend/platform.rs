// Driver boundary - instance-level Vulkan entry points
//
// The bootstrapper talks to the driver through the VulkanApi trait so its
// logic can be exercised against a mock that never touches a real loader.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::{extensions::ext::DebugUtils, vk, Entry};

use super::error::BootstrapError;

/// Instance extension that exposes the debug messenger entry points.
pub const DEBUG_UTILS_EXTENSION: &str = "VK_EXT_debug_utils";

/// Application metadata plus the layer and extension sets requested at
/// instance creation.
#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub app_name: String,
    pub layers: Vec<String>,
    pub extensions: Vec<String>,
}

/// Instance-level surface of the graphics driver.
///
/// Handle types are associated so the production implementation can hand out
/// real `ash` objects while tests count plain integers.
pub trait VulkanApi {
    type Instance;
    type Messenger;

    fn enumerate_layers(&self) -> Result<Vec<String>, BootstrapError>;
    fn enumerate_extensions(&self) -> Result<Vec<String>, BootstrapError>;

    fn create_instance(&self, desc: &InstanceDesc) -> Result<Self::Instance, BootstrapError>;
    fn destroy_instance(&self, instance: Self::Instance);

    /// Registers a debug messenger on the instance. Fails with
    /// `ERROR_EXTENSION_NOT_PRESENT` when the dynamically resolved
    /// debug-utils entry points are absent.
    fn create_messenger(
        &self,
        instance: &Self::Instance,
    ) -> Result<Self::Messenger, BootstrapError>;

    /// Unregisters a debug messenger. Never fails.
    fn destroy_messenger(&self, instance: &Self::Instance, messenger: Self::Messenger);
}

/// Production implementation backed by the system Vulkan loader.
pub struct AshApi {
    entry: Entry,
}

impl AshApi {
    pub fn load() -> Result<Self, BootstrapError> {
        let entry = unsafe { Entry::load() }?;
        Ok(Self { entry })
    }

    /// The debug-utils functions are extension entry points, resolved by
    /// name at runtime. `None` means the capability is absent on this
    /// instance rather than an error.
    fn debug_utils(&self, instance: &ash::Instance) -> Option<DebugUtils> {
        let create_fn = unsafe {
            (self.entry.static_fn().get_instance_proc_addr)(
                instance.handle(),
                c"vkCreateDebugUtilsMessengerEXT".as_ptr(),
            )
        };
        create_fn.map(|_| DebugUtils::new(&self.entry, instance))
    }
}

impl VulkanApi for AshApi {
    type Instance = ash::Instance;
    type Messenger = (DebugUtils, vk::DebugUtilsMessengerEXT);

    fn enumerate_layers(&self) -> Result<Vec<String>, BootstrapError> {
        let layers = self
            .entry
            .enumerate_instance_layer_properties()
            .map_err(|result| BootstrapError::Platform {
                call: "vkEnumerateInstanceLayerProperties",
                result,
            })?;
        Ok(layers
            .iter()
            .map(|layer| fixed_cstr_to_string(&layer.layer_name))
            .collect())
    }

    fn enumerate_extensions(&self) -> Result<Vec<String>, BootstrapError> {
        let extensions = self
            .entry
            .enumerate_instance_extension_properties(None)
            .map_err(|result| BootstrapError::Platform {
                call: "vkEnumerateInstanceExtensionProperties",
                result,
            })?;
        Ok(extensions
            .iter()
            .map(|ext| fixed_cstr_to_string(&ext.extension_name))
            .collect())
    }

    fn create_instance(&self, desc: &InstanceDesc) -> Result<ash::Instance, BootstrapError> {
        let app_name = CString::new(desc.app_name.as_str())?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let layer_names = desc
            .layers
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let extension_names = desc
            .extensions
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }.map_err(
            |result| BootstrapError::Platform {
                call: "vkCreateInstance",
                result,
            },
        )?;

        Ok(instance)
    }

    fn destroy_instance(&self, instance: ash::Instance) {
        unsafe { instance.destroy_instance(None) };
    }

    fn create_messenger(
        &self,
        instance: &ash::Instance,
    ) -> Result<Self::Messenger, BootstrapError> {
        let Some(debug_utils) = self.debug_utils(instance) else {
            return Err(BootstrapError::Platform {
                call: "vkCreateDebugUtilsMessengerEXT",
                result: vk::Result::ERROR_EXTENSION_NOT_PRESENT,
            });
        };

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(|result| BootstrapError::Platform {
                call: "vkCreateDebugUtilsMessengerEXT",
                result,
            })?;

        Ok((debug_utils, messenger))
    }

    fn destroy_messenger(&self, _instance: &ash::Instance, messenger: Self::Messenger) {
        // The loader was resolved when the messenger was created, so the
        // destroy entry point is guaranteed to exist here.
        let (debug_utils, handle) = messenger;
        unsafe { debug_utils.destroy_debug_utils_messenger(handle, None) };
    }
}

/// Converts a raw extension-name list, as handed out by the windowing
/// layer, into owned strings.
pub fn extension_names(raw: &[*const c_char]) -> Vec<String> {
    raw.iter()
        .map(|&name| {
            unsafe { CStr::from_ptr(name) }
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

/// Converts a fixed-size NUL-terminated name from a Vulkan properties struct.
fn fixed_cstr_to_string(raw: &[c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

// Debug callback for validation layers. Severity below warning is registered
// out, so everything that arrives here lands on the error stream via log.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_names_from_raw_pointer_list() {
        let raw = [c"VK_KHR_surface".as_ptr(), c"VK_KHR_xcb_surface".as_ptr()];
        assert_eq!(
            extension_names(&raw),
            ["VK_KHR_surface", "VK_KHR_xcb_surface"]
        );
    }

    #[test]
    fn extension_names_empty_list() {
        assert!(extension_names(&[]).is_empty());
    }
}
