// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with optional validation layers
// - Presentation surface for the canvas
// - Physical device selection (first GPU that can draw and present)
// - Logical device + graphics/present queues
// - Command pool and one-shot command submission
//
// Teardown order: command pool, logical device, then (via `InstanceContext`)
// surface, debug messenger, instance.

use ash::extensions::{ext::DebugUtils, khr};
use ash::{vk, Entry};
use std::ffi::{CStr, CString};
use std::sync::Arc;

use super::surface::{self, GraphicsCanvas};
use super::{BackendError, BackendResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

static QUEUE_PRIORITY: [f32; 1] = [1.0];

/// Whether the Khronos validation layer and debug messenger are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Disabled,
    Enabled,
}

/// Startup configuration for `Device::new`.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub app_name: String,
    pub validation: Validation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.families().is_some()
    }

    /// (graphics, present) once both are known.
    pub fn families(&self) -> Option<(u32, u32)> {
        self.graphics_family.zip(self.present_family)
    }

    /// Walk the queue families until both a graphics and a present family are found.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> BackendResult<bool>,
    ) -> BackendResult<Self> {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics_family = Some(index);
            }
            if supports_present(index)? {
                indices.present_family = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }
}

/// Surface capabilities of one physical device. Queried fresh every time.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// One queue create info per distinct family.
pub fn queue_create_infos(graphics_family: u32, present_family: u32) -> Vec<vk::DeviceQueueCreateInfo> {
    let mut families = vec![graphics_family];
    if present_family != graphics_family {
        families.push(present_family);
    }

    families
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITY)
                .build()
        })
        .collect()
}

/// Whether `name` is among the instance layers the loader reports.
pub fn has_layer(layers: &[vk::LayerProperties], name: &CStr) -> bool {
    layers.iter().any(|layer| {
        // SAFETY: layer_name is a NUL-terminated fixed array filled by the loader
        (unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }) == name
    })
}

/// Names in `required` that are absent from `available`.
pub fn missing_extensions(required: &[&CStr], available: &[vk::ExtensionProperties]) -> Vec<String> {
    required
        .iter()
        .filter(|name| {
            !available.iter().any(|ext| {
                // SAFETY: extension_name is a NUL-terminated fixed array filled by the driver
                (unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }) == **name
            })
        })
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

pub fn is_device_suitable(
    indices: &QueueFamilyIndices,
    extensions_supported: bool,
    swapchain_adequate: bool,
    features: &vk::PhysicalDeviceFeatures,
) -> bool {
    indices.is_complete()
        && extensions_supported
        && swapchain_adequate
        && features.sampler_anisotropy == vk::TRUE
}

/// First candidate whose tiling features cover `features`.
pub fn select_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    mut properties_of: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> BackendResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let props = properties_of(format);
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or_else(|| BackendError::NoSupportedFormat(candidates.to_vec()))
}

fn required_device_extensions() -> Vec<&'static CStr> {
    vec![khr::Swapchain::name()]
}

/// Instance-level objects. Dropped after the logical device.
struct InstanceContext {
    surface: vk::SurfaceKHR,
    surface_loader: khr::Surface,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    entry: Entry,
}

impl InstanceContext {
    fn new(
        entry: Entry,
        config: &DeviceConfig,
        display: raw_window_handle::RawDisplayHandle,
    ) -> BackendResult<Self> {
        let validation = config.validation == Validation::Enabled;

        if validation && !Self::validation_layer_available(&entry)? {
            return Err(BackendError::ValidationUnavailable(
                VALIDATION_LAYER.to_string_lossy().into_owned(),
            ));
        }

        let mut extensions = surface::required_instance_extensions(display)?;
        if validation {
            extensions.push(DebugUtils::name());
        }

        let available = entry.enumerate_instance_extension_properties(None)?;
        if let Some(missing) = missing_extensions(&extensions, &available).into_iter().next() {
            return Err(BackendError::MissingRequiredExtension(missing));
        }

        let app_name = CString::new(config.app_name.as_str())
            .unwrap_or_else(|_| CString::from(c"canvas-renderer"));
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let extension_names: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
        let layer_names = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        // Also covers messages emitted during vkCreateInstance itself
        let mut debug_info = debug_messenger_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);
        if validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }?;

        let debug_utils = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = unsafe {
                debug_utils.create_debug_utils_messenger(&debug_messenger_info(), None)
            };
            match messenger {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let surface_loader = khr::Surface::new(&entry, &instance);

        Ok(Self {
            surface: vk::SurfaceKHR::null(),
            surface_loader,
            debug_utils,
            instance,
            entry,
        })
    }

    fn validation_layer_available(entry: &Entry) -> BackendResult<bool> {
        let layers = entry.enumerate_instance_layer_properties()?;
        Ok(has_layer(&layers, VALIDATION_LAYER))
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Vulkan device wrapper with automatic cleanup
pub struct Device {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub swapchain_loader: khr::Swapchain,

    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,

    pub command_pool: vk::CommandPool,

    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    // Must drop after the logical device
    context: InstanceContext,
}

impl Device {
    /// Create the instance, surface, logical device and command pool for `canvas`.
    pub fn new(config: &DeviceConfig, canvas: &dyn GraphicsCanvas) -> BackendResult<Arc<Self>> {
        log::info!(
            "Creating Vulkan device: {} (validation {:?})",
            config.app_name,
            config.validation
        );

        let entry = unsafe { Entry::load() }?;
        let (display, window) = canvas.native_handles()?;

        let mut context = InstanceContext::new(entry, config, display)?;
        context.surface =
            unsafe { surface::create_surface(&context.entry, &context.instance, display, window) }?;

        let (physical_device, graphics_family, present_family) = Self::pick_physical_device(&context)?;

        let device = Self::create_logical_device(&context.instance, physical_device, graphics_family, present_family)?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = match unsafe { device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let swapchain_loader = khr::Swapchain::new(&context.instance, &device);

        let properties = unsafe { context.instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { context.instance.get_physical_device_memory_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::info!(
            "Queue families: graphics {}, present {}",
            graphics_family,
            present_family
        );

        Ok(Arc::new(Self {
            device,
            physical_device,
            swapchain_loader,
            graphics_queue,
            present_queue,
            graphics_queue_family: graphics_family,
            present_queue_family: present_family,
            command_pool,
            memory_properties,
            context,
        }))
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.context.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.context.surface
    }

    fn pick_physical_device(
        context: &InstanceContext,
    ) -> BackendResult<(vk::PhysicalDevice, u32, u32)> {
        let devices = unsafe { context.instance.enumerate_physical_devices() }?;

        for &device in &devices {
            let indices = Self::queue_families_of(context, device)?;

            let available = unsafe { context.instance.enumerate_device_extension_properties(device) }?;
            let extensions_supported = missing_extensions(&required_device_extensions(), &available).is_empty();

            let swapchain_adequate =
                extensions_supported && Self::swapchain_support_of(context, device)?.is_adequate();

            let features = unsafe { context.instance.get_physical_device_features(device) };

            if is_device_suitable(&indices, extensions_supported, swapchain_adequate, &features) {
                if let Some((graphics, present)) = indices.families() {
                    return Ok((device, graphics, present));
                }
            }

            let props = unsafe { context.instance.get_physical_device_properties(device) };
            log::debug!(
                "Skipping unsuitable GPU: {}",
                unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy()
            );
        }

        Err(BackendError::NoSuitableDevice(devices.len()))
    }

    fn queue_families_of(
        context: &InstanceContext,
        device: vk::PhysicalDevice,
    ) -> BackendResult<QueueFamilyIndices> {
        let families =
            unsafe { context.instance.get_physical_device_queue_family_properties(device) };
        QueueFamilyIndices::find(&families, |index| unsafe {
            context
                .surface_loader
                .get_physical_device_surface_support(device, index, context.surface)
                .map_err(BackendError::from)
        })
    }

    fn swapchain_support_of(
        context: &InstanceContext,
        device: vk::PhysicalDevice,
    ) -> BackendResult<SwapchainSupportDetails> {
        let loader = &context.surface_loader;
        unsafe {
            Ok(SwapchainSupportDetails {
                capabilities: loader.get_physical_device_surface_capabilities(device, context.surface)?,
                formats: loader.get_physical_device_surface_formats(device, context.surface)?,
                present_modes: loader.get_physical_device_surface_present_modes(device, context.surface)?,
            })
        }
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_family: u32,
        present_family: u32,
    ) -> BackendResult<ash::Device> {
        let queue_infos = queue_create_infos(graphics_family, present_family);
        let extensions: Vec<_> = required_device_extensions().iter().map(|n| n.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;
        Ok(device)
    }

    /// Capabilities can change (e.g. the window moved to another monitor),
    /// so this always asks the driver again.
    pub fn get_swapchain_support(&self) -> BackendResult<SwapchainSupportDetails> {
        Self::swapchain_support_of(&self.context, self.physical_device)
    }

    pub fn find_physical_queue_families(&self) -> BackendResult<QueueFamilyIndices> {
        Self::queue_families_of(&self.context, self.physical_device)
    }

    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> BackendResult<vk::Format> {
        select_supported_format(candidates, tiling, features, |format| unsafe {
            self.instance()
                .get_physical_device_format_properties(self.physical_device, format)
        })
    }

    /// Record and run a throwaway command buffer, blocking until the queue is idle.
    pub fn submit_one_shot(&self, record: impl FnOnce(vk::CommandBuffer)) -> BackendResult<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }?;

        let result = (|| -> BackendResult<()> {
            let cmd = command_buffers[0];
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe { self.device.begin_command_buffer(cmd, &begin_info) }?;
            record(cmd);
            unsafe {
                self.device.end_command_buffer(cmd)?;
                let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                self.device
                    .queue_submit(self.graphics_queue, &[submit_info.build()], vk::Fence::null())?;
                self.device.queue_wait_idle(self.graphics_queue)?;
            }
            Ok(())
        })();

        unsafe {
            self.device.free_command_buffers(self.command_pool, &command_buffers);
        }
        result
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> BackendResult<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
        }
        // `context` drops next: surface, messenger, instance
    }
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// Tag for a debug message. Validation wins over performance when both are set.
fn message_kind(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "VALIDATION"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "PERFORMANCE"
    } else {
        "GENERAL"
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    let kind = message_kind(message_type);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan {}] {}", kind, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan {}] {}", kind, message);
        }
        _ => {
            log::debug!("[Vulkan {}] {}", kind, message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = *src as std::ffi::c_char;
        }
        props
    }

    #[test]
    fn distinct_families_get_two_queue_infos() {
        let infos = queue_create_infos(0, 1);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].queue_family_index, 0);
        assert_eq!(infos[1].queue_family_index, 1);
        assert!(infos.iter().all(|info| info.queue_count == 1));
    }

    #[test]
    fn shared_family_gets_one_queue_info() {
        let infos = queue_create_infos(2, 2);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 2);
    }

    #[test]
    fn finds_separate_graphics_and_present_families() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let indices = QueueFamilyIndices::find(&families, |index| Ok(index == 1)).unwrap();
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn stops_at_first_family_doing_both() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut asked = Vec::new();
        let indices = QueueFamilyIndices::find(&families, |index| {
            asked.push(index);
            Ok(true)
        })
        .unwrap();
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(0));
        assert_eq!(asked, vec![0]);
    }

    #[test]
    fn incomplete_without_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = QueueFamilyIndices::find(&families, |_| Ok(false)).unwrap();
        assert!(!indices.is_complete());
    }

    #[test]
    fn reports_missing_extensions() {
        let available = [extension(khr::Swapchain::name())];
        assert!(missing_extensions(&[khr::Swapchain::name()], &available).is_empty());

        let missing = missing_extensions(&[khr::Swapchain::name(), DebugUtils::name()], &available);
        assert_eq!(missing, vec!["VK_EXT_debug_utils".to_string()]);
    }

    #[test]
    fn finds_validation_layer_by_name() {
        let mut layer = vk::LayerProperties::default();
        for (dst, src) in layer.layer_name.iter_mut().zip(VALIDATION_LAYER.to_bytes()) {
            *dst = *src as std::ffi::c_char;
        }
        assert!(has_layer(&[vk::LayerProperties::default(), layer], VALIDATION_LAYER));
        assert!(!has_layer(&[vk::LayerProperties::default()], VALIDATION_LAYER));
        assert!(!has_layer(&[], VALIDATION_LAYER));
    }

    #[test]
    fn families_need_both_graphics_and_present() {
        let both = QueueFamilyIndices {
            graphics_family: Some(1),
            present_family: Some(2),
        };
        assert_eq!(both.families(), Some((1, 2)));

        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(1),
            present_family: None,
        };
        assert_eq!(graphics_only.families(), None);
        assert_eq!(QueueFamilyIndices::default().families(), None);
    }

    #[test]
    fn message_kind_checks_flags_not_equality() {
        use ash::vk::DebugUtilsMessageTypeFlagsEXT as Type;
        assert_eq!(message_kind(Type::VALIDATION), "VALIDATION");
        assert_eq!(message_kind(Type::VALIDATION | Type::PERFORMANCE), "VALIDATION");
        assert_eq!(message_kind(Type::GENERAL | Type::PERFORMANCE), "PERFORMANCE");
        assert_eq!(message_kind(Type::GENERAL), "GENERAL");
        assert_eq!(message_kind(Type::empty()), "GENERAL");
    }

    #[test]
    fn suitability_requires_anisotropy() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        let mut features = vk::PhysicalDeviceFeatures::default();
        assert!(!is_device_suitable(&indices, true, true, &features));

        features.sampler_anisotropy = vk::TRUE;
        assert!(is_device_suitable(&indices, true, true, &features));
        assert!(!is_device_suitable(&indices, false, true, &features));
        assert!(!is_device_suitable(&indices, true, false, &features));
        assert!(!is_device_suitable(&QueueFamilyIndices::default(), true, true, &features));
    }

    #[test]
    fn swapchain_support_needs_formats_and_modes() {
        let mut details = SwapchainSupportDetails::default();
        assert!(!details.is_adequate());
        details.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!details.is_adequate());
        details.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(details.is_adequate());
    }

    #[test]
    fn picks_first_format_with_matching_tiling() {
        let candidates = [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ];
        let format = select_supported_format(
            &candidates,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| {
                if format == vk::Format::D32_SFLOAT {
                    // Only linear support, so it must be skipped for OPTIMAL
                    vk::FormatProperties {
                        linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
                        ..Default::default()
                    }
                } else {
                    vk::FormatProperties {
                        optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
                            | vk::FormatFeatureFlags::SAMPLED_IMAGE,
                        ..Default::default()
                    }
                }
            },
        )
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT_S8_UINT);
    }

    #[test]
    fn no_supported_format_is_an_error() {
        let result = select_supported_format(
            &[vk::Format::D32_SFLOAT],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties::default(),
        );
        assert!(matches!(result, Err(BackendError::NoSupportedFormat(_))));
    }
}
