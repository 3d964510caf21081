// Swapchain - Window presentation
//
// Owns the presentable images, the render pass drawn into them, one depth
// buffer and framebuffer per image, and the per-slot sync objects.
// Rebuilding means dropping the whole thing and constructing a new one.

use ash::vk;
use std::sync::Arc;

use super::device::Device;
use super::sync::{FrameRing, FrameSync, MAX_FRAMES_IN_FLIGHT};
use super::{BackendError, BackendResult};

const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Prefer an 8-bit sRGB format in the sRGB non-linear color space, else the first one offered.
pub fn choose_swap_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            matches!(f.format, vk::Format::B8G8R8A8_SRGB | vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Use `preferred` if offered. FIFO is always supported.
pub fn choose_swap_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_swap_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    // u32::MAX means the surface size is decided by the swapchain
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// Width over height. A zero height counts as one so a minimized canvas
/// does not produce infinity.
pub fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    extent.width as f32 / extent.height.max(1) as f32
}

pub fn sharing_mode(graphics_family: u32, present_family: u32) -> vk::SharingMode {
    if graphics_family == present_family {
        vk::SharingMode::EXCLUSIVE
    } else {
        vk::SharingMode::CONCURRENT
    }
}

/// Attachment formats a render pass was built with. Pipelines made against
/// one render pass stay usable with another of the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassLayout {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
}

/// Result of asking for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    Ready { index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Destruction calls for everything a swapchain owns.
pub trait ReleaseHandles {
    fn destroy_image_view(&self, view: vk::ImageView);
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn destroy_image(&self, image: vk::Image);
    fn free_memory(&self, memory: vk::DeviceMemory);
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    fn destroy_fence(&self, fence: vk::Fence);
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
}

impl ReleaseHandles for Device {
    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }
    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }
    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }
    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }
    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }
    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepthAttachment {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl DepthAttachment {
    fn new(device: &Device, extent: vk::Extent2D, format: vk::Format) -> BackendResult<Self> {
        let (image, memory) = device.create_image(
            extent,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        match device.create_image_view(image, format, vk::ImageAspectFlags::DEPTH) {
            Ok(view) => Ok(Self { image, memory, view }),
            Err(e) => {
                device.destroy_image(image);
                device.free_memory(memory);
                Err(e)
            }
        }
    }
}

/// Every handle a swapchain created. Filled in step by step during
/// construction so a failure halfway can release exactly what exists.
#[derive(Debug, Default)]
pub struct SwapchainResources {
    pub image_views: Vec<vk::ImageView>,
    pub swapchain: vk::SwapchainKHR,
    pub depth_attachments: Vec<DepthAttachment>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub frame_syncs: Vec<FrameSync>,
    pub render_pass: vk::RenderPass,
}

impl SwapchainResources {
    /// Destroy everything, in dependency order. Calling it twice releases nothing the second time.
    pub fn release(&mut self, handles: &dyn ReleaseHandles) {
        for view in self.image_views.drain(..) {
            handles.destroy_image_view(view);
        }

        if self.swapchain != vk::SwapchainKHR::null() {
            handles.destroy_swapchain(std::mem::take(&mut self.swapchain));
        }

        for depth in self.depth_attachments.drain(..) {
            handles.destroy_image_view(depth.view);
            handles.destroy_image(depth.image);
            handles.free_memory(depth.memory);
        }

        for framebuffer in self.framebuffers.drain(..) {
            handles.destroy_framebuffer(framebuffer);
        }

        for sync in self.frame_syncs.drain(..) {
            handles.destroy_semaphore(sync.render_finished);
            handles.destroy_semaphore(sync.image_available);
            handles.destroy_fence(sync.in_flight_fence);
        }

        if self.render_pass != vk::RenderPass::null() {
            handles.destroy_render_pass(std::mem::take(&mut self.render_pass));
        }
    }
}

pub struct Swapchain {
    resources: SwapchainResources,
    images: Vec<vk::Image>,
    layout: RenderPassLayout,
    extent: vk::Extent2D,
    canvas_extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    frames: FrameRing,
    device: Arc<Device>,
}

impl Swapchain {
    pub fn new(
        device: Arc<Device>,
        canvas_extent: vk::Extent2D,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> BackendResult<Self> {
        let mut resources = SwapchainResources::default();

        match Self::build(&device, &mut resources, canvas_extent, preferred_present_mode) {
            Ok((images, layout, extent, present_mode)) => {
                log::info!(
                    "Created swapchain: {}x{}, {:?}, {:?}, {} images",
                    extent.width,
                    extent.height,
                    layout.color_format,
                    present_mode,
                    images.len()
                );
                let frames = FrameRing::new(images.len());
                Ok(Self {
                    resources,
                    images,
                    layout,
                    extent,
                    canvas_extent,
                    present_mode,
                    frames,
                    device,
                })
            }
            Err(e) => {
                resources.release(&*device);
                Err(e)
            }
        }
    }

    fn build(
        device: &Device,
        resources: &mut SwapchainResources,
        canvas_extent: vk::Extent2D,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> BackendResult<(Vec<vk::Image>, RenderPassLayout, vk::Extent2D, vk::PresentModeKHR)> {
        let support = device.get_swapchain_support()?;
        let capabilities = &support.capabilities;

        let surface_format = choose_swap_surface_format(&support.formats)
            .ok_or_else(|| BackendError::NoSupportedFormat(Vec::new()))?;
        let present_mode = choose_swap_present_mode(&support.present_modes, preferred_present_mode);
        let extent = choose_swap_extent(capabilities, canvas_extent);
        let image_count = choose_image_count(capabilities);

        let families = device.find_physical_queue_families()?;
        let graphics_family = families.graphics_family.unwrap_or(device.graphics_queue_family);
        let present_family = families.present_family.unwrap_or(device.present_queue_family);
        let family_indices = [graphics_family, present_family];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode(graphics_family, present_family))
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);
        if graphics_family != present_family {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        resources.swapchain = unsafe { device.swapchain_loader.create_swapchain(&create_info, None) }?;
        let images = unsafe { device.swapchain_loader.get_swapchain_images(resources.swapchain) }?;

        for &image in &images {
            let view = device.create_image_view(image, surface_format.format, vk::ImageAspectFlags::COLOR)?;
            resources.image_views.push(view);
        }

        let depth_format = device.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let layout = RenderPassLayout {
            color_format: surface_format.format,
            depth_format,
        };

        resources.render_pass = create_render_pass(device, layout)?;

        for _ in &images {
            resources
                .depth_attachments
                .push(DepthAttachment::new(device, extent, depth_format)?);
        }

        for (&color_view, depth) in resources.image_views.iter().zip(&resources.depth_attachments) {
            let attachments = [color_view, depth.view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(resources.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { device.device.create_framebuffer(&framebuffer_info, None) }?;
            resources.framebuffers.push(framebuffer);
        }

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            resources.frame_syncs.push(FrameSync::new(device)?);
        }

        Ok((images, layout, extent, present_mode))
    }

    /// Wait for the current slot's fence, then ask for the next image.
    ///
    /// The fence is reset at submit time, not here.
    pub fn acquire_next_image(&mut self) -> BackendResult<AcquiredImage> {
        let sync = self.resources.frame_syncs[self.frames.current()];

        unsafe {
            self.device
                .device
                .wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)?;
        }

        let result = unsafe {
            self.device.swapchain_loader.acquire_next_image(
                self.resources.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(AcquiredImage::Ready { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    /// Submit `command_buffer` for `image_index`, present it, and move to the next slot.
    pub fn submit_command_buffers(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> BackendResult<PresentStatus> {
        let sync = self.resources.frame_syncs[self.frames.current()];

        if let Some(previous) = self.frames.claim_image(image_index as usize, sync.in_flight_fence) {
            unsafe { self.device.device.wait_for_fences(&[previous], true, u64::MAX) }?;
        }

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.reset_fences(&[sync.in_flight_fence])?;
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight_fence,
            )?;
        }

        let swapchains = [self.resources.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.present_queue, &present_info)
        };

        self.frames.advance();

        match result {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The canvas size this swapchain was requested for.
    pub fn canvas_extent(&self) -> vk::Extent2D {
        self.canvas_extent
    }

    pub fn extent_aspect_ratio(&self) -> f32 {
        aspect_ratio(self.extent)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.resources.render_pass
    }

    pub fn layout(&self) -> RenderPassLayout {
        self.layout
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.resources.framebuffers[image_index as usize]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.resources.release(&*self.device);
    }
}

/// Color + depth render pass with a single subpass.
fn create_render_pass(device: &Device, layout: RenderPassLayout) -> BackendResult<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(layout.color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let depth_attachment = vk::AttachmentDescription::builder()
        .format(layout.depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let depth_attachment_ref = vk::AttachmentReference::builder()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = [color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)
        .depth_stencil_attachment(&depth_attachment_ref)
        .build();

    // Don't write color/depth before the previous use of the image is done
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .build();

    let attachments = [color_attachment, depth_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    Ok(unsafe { device.device.create_render_pass(&render_pass_info, None) }?)
}
