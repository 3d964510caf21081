// Render - frame orchestration
//
// Owns the swapchain and one primary command buffer per swapchain image.
// A frame is: begin_frame -> begin_swapchain_render_pass -> draw ->
// end_swapchain_render_pass -> end_frame.

use ash::vk;
use std::sync::Arc;

use super::device::Device;
use super::surface::GraphicsCanvas;
use super::swapchain::{self, AcquiredImage, PresentStatus, Swapchain};
use super::{BackendError, BackendResult};

/// Dark gray
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.17, 0.17, 0.17, 1.0];

#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub clear_color: [f32; 4],
    /// Used when the surface offers it, FIFO otherwise.
    pub present_mode: vk::PresentModeKHR,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
            present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

fn is_zero_area(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Whether the swapchain should be rebuilt after presenting.
fn needs_recreation(status: PresentStatus, canvas_extent: vk::Extent2D, built_for: vk::Extent2D) -> bool {
    status != PresentStatus::Presented || canvas_extent != built_for
}

fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ]
}

fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

pub struct Render {
    command_buffers: Vec<vk::CommandBuffer>,
    swapchain: Option<Swapchain>,
    current_image_index: u32,
    frame_started: bool,
    render_pass_changed: bool,
    settings: RenderSettings,
    canvas: Arc<dyn GraphicsCanvas>,
    device: Arc<Device>,
}

impl Render {
    /// Build the swapchain for the canvas's current size. A minimized canvas
    /// gets its swapchain on the first frame it has an area again.
    pub fn new(
        device: Arc<Device>,
        canvas: Arc<dyn GraphicsCanvas>,
        settings: RenderSettings,
    ) -> BackendResult<Self> {
        let mut render = Self {
            command_buffers: Vec::new(),
            swapchain: None,
            current_image_index: 0,
            frame_started: false,
            render_pass_changed: false,
            settings,
            canvas,
            device,
        };
        render.recreate_swapchain()?;
        Ok(render)
    }

    /// Acquire the next image and start recording into its command buffer.
    ///
    /// `None` means skip this frame: the canvas is minimized, or the
    /// swapchain was out of date and has just been rebuilt.
    pub fn begin_frame(&mut self) -> BackendResult<Option<vk::CommandBuffer>> {
        debug_assert!(!self.frame_started, "begin_frame called while a frame is in progress");

        if is_zero_area(self.canvas.extent()) {
            return Ok(None);
        }
        if self.swapchain.is_none() {
            self.recreate_swapchain()?;
        }

        let swapchain = self.swapchain.as_mut().ok_or(BackendError::SwapchainUnavailable)?;
        let image_index = match swapchain.acquire_next_image()? {
            AcquiredImage::Ready { index, .. } => index,
            AcquiredImage::OutOfDate => {
                self.recreate_swapchain()?;
                return Ok(None);
            }
        };

        self.current_image_index = image_index;
        let command_buffer = self.command_buffers[image_index as usize];

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe { self.device.device.begin_command_buffer(command_buffer, &begin_info) }?;

        self.frame_started = true;
        Ok(Some(command_buffer))
    }

    /// Finish recording, submit and present. Rebuilds the swapchain when the
    /// surface went stale or the canvas changed size.
    pub fn end_frame(&mut self) -> BackendResult<()> {
        debug_assert!(self.frame_started, "end_frame called without begin_frame");

        let command_buffer = self.current_command_buffer();
        self.frame_started = false;
        unsafe { self.device.device.end_command_buffer(command_buffer) }?;

        let swapchain = self.swapchain.as_mut().ok_or(BackendError::SwapchainUnavailable)?;
        let status = swapchain.submit_command_buffers(command_buffer, self.current_image_index)?;

        if needs_recreation(status, self.canvas.extent(), swapchain.canvas_extent()) {
            log::debug!("Swapchain stale after present ({:?})", status);
            self.recreate_swapchain()?;
        }
        Ok(())
    }

    pub fn begin_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) -> BackendResult<()> {
        debug_assert!(self.frame_started, "render pass begun outside a frame");
        debug_assert!(
            command_buffer == self.current_command_buffer(),
            "command buffer belongs to a different frame"
        );

        let swapchain = self.swapchain.as_ref().ok_or(BackendError::SwapchainUnavailable)?;
        let extent = swapchain.extent();
        let clear_values = clear_values(self.settings.clear_color);

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(swapchain.render_pass())
            .framebuffer(swapchain.framebuffer(self.current_image_index))
            .render_area(full_scissor(extent))
            .clear_values(&clear_values);

        unsafe {
            let device = &self.device.device;
            device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(command_buffer, 0, &[full_viewport(extent)]);
            device.cmd_set_scissor(command_buffer, 0, &[full_scissor(extent)]);
        }
        Ok(())
    }

    pub fn end_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        debug_assert!(self.frame_started, "render pass ended outside a frame");
        debug_assert!(
            command_buffer == self.current_command_buffer(),
            "command buffer belongs to a different frame"
        );

        unsafe { self.device.device.cmd_end_render_pass(command_buffer) };
    }

    /// Wait for the GPU, drop the old swapchain and build one sized to the canvas.
    ///
    /// Flags a render pass change when the attachment formats differ from
    /// the previous swapchain's, and reallocates command buffers when the
    /// image count changed.
    pub fn recreate_swapchain(&mut self) -> BackendResult<()> {
        let extent = self.canvas.extent();
        if is_zero_area(extent) {
            return Ok(());
        }

        self.device.wait_idle()?;

        let old_layout = self.swapchain.as_ref().map(Swapchain::layout);
        // Only one swapchain per surface
        self.swapchain = None;

        let swapchain = Swapchain::new(self.device.clone(), extent, self.settings.present_mode)?;

        if old_layout != Some(swapchain.layout()) {
            if old_layout.is_some() {
                log::info!("Render pass layout changed: {:?}", swapchain.layout());
            }
            self.render_pass_changed = true;
        }

        log::info!(
            "Swapchain ready: {}x{}, aspect {:.3}, {:?}",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.extent_aspect_ratio(),
            swapchain.present_mode()
        );

        if swapchain.image_count() != self.command_buffers.len() {
            self.allocate_command_buffers(swapchain.image_count())?;
        }

        self.swapchain = Some(swapchain);
        Ok(())
    }

    fn allocate_command_buffers(&mut self, count: usize) -> BackendResult<()> {
        self.free_command_buffers();

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.device.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);
        self.command_buffers = unsafe { self.device.device.allocate_command_buffers(&alloc_info) }?;

        log::debug!("Allocated {} command buffers", count);
        Ok(())
    }

    fn free_command_buffers(&mut self) {
        if !self.command_buffers.is_empty() {
            unsafe {
                self.device
                    .device
                    .free_command_buffers(self.device.command_pool, &self.command_buffers);
            }
            self.command_buffers.clear();
        }
    }

    /// True once after a swapchain was built whose render pass pipelines
    /// have not been built against yet.
    pub fn take_render_pass_change(&mut self) -> bool {
        std::mem::take(&mut self.render_pass_changed)
    }

    pub fn render_pass(&self) -> BackendResult<vk::RenderPass> {
        self.swapchain
            .as_ref()
            .map(Swapchain::render_pass)
            .ok_or(BackendError::SwapchainUnavailable)
    }

    pub fn aspect_ratio(&self) -> f32 {
        match &self.swapchain {
            Some(swapchain) => swapchain.extent_aspect_ratio(),
            None => swapchain::aspect_ratio(self.canvas.extent()),
        }
    }

    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffers[self.current_image_index as usize]
    }
}

impl Drop for Render {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
        self.free_command_buffers();
        // swapchain releases its resources when the field drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    #[test]
    fn minimized_canvas_has_zero_area() {
        assert!(is_zero_area(vk::Extent2D { width: 0, height: 600 }));
        assert!(is_zero_area(vk::Extent2D { width: 800, height: 0 }));
        assert!(!is_zero_area(SIZE));
    }

    #[test]
    fn stale_present_triggers_recreation() {
        assert!(!needs_recreation(PresentStatus::Presented, SIZE, SIZE));
        assert!(needs_recreation(PresentStatus::Suboptimal, SIZE, SIZE));
        assert!(needs_recreation(PresentStatus::OutOfDate, SIZE, SIZE));
    }

    #[test]
    fn resized_canvas_triggers_recreation() {
        let resized = vk::Extent2D { width: 1024, height: 600 };
        assert!(needs_recreation(PresentStatus::Presented, resized, SIZE));
    }

    #[test]
    fn clears_color_and_far_depth() {
        let values = clear_values(DEFAULT_CLEAR_COLOR);
        unsafe {
            assert_eq!(values[0].color.float32, [0.17, 0.17, 0.17, 1.0]);
            assert_eq!(values[1].depth_stencil.depth, 1.0);
            assert_eq!(values[1].depth_stencil.stencil, 0);
        }
    }

    #[test]
    fn viewport_and_scissor_cover_extent() {
        let viewport = full_viewport(SIZE);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = full_scissor(SIZE);
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!(scissor.extent, SIZE);
    }
}
