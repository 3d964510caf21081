// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync, and the bookkeeping that
// decides which of them a frame uses.

use ash::vk;

use super::device::Device;
use super::BackendResult;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Frame synchronization - one per frame in flight
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    /// On failure, whatever was already created is destroyed again.
    pub fn new(device: &Device) -> BackendResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        let mut sync = Self::default();
        let created = (|| -> BackendResult<()> {
            unsafe {
                sync.image_available = device.device.create_semaphore(&semaphore_info, None)?;
                sync.render_finished = device.device.create_semaphore(&semaphore_info, None)?;
                sync.in_flight_fence = device.device.create_fence(&fence_info, None)?;
            }
            Ok(())
        })();

        match created {
            Ok(()) => Ok(sync),
            Err(e) => {
                unsafe {
                    device.device.destroy_semaphore(sync.image_available, None);
                    device.device.destroy_semaphore(sync.render_finished, None);
                }
                Err(e)
            }
        }
    }
}

/// Which in-flight slot is current, and which slot's fence last claimed each
/// swapchain image.
///
/// Image count and slot count differ, so a freshly acquired image may still
/// be read by a submission from another slot.
#[derive(Debug, Clone)]
pub struct FrameRing {
    current: usize,
    images_in_flight: Vec<vk::Fence>,
}

impl FrameRing {
    pub fn new(image_count: usize) -> Self {
        Self {
            current: 0,
            images_in_flight: vec![vk::Fence::null(); image_count],
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Hand `image_index` to `fence`. Returns the fence that held it before, if any.
    pub fn claim_image(&mut self, image_index: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let previous = std::mem::replace(&mut self.images_in_flight[image_index], fence);
        (previous != vk::Fence::null()).then_some(previous)
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn slot_index_wraps_modulo_frames_in_flight() {
        let mut ring = FrameRing::new(3);
        for n in 1..=7 {
            ring.advance();
            assert_eq!(ring.current(), n % MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn first_claim_of_an_image_has_nothing_to_wait_on() {
        let mut ring = FrameRing::new(3);
        assert_eq!(ring.claim_image(1, vk::Fence::from_raw(10)), None);
    }

    #[test]
    fn reclaiming_an_image_returns_previous_fence() {
        let mut ring = FrameRing::new(3);
        let first = vk::Fence::from_raw(10);
        let second = vk::Fence::from_raw(20);

        ring.claim_image(2, first);
        assert_eq!(ring.claim_image(2, second), Some(first));
        assert_eq!(ring.claim_image(2, first), Some(second));
        // Other images are untouched
        assert_eq!(ring.claim_image(0, first), None);
    }
}
