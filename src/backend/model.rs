// Model - immutable vertex geometry on the GPU
//
// Uploaded once through a staging buffer into device-local memory.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use std::mem::{offset_of, size_of};
use std::sync::Arc;

use super::buffer::Buffer;
use super::device::Device;
use super::{BackendError, BackendResult};

/// Position then RGBA color, 7 tightly packed floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }

    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()]
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            // Position (location 0)
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, position) as u32)
                .build(),
            // Color (location 1)
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(offset_of!(Vertex, color) as u32)
                .build(),
        ]
    }
}

/// Byte size of the vertex buffer holding `vertices`.
pub fn vertex_buffer_size(vertices: &[Vertex]) -> vk::DeviceSize {
    (size_of::<Vertex>() * vertices.len()) as vk::DeviceSize
}

pub struct Model {
    vertex_buffer: Buffer,
    vertex_count: u32,
    device: Arc<Device>,
}

impl Model {
    pub fn new(device: Arc<Device>, vertices: &[Vertex]) -> BackendResult<Self> {
        if vertices.is_empty() {
            return Err(BackendError::EmptyModel);
        }

        let size = vertex_buffer_size(vertices);
        let staging = Buffer::staging(&device, vertices)?;
        let vertex_buffer = Buffer::new(
            &device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        device.copy_buffer(staging.handle, vertex_buffer.handle, size)?;
        // Staging buffer is released here, the copy has completed

        log::debug!("Uploaded model: {} vertices, {} bytes", vertices.len(), size);

        Ok(Self {
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            device,
        })
    }

    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .device
                .cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.handle], &[0]);
        }
    }

    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.device.cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.vertex_buffer.size
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        // The GPU may still be reading the buffer
        let _ = self.device.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_seven_packed_floats() {
        assert_eq!(size_of::<Vertex>(), 28);

        let bindings = Vertex::binding_descriptions();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 28);
        assert_eq!(bindings[0].input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn attributes_follow_struct_layout() {
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes.len(), 2);

        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);

        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].format, vk::Format::R32G32B32A32_SFLOAT);
    }

    #[test]
    fn buffer_size_is_count_times_stride() {
        let vertex = Vertex::new(Vec3::new(0.0, -0.5, 0.0), Vec4::new(1.0, 0.0, 0.0, 1.0));
        for count in [1usize, 3, 27, 1000] {
            let vertices = vec![vertex; count];
            assert_eq!(vertex_buffer_size(&vertices), (count * 28) as vk::DeviceSize);
        }
    }

    #[test]
    fn vertex_bytes_are_position_then_color() {
        let vertex = Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec4::new(0.1, 0.2, 0.3, 0.4));
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&vertex));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4]);
    }
}
