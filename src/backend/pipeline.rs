// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// Fixed-function state comes from a `PipelineConfigInfo` value; viewport and
// scissor are dynamic and set per frame.

use ash::vk;
use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use super::device::Device;
use super::model::Vertex;
use super::shader::ShaderModule;
use super::BackendResult;

/// Fixed-function state of a pipeline. Plain values, no pointers into other
/// structs, so it can be copied around freely before `Pipeline::new`.
#[derive(Debug, Clone)]
pub struct PipelineConfigInfo {
    pub viewport_count: u32,
    pub scissor_count: u32,
    pub input_assembly_info: vk::PipelineInputAssemblyStateCreateInfo,
    pub rasterization_info: vk::PipelineRasterizationStateCreateInfo,
    pub multisample_info: vk::PipelineMultisampleStateCreateInfo,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub pipeline_layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl PipelineConfigInfo {
    /// Baseline opaque, depth-tested, unculled config for `topology`.
    /// Layout and render pass are left null for the caller to fill in.
    pub fn default_for(topology: vk::PrimitiveTopology) -> Self {
        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(topology)
            .primitive_restart_enable(false)
            .build();

        let rasterization_info = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .build();

        let multisample_info = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .build();

        // Straight overwrite
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();

        let depth_stencil_info = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
            .build();

        Self {
            viewport_count: 1,
            scissor_count: 1,
            input_assembly_info,
            rasterization_info,
            multisample_info,
            color_blend_attachment,
            depth_stencil_info,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            pipeline_layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }
}

/// One graphics pipeline and the shader modules it was built from.
/// The pipeline layout belongs to whoever passed it in the config.
pub struct Pipeline {
    handle: vk::Pipeline,
    // Kept alive alongside the pipeline, released together on drop
    _vertex_shader: ShaderModule,
    _fragment_shader: ShaderModule,
    device: Arc<Device>,
}

impl Pipeline {
    pub fn new(
        device: Arc<Device>,
        vertex_shader_path: &Path,
        fragment_shader_path: &Path,
        config: &PipelineConfigInfo,
    ) -> BackendResult<Self> {
        debug_assert!(
            config.pipeline_layout != vk::PipelineLayout::null(),
            "pipeline config has no layout"
        );
        debug_assert!(
            config.render_pass != vk::RenderPass::null(),
            "pipeline config has no render pass"
        );

        let vertex_shader = ShaderModule::from_file(&device, vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(&device, fragment_shader_path)?;

        // SAFETY: literal is nul-terminated with no interior nul
        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle)
                .name(entry_point)
                .build(),
        ];

        let bindings = Vertex::binding_descriptions();
        let attributes = Vertex::attribute_descriptions();
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        // Counts only, the values are dynamic
        let mut viewport_state = vk::PipelineViewportStateCreateInfo::builder().build();
        viewport_state.viewport_count = config.viewport_count;
        viewport_state.scissor_count = config.scissor_count;

        let color_blend_attachments = [config.color_blend_attachment];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0; 4]);

        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&config.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&config.input_assembly_info)
            .viewport_state(&viewport_state)
            .rasterization_state(&config.rasterization_info)
            .multisample_state(&config.multisample_info)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&config.depth_stencil_info)
            .dynamic_state(&dynamic_state_info)
            .layout(config.pipeline_layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass)
            .base_pipeline_index(-1)
            .build();

        let pipelines = unsafe {
            device
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| e)?;

        log::debug!(
            "Created graphics pipeline from {:?} and {:?}",
            vertex_shader_path,
            fragment_shader_path
        );

        Ok(Self {
            handle: pipelines[0],
            _vertex_shader: vertex_shader,
            _fragment_shader: fragment_shader,
            device,
        })
    }

    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .device
                .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.handle);
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_pipeline(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_dynamic_viewport_and_scissor() {
        let config = PipelineConfigInfo::default_for(vk::PrimitiveTopology::TRIANGLE_LIST);

        assert_eq!(config.viewport_count, 1);
        assert_eq!(config.scissor_count, 1);
        assert_eq!(
            config.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(config.subpass, 0);
        assert_eq!(config.pipeline_layout, vk::PipelineLayout::null());
        assert_eq!(config.render_pass, vk::RenderPass::null());
    }

    #[test]
    fn default_config_keeps_requested_topology() {
        for topology in [
            vk::PrimitiveTopology::TRIANGLE_LIST,
            vk::PrimitiveTopology::LINE_STRIP,
            vk::PrimitiveTopology::POINT_LIST,
        ] {
            let config = PipelineConfigInfo::default_for(topology);
            assert_eq!(config.input_assembly_info.topology, topology);
            assert_eq!(config.input_assembly_info.primitive_restart_enable, vk::FALSE);
        }
    }

    #[test]
    fn default_rasterization_draws_both_faces() {
        let raster = PipelineConfigInfo::default_for(vk::PrimitiveTopology::TRIANGLE_LIST).rasterization_info;

        assert_eq!(raster.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(raster.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(raster.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(raster.depth_bias_enable, vk::FALSE);
        assert_eq!(raster.line_width, 1.0);
    }

    #[test]
    fn default_depth_and_blend_state() {
        let config = PipelineConfigInfo::default_for(vk::PrimitiveTopology::TRIANGLE_LIST);

        let depth = config.depth_stencil_info;
        assert_eq!(depth.depth_test_enable, vk::TRUE);
        assert_eq!(depth.depth_write_enable, vk::TRUE);
        assert_eq!(depth.depth_compare_op, vk::CompareOp::LESS);
        assert_eq!(depth.depth_bounds_test_enable, vk::FALSE);
        assert_eq!(depth.stencil_test_enable, vk::FALSE);

        let blend = config.color_blend_attachment;
        assert_eq!(blend.blend_enable, vk::FALSE);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);

        assert_eq!(config.multisample_info.rasterization_samples, vk::SampleCountFlags::TYPE_1);
    }
}
