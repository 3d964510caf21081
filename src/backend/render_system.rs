// Render system - draws a list of models with one pipeline
//
// Owns the (empty) pipeline layout and the pipeline built against it.

use ash::vk;
use std::path::PathBuf;
use std::sync::Arc;

use super::device::Device;
use super::model::Model;
use super::pipeline::{Pipeline, PipelineConfigInfo};
use super::BackendResult;

/// Where the compiled shaders live.
#[derive(Debug, Clone)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/shader.vert.spv"),
            fragment: PathBuf::from("shaders/shader.frag.spv"),
        }
    }
}

pub struct RenderSystem {
    pipeline: Pipeline,
    pipeline_layout: vk::PipelineLayout,
    device: Arc<Device>,
}

impl RenderSystem {
    pub fn new(device: Arc<Device>, render_pass: vk::RenderPass, shaders: &ShaderPaths) -> BackendResult<Self> {
        // No descriptor sets, no push constants
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let pipeline_layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }?;

        let mut config = PipelineConfigInfo::default_for(vk::PrimitiveTopology::TRIANGLE_LIST);
        config.pipeline_layout = pipeline_layout;
        config.render_pass = render_pass;

        let pipeline = match Pipeline::new(device.clone(), &shaders.vertex, &shaders.fragment, &config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { device.device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(e);
            }
        };

        Ok(Self {
            pipeline,
            pipeline_layout,
            device,
        })
    }

    /// Bind the pipeline, then bind and draw each model in the given order.
    pub fn render_objects(&self, command_buffer: vk::CommandBuffer, models: &[Model]) {
        self.pipeline.bind(command_buffer);

        for model in models {
            model.bind(command_buffer);
            model.draw(command_buffer);
        }
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        // A layout may go before pipelines created from it
        unsafe { self.device.device.destroy_pipeline_layout(self.pipeline_layout, None) };
    }
}
