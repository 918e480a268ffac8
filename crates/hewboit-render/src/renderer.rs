use hewboit_core::{ConfigError, DepthSource, FrameParity, OitSettings};

use crate::accum::{
    create_accum_bind_group, create_accum_bind_group_layout, create_accum_pipeline,
    revealage_clear_ops, TransparentQuad, ViewportUniforms,
};
use crate::cdf_build::{
    create_cdf_build_bind_group, create_cdf_build_bind_group_layout, create_cdf_build_pipeline,
    dispatch_cdf_build,
};
use crate::composite::{
    create_composite_bind_group, create_composite_bind_group_layout, create_composite_pipeline,
};
use crate::shaders;
use crate::targets::OitTargets;

/// Initial instance capacity of the quad buffer.
const INITIAL_QUAD_CAPACITY: u64 = 1024;

/// Single public struct owning all OIT pipelines, bind groups and targets.
///
/// Bind groups exist once per frame parity; `render` picks the pair for the
/// current parity and flips it afterwards.
pub struct OitRenderer {
    settings: OitSettings,
    targets: OitTargets,
    depth_format: Option<wgpu::TextureFormat>,
    // Accumulation
    accum_shader: String,
    accum_pipeline: wgpu::RenderPipeline,
    accum_bgl: wgpu::BindGroupLayout,
    accum_bind_groups: [wgpu::BindGroup; 2],
    viewport_buffer: wgpu::Buffer,
    quad_buffer: wgpu::Buffer,
    quad_capacity: u64,
    // CDF build
    cdf_build_pipeline: wgpu::ComputePipeline,
    cdf_build_bgl: wgpu::BindGroupLayout,
    cdf_build_bind_groups: [wgpu::BindGroup; 2],
    // Composite
    composite_pipeline: wgpu::RenderPipeline,
    composite_bgl: wgpu::BindGroupLayout,
    composite_bind_groups: [wgpu::BindGroup; 2],
    parity: FrameParity,
    frame: u64,
}

impl OitRenderer {
    /// Build all GPU resources. `depth_format` enables depth testing against
    /// the host's opaque depth buffer.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: OitSettings,
        target_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        width: u32,
        height: u32,
    ) -> Result<Self, ConfigError> {
        let targets = OitTargets::new(device, queue, &settings, width, height)?;

        let accum_shader = shaders::accum_source();
        let accum_bgl = create_accum_bind_group_layout(device);
        let accum_pipeline = create_accum_pipeline(
            device,
            &accum_bgl,
            &accum_shader,
            depth_format,
            reversed_z(&settings),
        );

        let cdf_build_bgl = create_cdf_build_bind_group_layout(device);
        let cdf_build_pipeline =
            create_cdf_build_pipeline(device, &cdf_build_bgl, &shaders::cdf_build_source());

        let composite_bgl = create_composite_bind_group_layout(device);
        let composite_pipeline = create_composite_pipeline(
            device,
            &composite_bgl,
            &shaders::composite_source(),
            target_format,
        );

        let viewport_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("oit-viewport"),
            size: std::mem::size_of::<ViewportUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &viewport_buffer,
            0,
            bytemuck::bytes_of(&ViewportUniforms::new(width, height)),
        );

        let quad_buffer = create_quad_buffer(device, INITIAL_QUAD_CAPACITY);

        let accum_bind_groups = [FrameParity::Even, FrameParity::Odd].map(|parity| {
            create_accum_bind_group(device, &accum_bgl, &targets, &viewport_buffer, parity)
        });
        let cdf_build_bind_groups = [FrameParity::Even, FrameParity::Odd]
            .map(|parity| create_cdf_build_bind_group(device, &cdf_build_bgl, &targets, parity));
        let composite_bind_groups = [FrameParity::Even, FrameParity::Odd]
            .map(|parity| create_composite_bind_group(device, &composite_bgl, &targets, parity));

        log::info!(
            "OitRenderer: {:?}, {:?}, {:?}",
            settings.depth_source,
            settings.weight_strategy,
            settings.alpha_mode
        );

        Ok(Self {
            settings,
            targets,
            depth_format,
            accum_shader,
            accum_pipeline,
            accum_bgl,
            accum_bind_groups,
            viewport_buffer,
            quad_buffer,
            quad_capacity: INITIAL_QUAD_CAPACITY,
            cdf_build_pipeline,
            cdf_build_bgl,
            cdf_build_bind_groups,
            composite_pipeline,
            composite_bgl,
            composite_bind_groups,
            parity: FrameParity::Even,
            frame: 0,
        })
    }

    /// Resize the render target.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
    ) -> Result<(), ConfigError> {
        let settings = self.settings;
        self.apply(device, queue, settings, width, height)
    }

    /// Switch to new settings at the current size.
    pub fn reconfigure(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: OitSettings,
    ) -> Result<(), ConfigError> {
        let (width, height) = self.targets.size();
        self.apply(device, queue, settings, width, height)
    }

    fn apply(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: OitSettings,
        width: u32,
        height: u32,
    ) -> Result<(), ConfigError> {
        let changes = self
            .targets
            .update(device, queue, &settings, width, height)?;

        if reversed_z(&settings) != reversed_z(&self.settings) && self.depth_format.is_some() {
            self.accum_pipeline = create_accum_pipeline(
                device,
                &self.accum_bgl,
                &self.accum_shader,
                self.depth_format,
                reversed_z(&settings),
            );
        }
        self.settings = settings;

        if changes.images {
            queue.write_buffer(
                &self.viewport_buffer,
                0,
                bytemuck::bytes_of(&ViewportUniforms::new(width, height)),
            );
        }
        if changes.any() {
            self.rebuild_bind_groups(device);
        }
        Ok(())
    }

    fn rebuild_bind_groups(&mut self, device: &wgpu::Device) {
        let targets = &self.targets;
        self.accum_bind_groups = [FrameParity::Even, FrameParity::Odd].map(|parity| {
            create_accum_bind_group(
                device,
                &self.accum_bgl,
                targets,
                &self.viewport_buffer,
                parity,
            )
        });
        self.cdf_build_bind_groups = [FrameParity::Even, FrameParity::Odd].map(|parity| {
            create_cdf_build_bind_group(device, &self.cdf_build_bgl, targets, parity)
        });
        self.composite_bind_groups = [FrameParity::Even, FrameParity::Odd].map(|parity| {
            create_composite_bind_group(device, &self.composite_bgl, targets, parity)
        });
    }

    fn upload_quads(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        quads: &[TransparentQuad],
    ) {
        let needed = quads.len() as u64;
        if needed > self.quad_capacity {
            self.quad_capacity = needed.next_power_of_two();
            self.quad_buffer = create_quad_buffer(device, self.quad_capacity);
            log::debug!("OitRenderer: quad buffer grown to {}", self.quad_capacity);
        }
        if !quads.is_empty() {
            queue.write_buffer(&self.quad_buffer, 0, bytemuck::cast_slice(quads));
        }
    }

    /// Encode accumulation, CDF build and composite for one frame, then flip parity.
    ///
    /// `target` must already hold the opaque frame. `depth` is the opaque
    /// depth buffer, used only when the renderer was built with a depth format.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        quads: &[TransparentQuad],
        target: &wgpu::TextureView,
        depth: Option<&wgpu::TextureView>,
    ) {
        self.upload_quads(device, queue, quads);
        let index = self.parity.index();

        let depth = match (depth, self.depth_format) {
            (Some(view), Some(_)) => Some(view),
            (Some(_), None) => {
                log::warn!("OitRenderer: no depth format configured, ignoring depth view");
                None
            }
            (None, _) => None,
        };

        // 1. Accumulation: clear accum to 0 and this frame's revealage to 1
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("oit-accum-pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.accum().view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: self.targets.revealage_target(self.parity),
                        resolve_target: None,
                        ops: revealage_clear_ops(),
                    }),
                ],
                depth_stencil_attachment: depth.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if !quads.is_empty() {
                pass.set_pipeline(&self.accum_pipeline);
                pass.set_bind_group(0, &self.accum_bind_groups[index], &[]);
                pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
                pass.draw(0..6, 0..quads.len() as u32);
            }
        }

        // 2. CDF build, strictly after every accumulation draw
        if self.settings.weight_strategy.uses_histogram() {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("oit-cdf-build-pass"),
                timestamp_writes: None,
            });
            dispatch_cdf_build(
                &mut pass,
                &self.cdf_build_pipeline,
                &self.cdf_build_bind_groups[index],
                self.targets.params(),
            );
        }

        // 3. Composite onto the opaque frame
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("oit-composite-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &self.composite_bind_groups[index], &[]);
            pass.draw(0..3, 0..1);
        }

        self.parity = self.parity.flip();
        self.frame += 1;
    }

    pub fn settings(&self) -> &OitSettings {
        &self.settings
    }

    pub fn targets(&self) -> &OitTargets {
        &self.targets
    }

    pub fn parity(&self) -> FrameParity {
        self.parity
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }
}

fn reversed_z(settings: &OitSettings) -> bool {
    matches!(
        settings.depth_source,
        DepthSource::ClipSpace { reversed_z: true }
    )
}

fn create_quad_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("oit-quads"),
        size: capacity * std::mem::size_of::<TransparentQuad>() as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
