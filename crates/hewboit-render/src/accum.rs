use hewboit_core::FrameParity;

use crate::targets::OitTargets;

/// Accumulation color target format (weighted premultiplied sum).
pub const ACCUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Revealage color target format (product of `1 - alpha`).
pub const REVEALAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Revealage at the start of a frame, and in freshly allocated targets
/// before their first frame is read back.
pub const REVEALAGE_CLEAR: wgpu::Color = wgpu::Color::WHITE;

pub fn revealage_clear_ops() -> wgpu::Operations<wgpu::Color> {
    wgpu::Operations {
        load: wgpu::LoadOp::Clear(REVEALAGE_CLEAR),
        store: wgpu::StoreOp::Store,
    }
}

/// One screen-space transparent quad, drawn as an instance of six vertices.
/// Must match QuadInput in accum.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransparentQuad {
    /// min.x, min.y, max.x, max.y in pixels.
    pub rect: [f32; 4],
    /// Linear color and alpha (straight or premultiplied per settings).
    pub color: [f32; 4],
    /// Linear eye depth, clip depth.
    pub depth: [f32; 2],
    pub _pad: [f32; 2],
}

impl TransparentQuad {
    pub fn new(
        min: glam::Vec2,
        max: glam::Vec2,
        color: glam::Vec4,
        linear_depth: f32,
        clip_depth: f32,
    ) -> Self {
        Self {
            rect: [min.x, min.y, max.x, max.y],
            color: color.to_array(),
            depth: [linear_depth, clip_depth],
            _pad: [0.0; 2],
        }
    }
}

/// GPU-uploadable viewport size. Must match Viewport in accum.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewportUniforms {
    pub size: [f32; 2],
    pub _pad: [f32; 2],
}

impl ViewportUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: [width as f32, height as f32],
            _pad: [0.0; 2],
        }
    }
}

/// Additive combine for the accum target: `One, One, Add`.
pub fn accum_blend_state() -> wgpu::BlendState {
    let add = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: add,
        alpha: add,
    }
}

/// Multiplicative combine for revealage: `dst * (1 - src)` with src = alpha.
pub fn revealage_blend_state() -> wgpu::BlendState {
    let multiply = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::OneMinusSrc,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: multiply,
        alpha: multiply,
    }
}

/// Instance vertex layout for `TransparentQuad`.
pub fn quad_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x4,
            offset: 0,
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x4,
            offset: 16,
            shader_location: 1,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 32,
            shader_location: 2,
        },
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<TransparentQuad>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

/// Depth comparison matching the depth convention: reversed Z keeps the
/// greater value.
pub fn depth_compare(reversed_z: bool) -> wgpu::CompareFunction {
    if reversed_z {
        wgpu::CompareFunction::GreaterEqual
    } else {
        wgpu::CompareFunction::LessEqual
    }
}

/// Bindings: histogram, previous CDF, CDF sampler, params, previous revealage, viewport.
pub fn create_accum_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let uniform = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("oit-accum-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            uniform(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            uniform(5),
        ],
    })
}

/// Accumulation render pipeline writing the accum and revealage targets.
///
/// With a depth format the opaque depth buffer is tested but never written.
pub fn create_accum_pipeline(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    shader_source: &str,
    depth_format: Option<wgpu::TextureFormat>,
    reversed_z: bool,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("oit-accum-shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("oit-accum-pipeline-layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("oit-accum-pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[quad_buffer_layout()],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: false,
            depth_compare: depth_compare(reversed_z),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: ACCUM_FORMAT,
                    blend: Some(accum_blend_state()),
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: REVEALAGE_FORMAT,
                    blend: Some(revealage_blend_state()),
                    write_mask: wgpu::ColorWrites::RED,
                }),
            ],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}

/// Bind group for `parity`: reads last frame's CDF and revealage slots.
pub fn create_accum_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &OitTargets,
    viewport_buffer: &wgpu::Buffer,
    parity: FrameParity,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(match parity {
            FrameParity::Even => "oit-accum-bg-even",
            FrameParity::Odd => "oit-accum-bg-odd",
        }),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: targets.histogram_buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(
                    &targets.cdf().read_slot(parity).view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(targets.cdf_sampler()),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: targets.params_buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(
                    &targets.revealage().read_slot(parity).view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: viewport_buffer.as_entire_binding(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_layout_matches_struct() {
        assert_eq!(std::mem::size_of::<TransparentQuad>(), 48);
        let layout = quad_buffer_layout();
        assert_eq!(layout.array_stride, 48);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        let last = layout.attributes.last().unwrap();
        assert_eq!(last.offset + last.format.size(), 40);
    }

    #[test]
    fn test_viewport_uniform_size() {
        assert_eq!(std::mem::size_of::<ViewportUniforms>(), 16);
    }

    #[test]
    fn test_blend_states() {
        let accum = accum_blend_state();
        assert_eq!(accum.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(accum.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(accum.alpha, accum.color);

        let revealage = revealage_blend_state();
        assert_eq!(revealage.color.src_factor, wgpu::BlendFactor::Zero);
        assert_eq!(revealage.color.dst_factor, wgpu::BlendFactor::OneMinusSrc);
        assert_eq!(revealage.color.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn test_revealage_clears_to_fully_revealed() {
        let ops = revealage_clear_ops();
        assert_eq!(ops.load, wgpu::LoadOp::Clear(wgpu::Color::WHITE));
        assert_eq!(ops.store, wgpu::StoreOp::Store);
        assert_eq!(REVEALAGE_CLEAR.r, 1.0);
    }

    #[test]
    fn test_depth_compare_follows_convention() {
        assert_eq!(depth_compare(false), wgpu::CompareFunction::LessEqual);
        assert_eq!(depth_compare(true), wgpu::CompareFunction::GreaterEqual);
    }

    #[test]
    fn test_quad_constructor() {
        let quad = TransparentQuad::new(
            glam::Vec2::new(1.0, 2.0),
            glam::Vec2::new(3.0, 4.0),
            glam::Vec4::new(0.1, 0.2, 0.3, 0.4),
            12.0,
            0.5,
        );
        assert_eq!(quad.rect, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(quad.depth, [12.0, 0.5]);
    }
}
