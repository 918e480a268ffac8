use hewboit_core::{FrameParity, HistogramParams};

use crate::targets::{OitTargets, CDF_FORMAT};

/// Bindings: histogram (read/clear), CDF storage (write slot), params.
pub fn create_cdf_build_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("oit-cdf-build-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: CDF_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D3,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}

/// Create the CDF build compute pipeline (one 64-lane workgroup per tile).
pub fn create_cdf_build_pipeline(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    shader_source: &str,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("oit-cdf-build-shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("oit-cdf-build-pipeline-layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("oit-cdf-build-pipeline"),
        layout: Some(&layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Bind group for `parity`: writes this frame's CDF slot.
pub fn create_cdf_build_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &OitTargets,
    parity: FrameParity,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(match parity {
            FrameParity::Even => "oit-cdf-build-bg-even",
            FrameParity::Odd => "oit-cdf-build-bg-odd",
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
                    &targets.cdf().write_slot(parity).view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: targets.params_buffer().as_entire_binding(),
            },
        ],
    })
}

/// Workgroup counts: one workgroup per tile.
pub fn cdf_build_workgroups(params: &HistogramParams) -> (u32, u32, u32) {
    (params.tile_count_x, params.tile_count_y, 1)
}

/// Dispatch the CDF build over every tile.
pub fn dispatch_cdf_build(
    pass: &mut wgpu::ComputePass,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    params: &HistogramParams,
) {
    let (x, y, z) = cdf_build_workgroups(params);
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(x, y, z);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hewboit_core::OitSettings;

    #[test]
    fn test_one_workgroup_per_tile() {
        let params = HistogramParams::for_viewport(&OitSettings::default(), 1280, 720).unwrap();
        assert_eq!(cdf_build_workgroups(&params), (40, 23, 1));
    }
}
