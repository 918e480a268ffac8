use hewboit_core::{
    ConfigError, FrameParity, GpuHistogramParams, HistogramParams, OitSettings, PingPong,
};

use crate::accum::{revealage_clear_ops, ACCUM_FORMAT, REVEALAGE_FORMAT};

/// CDF lookup format. Only `.r` is used; rgba16float is storage-writable
/// and filterable on every backend.
pub const CDF_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A texture together with its default view.
pub struct TargetTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl TargetTexture {
    fn new(device: &wgpu::Device, desc: &wgpu::TextureDescriptor) -> Self {
        let texture = device.create_texture(desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// What a resize or reconfiguration had to rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetChanges {
    /// Histogram buffer and CDF textures were reallocated.
    pub histogram: bool,
    /// Accum and revealage targets were reallocated.
    pub images: bool,
}

impl TargetChanges {
    pub fn any(&self) -> bool {
        self.histogram || self.images
    }
}

/// All per-camera OIT GPU resources.
///
/// The histogram and accumulation targets exist once; CDF and revealage
/// are double-buffered and selected by frame parity.
pub struct OitTargets {
    params: HistogramParams,
    width: u32,
    height: u32,
    histogram_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    cdf: PingPong<TargetTexture>,
    cdf_sampler: wgpu::Sampler,
    accum: TargetTexture,
    revealage: PingPong<TargetTexture>,
}

impl OitTargets {
    /// Allocate every target for a `width` x `height` viewport.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &OitSettings,
        width: u32,
        height: u32,
    ) -> Result<Self, ConfigError> {
        let params = HistogramParams::for_viewport(settings, width, height)?;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("oit-histogram-params"),
            size: std::mem::size_of::<GpuHistogramParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &params_buffer,
            0,
            bytemuck::bytes_of(&GpuHistogramParams::new(&params, settings)),
        );

        let cdf_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("oit-cdf-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::info!(
            "OitTargets: {}x{} target, {}x{} tiles, {} bins ({} KB histogram)",
            width,
            height,
            params.tile_count_x,
            params.tile_count_y,
            params.num_bins,
            histogram_byte_size(&params) / 1024
        );

        let targets = Self {
            histogram_buffer: create_histogram_buffer(device, &params),
            cdf: PingPong::new(
                create_cdf_texture(device, &params, "oit-cdf-a"),
                create_cdf_texture(device, &params, "oit-cdf-b"),
            ),
            accum: create_color_target(device, "oit-accum", ACCUM_FORMAT, width, height),
            revealage: PingPong::new(
                create_color_target(device, "oit-revealage-a", REVEALAGE_FORMAT, width, height),
                create_color_target(device, "oit-revealage-b", REVEALAGE_FORMAT, width, height),
            ),
            params,
            width,
            height,
            params_buffer,
            cdf_sampler,
        };
        targets.reset_revealage(device, queue);
        Ok(targets)
    }

    /// Apply new settings and/or viewport size.
    ///
    /// The histogram and CDF are reallocated only when the tile grid or bin
    /// count changes; otherwise just the params uniform is rewritten.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &OitSettings,
        width: u32,
        height: u32,
    ) -> Result<TargetChanges, ConfigError> {
        let params = HistogramParams::for_viewport(settings, width, height)?;
        let mut changes = TargetChanges::default();

        if self.params.needs_recreate(&params) {
            log::info!(
                "OitTargets: tile grid {}x{}x{} -> {}x{}x{}",
                self.params.tile_count_x,
                self.params.tile_count_y,
                self.params.num_bins,
                params.tile_count_x,
                params.tile_count_y,
                params.num_bins
            );
            self.histogram_buffer = create_histogram_buffer(device, &params);
            self.cdf = PingPong::new(
                create_cdf_texture(device, &params, "oit-cdf-a"),
                create_cdf_texture(device, &params, "oit-cdf-b"),
            );
            changes.histogram = true;
        }

        if (width, height) != (self.width, self.height) {
            self.accum = create_color_target(device, "oit-accum", ACCUM_FORMAT, width, height);
            self.revealage = PingPong::new(
                create_color_target(device, "oit-revealage-a", REVEALAGE_FORMAT, width, height),
                create_color_target(device, "oit-revealage-b", REVEALAGE_FORMAT, width, height),
            );
            self.width = width;
            self.height = height;
            // A kept CDF must not be paired with a zeroed revealage read slot
            self.reset_revealage(device, queue);
            changes.images = true;
        }

        self.params = params;
        queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&GpuHistogramParams::new(&params, settings)),
        );
        Ok(changes)
    }

    /// Clear both revealage slots to fully revealed.
    pub fn reset_revealage(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("oit-revealage-reset"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("oit-revealage-reset-pass"),
                color_attachments: &[
                    revealage_attachment(&self.revealage.slot_a),
                    revealage_attachment(&self.revealage.slot_b),
                ],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn params(&self) -> &HistogramParams {
        &self.params
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn histogram_buffer(&self) -> &wgpu::Buffer {
        &self.histogram_buffer
    }

    pub fn params_buffer(&self) -> &wgpu::Buffer {
        &self.params_buffer
    }

    pub fn cdf(&self) -> &PingPong<TargetTexture> {
        &self.cdf
    }

    pub fn cdf_sampler(&self) -> &wgpu::Sampler {
        &self.cdf_sampler
    }

    pub fn accum(&self) -> &TargetTexture {
        &self.accum
    }

    pub fn revealage(&self) -> &PingPong<TargetTexture> {
        &self.revealage
    }

    /// Revealage target this frame renders into.
    pub fn revealage_target(&self, parity: FrameParity) -> &wgpu::TextureView {
        &self.revealage.write_slot(parity).view
    }
}

/// Byte size of the histogram buffer: one `u32` per (tile, bin).
pub fn histogram_byte_size(params: &HistogramParams) -> u64 {
    params.cell_count() as u64 * std::mem::size_of::<u32>() as u64
}

/// Extent of the CDF volume: tiles along x/y, bins along z.
pub fn cdf_extent(params: &HistogramParams) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: params.tile_count_x,
        height: params.tile_count_y,
        depth_or_array_layers: params.num_bins,
    }
}

// wgpu zero-initializes new buffers and textures, so the histogram starts
// clear and the first frame samples an all-zero CDF.
fn create_histogram_buffer(device: &wgpu::Device, params: &HistogramParams) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("oit-histogram"),
        size: histogram_byte_size(params),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

fn create_cdf_texture(
    device: &wgpu::Device,
    params: &HistogramParams,
    label: &'static str,
) -> TargetTexture {
    TargetTexture::new(
        device,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: cdf_extent(params),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: CDF_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
            view_formats: &[],
        },
    )
}

fn revealage_attachment(target: &TargetTexture) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view: &target.view,
        resolve_target: None,
        ops: revealage_clear_ops(),
    })
}

fn create_color_target(
    device: &wgpu::Device,
    label: &'static str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> TargetTexture {
    TargetTexture::new(
        device,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        },
    )
}
