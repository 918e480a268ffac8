use std::time::Instant;

use hewboit_core::OitSettings;
use hewboit_kernels::ReferencePipeline;
use hewboit_render::OitRenderer;

use crate::scenes::{self, SceneConfig};

/// Timing data for a single benchmark run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Result of a single scene on one backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkResult {
    pub scene_name: String,
    /// "cpu" or "gpu".
    pub backend: String,
    pub quad_count: u32,
    pub fragment_count: u32,
    pub frame_count: u32,
    pub timings: TimingSeries,
}

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// Runs every scene through the CPU reference pipeline and, when an adapter
/// is available, through the wgpu renderer.
pub struct BenchmarkRunner {
    gpu: Option<GpuContext>,
    frame_count: u32,
    settings: OitSettings,
}

impl BenchmarkRunner {
    pub fn new(frame_count: u32, cpu_only: bool) -> Self {
        let gpu = if cpu_only { None } else { Self::init_gpu() };
        Self {
            gpu,
            frame_count,
            settings: scenes::bench_settings(),
        }
    }

    /// Initialize wgpu natively. Blocks on async adapter request.
    fn init_gpu() -> Option<GpuContext> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let Some(adapter) =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            }))
        else {
            log::warn!("No suitable GPU adapter found, running CPU scenes only");
            return None;
        };

        log::info!("Benchmark adapter: {}", adapter.get_info().name);

        match pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("oit-bench-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )) {
            Ok((device, queue)) => Some(GpuContext { device, queue }),
            Err(e) => {
                log::warn!("Failed to create device ({e}), running CPU scenes only");
                None
            }
        }
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Run a scene on every available backend.
    pub fn run_scene(&self, config: &SceneConfig) -> Vec<BenchmarkResult> {
        let quads = scenes::generate_quads(config, &self.settings);
        let fragments = scenes::rasterize(&quads, &self.settings);
        log::info!(
            "Running scene '{}' ({} quads, {} fragments)...",
            config.name,
            quads.len(),
            fragments.len()
        );

        let mut results = Vec::new();
        match self.run_cpu(config, &fragments) {
            Ok(timings) => results.push(self.result(config, "cpu", &quads, &fragments, timings)),
            Err(e) => log::error!("CPU scene '{}' failed: {e}", config.name),
        }
        if let Some(gpu) = &self.gpu {
            match self.run_gpu(gpu, config, &quads) {
                Ok(timings) => {
                    results.push(self.result(config, "gpu", &quads, &fragments, timings))
                }
                Err(e) => log::error!("GPU scene '{}' failed: {e}", config.name),
            }
        }
        results
    }

    fn result(
        &self,
        config: &SceneConfig,
        backend: &str,
        quads: &[hewboit_render::TransparentQuad],
        fragments: &[hewboit_kernels::Fragment],
        timings: TimingSeries,
    ) -> BenchmarkResult {
        log::info!(
            "  {}: mean={:.2}ms, p95={:.2}ms, p99={:.2}ms",
            backend,
            timings.mean_ms,
            timings.p95_ms,
            timings.p99_ms
        );
        BenchmarkResult {
            scene_name: config.name.to_string(),
            backend: backend.to_string(),
            quad_count: quads.len() as u32,
            fragment_count: fragments.len() as u32,
            frame_count: self.frame_count,
            timings,
        }
    }

    fn run_cpu(
        &self,
        config: &SceneConfig,
        fragments: &[hewboit_kernels::Fragment],
    ) -> Result<TimingSeries, hewboit_core::ConfigError> {
        let mut pipeline = ReferencePipeline::new(self.settings, config.width, config.height)?;
        let mut frame_times = Vec::with_capacity(self.frame_count as usize);
        for _ in 0..self.frame_count {
            let frame_start = Instant::now();
            let image = pipeline.render_frame(fragments);
            std::hint::black_box(&image);
            frame_times.push(frame_start.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(compute_timings(&frame_times))
    }

    fn run_gpu(
        &self,
        gpu: &GpuContext,
        config: &SceneConfig,
        quads: &[hewboit_render::TransparentQuad],
    ) -> Result<TimingSeries, hewboit_core::ConfigError> {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let mut renderer = OitRenderer::new(
            &gpu.device,
            &gpu.queue,
            self.settings,
            format,
            None,
            config.width,
            config.height,
        )?;
        let target = bench_target_view(&gpu.device, format, config.width, config.height);

        let mut frame_times = Vec::with_capacity(self.frame_count as usize);
        for _ in 0..self.frame_count {
            let frame_start = Instant::now();
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("oit-bench-encoder"),
                });
            renderer.render(&gpu.device, &gpu.queue, &mut encoder, quads, &target, None);
            gpu.queue.submit(std::iter::once(encoder.finish()));
            gpu.device.poll(wgpu::Maintain::Wait);
            frame_times.push(frame_start.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(compute_timings(&frame_times))
    }
}

/// Offscreen target standing in for the host's opaque frame.
fn bench_target_view(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("oit-bench-target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Compute timing statistics from a list of frame times in milliseconds.
pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;
    let p99_idx = ((n as f64) * 0.99).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        p99_ms: sorted[p99_idx.min(n - 1)],
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}
