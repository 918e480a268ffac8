use hewboit_core::{ConfigError, FrameParity, HistogramParams, OitSettings, PingPong};

use crate::accumulate::{accumulate_fragments, AccumulateContext, Fragment};
use crate::cdf::CdfTable;
use crate::cdf_build::{build_cdf, CdfBuildStats};
use crate::histogram::HistogramBuffer;
use crate::images::{AccumImage, RevealageImage};
use crate::resolve::{resolve, ResolvedImage};

/// CPU frame driver owning every per-camera resource.
///
/// Plays the host's role: clears the accumulation images, orders the three
/// stages and flips frame parity. CDF and revealage are double-buffered so
/// the accumulator always reads last frame's slot.
pub struct ReferencePipeline {
    settings: OitSettings,
    params: HistogramParams,
    width: u32,
    height: u32,
    histogram: HistogramBuffer,
    cdf: PingPong<CdfTable>,
    accum: AccumImage,
    revealage: PingPong<RevealageImage>,
    parity: FrameParity,
    frame: u64,
}

impl ReferencePipeline {
    pub fn new(settings: OitSettings, width: u32, height: u32) -> Result<Self, ConfigError> {
        let params = HistogramParams::for_viewport(&settings, width, height)?;
        log::info!(
            "ReferencePipeline: {}x{} target, {}x{} tiles, {} bins",
            width,
            height,
            params.tile_count_x,
            params.tile_count_y,
            params.num_bins
        );
        Ok(Self {
            settings,
            histogram: HistogramBuffer::new(&params),
            cdf: PingPong::from_fn(|| CdfTable::new(&params)),
            accum: AccumImage::new(width, height),
            revealage: PingPong::from_fn(|| RevealageImage::new(width, height)),
            params,
            width,
            height,
            parity: FrameParity::Even,
            frame: 0,
        })
    }

    /// Resize the render target. Histogram and CDF are reallocated only when
    /// the tile grid or bin count changes.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ConfigError> {
        self.apply(self.settings, width, height)
    }

    /// Swap in new settings for the same target.
    pub fn reconfigure(&mut self, settings: OitSettings) -> Result<(), ConfigError> {
        self.apply(settings, self.width, self.height)
    }

    fn apply(&mut self, settings: OitSettings, width: u32, height: u32) -> Result<(), ConfigError> {
        let params = HistogramParams::for_viewport(&settings, width, height)?;
        if self.params.needs_recreate(&params) {
            log::info!(
                "ReferencePipeline: tile grid {}x{}x{} -> {}x{}x{}, reallocating",
                self.params.tile_count_x,
                self.params.tile_count_y,
                self.params.num_bins,
                params.tile_count_x,
                params.tile_count_y,
                params.num_bins
            );
            self.histogram = HistogramBuffer::new(&params);
            self.cdf = PingPong::from_fn(|| CdfTable::new(&params));
        }
        if (width, height) != (self.width, self.height) {
            self.accum = AccumImage::new(width, height);
            self.revealage = PingPong::from_fn(|| RevealageImage::new(width, height));
            self.width = width;
            self.height = height;
        }
        self.settings = settings;
        self.params = params;
        Ok(())
    }

    /// Clear accum to zero and this frame's revealage to one.
    pub fn begin_frame(&mut self) {
        self.accum.clear();
        self.revealage.write_slot(self.parity).reset();
    }

    /// Accumulator stage. Returns the number of fragments inside the target.
    pub fn accumulate(&self, fragments: &[Fragment]) -> usize {
        let ctx = AccumulateContext {
            params: &self.params,
            weight_strategy: self.settings.weight_strategy,
            alpha_mode: self.settings.alpha_mode,
            histogram: &self.histogram,
            prev_cdf: self.cdf.read_slot(self.parity),
            prev_revealage: self.revealage.read_slot(self.parity),
            accum: &self.accum,
            revealage: self.revealage.write_slot(self.parity),
        };
        accumulate_fragments(&ctx, fragments)
    }

    /// Builder stage. Skipped when the weight strategy does not use the histogram.
    pub fn build_cdf(&mut self) -> CdfBuildStats {
        if !self.settings.weight_strategy.uses_histogram() {
            return CdfBuildStats::default();
        }
        build_cdf(&self.histogram, self.cdf.write_slot_mut(self.parity))
    }

    /// Resolver stage over this frame's accumulation images.
    pub fn resolve(&self) -> ResolvedImage {
        resolve(&self.accum, self.revealage.write_slot(self.parity))
    }

    pub fn end_frame(&mut self) {
        self.parity = self.parity.flip();
        self.frame += 1;
    }

    /// One full frame: Accumulator, then Builder, then Resolver.
    pub fn render_frame(&mut self, fragments: &[Fragment]) -> ResolvedImage {
        self.begin_frame();
        let accepted = self.accumulate(fragments);
        let stats = self.build_cdf();
        let image = self.resolve();
        log::debug!(
            "frame {}: {}/{} fragments, {} empty tiles, {} covered pixels",
            self.frame,
            accepted,
            fragments.len(),
            stats.empty_tiles,
            image.covered_pixels()
        );
        self.end_frame();
        image
    }

    pub fn settings(&self) -> &OitSettings {
        &self.settings
    }

    pub fn params(&self) -> &HistogramParams {
        &self.params
    }

    pub fn parity(&self) -> FrameParity {
        self.parity
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn histogram(&self) -> &HistogramBuffer {
        &self.histogram
    }

    /// CDF written by the most recent completed frame.
    pub fn latest_cdf(&self) -> &CdfTable {
        self.cdf.read_slot(self.parity)
    }

    pub fn accum(&self) -> &AccumImage {
        &self.accum
    }

    /// Revealage written by the most recent completed frame.
    pub fn latest_revealage(&self) -> &RevealageImage {
        self.revealage.read_slot(self.parity)
    }
}
