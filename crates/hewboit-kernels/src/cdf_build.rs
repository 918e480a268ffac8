use std::ops::Add;
use std::sync::atomic::Ordering;

use rayon::prelude::*;

use crate::cdf::CdfTable;
use crate::histogram::HistogramBuffer;

/// Output of the lane-synchronous scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult<T> {
    /// Inclusive prefix sums, one per lane.
    pub values: Vec<T>,
    /// Barriers between doubling steps: `ceil(log2(lanes))`.
    pub step_barriers: u32,
    /// Step barriers plus the barrier after the initial load.
    pub total_barriers: u32,
}

/// Inclusive Hillis–Steele scan, executed the way one workgroup runs it.
///
/// Every lane reads from `ping` and writes to `pong` within a step, then all
/// lanes meet at a barrier and the buffers swap. No lane ever reads a slot
/// another lane is writing in the same step.
///
/// Lanes add in different orders, so only an exact `T` (integers) gives a
/// non-decreasing result. Float input is for comparison against the
/// sequential reference.
pub fn inclusive_scan_hillis_steele<T>(values: &[T]) -> ScanResult<T>
where
    T: Copy + Default + Add<Output = T>,
{
    let lanes = values.len();
    let mut ping = values.to_vec();
    let mut pong = vec![T::default(); lanes];
    // workgroupBarrier() after the load
    let mut total_barriers = 1;
    let mut step_barriers = 0;

    let mut stride = 1;
    while stride < lanes {
        for lane in 0..lanes {
            pong[lane] = if lane >= stride {
                ping[lane] + ping[lane - stride]
            } else {
                ping[lane]
            };
        }
        std::mem::swap(&mut ping, &mut pong);
        step_barriers += 1;
        total_barriers += 1;
        stride *= 2;
    }

    ScanResult {
        values: ping,
        step_barriers,
        total_barriers,
    }
}

/// Linear running sum used as the reference for the parallel scan.
pub fn sequential_inclusive_scan<T>(values: &[T]) -> Vec<T>
where
    T: Copy + Default + Add<Output = T>,
{
    values
        .iter()
        .scan(T::default(), |acc, &v| {
            *acc = *acc + v;
            Some(*acc)
        })
        .collect()
}

/// Per-frame CDF build summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CdfBuildStats {
    pub tiles: usize,
    /// Tiles with zero accumulated optical depth that received the uniform ramp.
    pub empty_tiles: usize,
}

/// Build one tile's CDF into `cdf_tile` and clear that tile's histogram row.
///
/// The scan runs on the fixed-point cells widened to `u64` (64 saturated
/// cells still fit), so prefixes are exact and the ratio to the total is
/// non-decreasing. The fixed-point scale cancels in that ratio.
///
/// Returns true when the tile had no accumulated optical depth.
pub fn build_tile_cdf(histogram: &HistogramBuffer, tile: usize, cdf_tile: &mut [f32]) -> bool {
    let num_bins = histogram.num_bins();
    debug_assert_eq!(cdf_tile.len(), num_bins as usize);

    let loaded: Vec<u64> = histogram
        .tile_cells(tile)
        .iter()
        .map(|cell| u64::from(cell.load(Ordering::Relaxed)))
        .collect();
    let scan = inclusive_scan_hillis_steele(&loaded);
    let total = scan.values.last().copied().unwrap_or(0);
    let empty = total == 0;

    for (bin, (out, &prefix)) in cdf_tile.iter_mut().zip(&scan.values).enumerate() {
        *out = if empty {
            (bin + 1) as f32 / num_bins as f32
        } else {
            (prefix as f64 / total as f64) as f32
        };
        // Same lane, after its own read: no other lane observes the clear
        histogram.clear_cell(tile, bin as u32);
    }
    empty
}

/// Build every tile's CDF in parallel, leaving the histogram zeroed.
pub fn build_cdf(histogram: &HistogramBuffer, cdf: &mut CdfTable) -> CdfBuildStats {
    debug_assert_eq!(histogram.num_bins(), cdf.num_bins());
    let num_bins = cdf.num_bins() as usize;

    let empty_tiles = cdf
        .values_mut()
        .par_chunks_mut(num_bins)
        .enumerate()
        .map(|(tile, cdf_tile)| build_tile_cdf(histogram, tile, cdf_tile))
        .filter(|&empty| empty)
        .count();
    let stats = CdfBuildStats {
        tiles: histogram.len() / num_bins,
        empty_tiles,
    };
    log::debug!(
        "CDF build: {} tiles, {} empty",
        stats.tiles,
        stats.empty_tiles
    );
    stats
}
