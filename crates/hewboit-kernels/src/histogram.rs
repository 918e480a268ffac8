use std::sync::atomic::{AtomicU32, Ordering};

use hewboit_core::{ConfigError, HistogramParams};

/// Per-tile depth histogram of quantized optical depth.
///
/// One `AtomicU32` per (tile, bin), laid out `tile * num_bins + bin`. Cells
/// saturate at `u32::MAX` instead of wrapping into a neighbor's magnitude.
pub struct HistogramBuffer {
    cells: Vec<AtomicU32>,
    params: HistogramParams,
}

impl HistogramBuffer {
    /// Zeroed histogram sized for `params`.
    pub fn new(params: &HistogramParams) -> Self {
        let cells = (0..params.cell_count()).map(|_| AtomicU32::new(0)).collect();
        Self {
            cells,
            params: *params,
        }
    }

    /// Wrap existing cell values. Fails when the length does not match the grid.
    pub fn from_cells(params: &HistogramParams, cells: Vec<u32>) -> Result<Self, ConfigError> {
        if cells.len() != params.cell_count() {
            return Err(ConfigError::BufferSizeMismatch {
                resource: "histogram",
                expected: params.cell_count(),
                actual: cells.len(),
            });
        }
        Ok(Self {
            cells: cells.into_iter().map(AtomicU32::new).collect(),
            params: *params,
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn num_bins(&self) -> u32 {
        self.params.num_bins
    }

    fn index(&self, tile: usize, bin: u32) -> usize {
        debug_assert!(bin < self.params.num_bins, "bin {bin} out of range");
        self.params.cell_index(tile, bin)
    }

    /// Atomically add `quantized` to the cell and return the new value.
    ///
    /// Saturates at `u32::MAX`. The CAS loop retries on contention, so
    /// concurrent adds are never lost.
    pub fn add(&self, tile: usize, bin: u32, quantized: u32) -> u32 {
        let cell = &self.cells[self.index(tile, bin)];
        match cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_add(quantized))
        }) {
            Ok(prev) | Err(prev) => prev.saturating_add(quantized),
        }
    }

    pub fn load(&self, tile: usize, bin: u32) -> u32 {
        self.cells[self.index(tile, bin)].load(Ordering::Relaxed)
    }

    /// All bins of one tile.
    pub fn tile_cells(&self, tile: usize) -> &[AtomicU32] {
        let start = self.params.cell_index(tile, 0);
        &self.cells[start..start + self.params.num_bins as usize]
    }

    pub fn clear_cell(&self, tile: usize, bin: u32) {
        self.cells[self.index(tile, bin)].store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    pub fn is_clear(&self) -> bool {
        self.cells.iter().all(|c| c.load(Ordering::Relaxed) == 0)
    }
}
