//! CPU reference kernels for histogram-equalized weighted OIT.
//!
//! Each kernel mirrors a GPU stage in `hewboit-render` and is safe to run
//! with any interleaving of invocations: histogram cells are atomic counters
//! and the accumulation images combine with atomic sum and product.

pub mod accumulate;
pub mod cdf;
pub mod cdf_build;
pub mod frame;
pub mod histogram;
pub mod images;
pub mod resolve;

#[cfg(test)]
mod test_harness;

pub use accumulate::{accumulate_fragment, accumulate_fragments, AccumulateContext, Fragment};
pub use cdf::CdfTable;
pub use cdf_build::{build_cdf, build_tile_cdf, CdfBuildStats};
pub use frame::ReferencePipeline;
pub use histogram::HistogramBuffer;
pub use images::{AccumImage, AtomicF32, RevealageImage};
pub use resolve::{resolve, resolve_pixel, ResolvedImage};
