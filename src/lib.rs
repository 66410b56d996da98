/// The default number of intervals a slab is split into when sampling it.
pub const DEFAULT_STEPS: usize = 1000;
/// The default distance the sampled window extends beyond a slab on either side.
pub const DEFAULT_MARGIN: f64 = 0.1;

pub mod axis;
pub mod composer;
pub mod document;
pub mod error;
pub mod layers;
pub mod sampler;
#[cfg(test)]
mod test_utils;

pub use error::{DistributionError, Result};
