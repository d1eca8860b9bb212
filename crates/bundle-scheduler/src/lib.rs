pub mod args;
pub mod backrun_bundle;
pub mod builders;
pub mod bundling;
pub mod error;
pub mod metrics;
pub mod primitives;
pub mod traits;
pub mod tx;

#[cfg(test)]
mod test_utils;
