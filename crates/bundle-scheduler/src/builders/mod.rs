mod context;
mod timing;

pub use context::{BlockBuilderCtx, should_discard_bundle};
