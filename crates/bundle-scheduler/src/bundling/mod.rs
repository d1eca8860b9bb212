//! Turning extension proposals into one linear schedule.
mod extract;
mod incorporate;

pub use extract::extract_and_incorporate;
pub use incorporate::incorporate;
