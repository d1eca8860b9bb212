pub mod bundle;
pub mod execution;
pub mod schedule;
