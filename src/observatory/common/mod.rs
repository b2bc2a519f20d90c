pub mod math;
pub mod target;
