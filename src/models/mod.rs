pub mod context;
pub mod enums;
pub mod extraction;

pub use context::*;
pub use extraction::*;
