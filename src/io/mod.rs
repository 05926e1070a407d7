pub mod input;
pub mod report;
pub mod staging;

pub use input::*;
pub use report::*;
pub use staging::*;
