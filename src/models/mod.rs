pub mod asset;
pub mod candidate;
pub mod document;
pub mod outcome;

pub use asset::*;
pub use candidate::*;
pub use document::*;
pub use outcome::*;
