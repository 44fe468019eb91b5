pub mod document;
pub mod enums;
pub mod extraction;
pub mod interaction;

pub use document::*;
pub use enums::*;
pub use extraction::*;
pub use interaction::*;
