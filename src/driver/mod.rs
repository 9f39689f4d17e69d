//! Browser driver abstraction

pub mod mock;
pub mod quirks;
pub mod traits;

pub use quirks::Quirks;
pub use traits::{describe_element, BrowserKind, Driver, ElementHandle, Point};
