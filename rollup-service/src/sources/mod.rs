pub mod window;

pub use window::{LabelWindow, SourceWindowLoader};
