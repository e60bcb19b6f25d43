pub mod avi;
pub mod compiler;
pub mod overlay;

pub use compiler::{compile, CompileError, CompileReport};
pub use overlay::{Compositor, GlyphPainter, LabelPainter, MissingFont};
