//! View geometry shared between the paint path and the engine's queries

mod rect;
mod view;

pub use rect::Rect;
pub use view::ViewGeometry;
