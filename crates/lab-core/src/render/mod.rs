//! Rendering Geometry
//!
//! Colors, the drawing collaborator seam, and label capabilities. Nothing here
//! talks to a window; a `Canvas` decides what a line or a label becomes.

pub mod canvas;
pub mod color;
pub mod label;

pub use canvas::{draw_world, label_anchor, Canvas, FrameRecorder};
pub use color::Color;
pub use label::{Labelable, LengthLabel, NoLabel, PositionLabel};
