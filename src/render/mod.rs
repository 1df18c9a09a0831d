//! 渲染层：字体、批注排版、叠加图合成与区域预览

pub mod font;
pub mod layout;
pub mod overlay;
pub mod preview;

pub use font::OverlayFont;
pub use layout::{AnnotationLayout, Placement};
pub use overlay::{AnnotatedImage, OverlayCompositor, PanelPlacement, PlacedAnnotation};
pub use preview::{region_label, render_region_preview};
