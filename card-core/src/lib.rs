//! # Card Core
//!
//! Template logic for ID card layouts: the element model, the rules applied
//! while a template is edited, and the composition of a template plus a data
//! record into a display list that every paint backend consumes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  card-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Model           │  Editing                 │
//! │  - Elements      │  - Transform resolver    │
//! │  - Templates     │  - Editor state          │
//! │  - Records       │  - Derived field sync    │
//! ├─────────────────────────────────────────────┤
//! │  Composition                                │
//! │  - Data binding  → Shape masks → Scene      │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod color;
pub mod editor;
pub mod element;
pub mod error;
pub mod mask;
pub mod scene;
pub mod template;
pub mod text;
pub mod transform;

pub use binding::{bind, BoundElement, BoundTemplate, Content, Record, PHOTO_FIELD};
pub use color::Rgba;
pub use editor::{Editor, EditorMode};
pub use element::{
    Bounds, CircleAttrs, CustomAttrs, Element, ElementKind, FontStyle, ImageAttrs, Paint,
    PatternRepeat, PolygonAttrs, RectAttrs, Shadow, ShapeType, StarAttrs, TextAlign, TextAttrs,
};
pub use error::{CardError, CardResult};
pub use mask::{ClipShape, Point, ShapeAsset, ShapeCatalog, ShapeMask};
pub use scene::{
    compose, compose_record, BackgroundLayer, CompositionOptions, Decoration, FillStyle,
    PaintBody, PaintItem, Placement, Scene, ShadowStyle, StrokeStyle, TextRun,
};
pub use template::{Background, Template, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
pub use text::TextLine;
pub use transform::{apply_transform, sync_derived, NodeTransform};

/// Card core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
