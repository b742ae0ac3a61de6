//! Mark placement, drag, resize and viewport engine for annotating ECU photos.
//!
//! The crate is split the way data flows: pointer input enters the
//! [`editor::Editor`] state machine, which drives either the
//! [`viewport::Viewport`] or the active module's [`store::MarkStore`], and the
//! [`render`] layer turns the result back into screen geometry.

pub mod config;
pub mod editor;
pub mod geometry;
pub mod interaction;
pub mod logging;
pub mod mark;
pub mod module;
pub mod photo;
pub mod render;
pub mod storage;
pub mod store;
pub mod viewport;

pub use config::EditorConfig;
pub use editor::{ChangeSink, Dialog, Editor, MarkEditor};
pub use geometry::{NormPos, Stage};
pub use interaction::{Interaction, PointerButton};
pub use mark::{Mark, MarkId, MarkShape, ResizeHandle, TextBox, Tool};
pub use module::{Module, ModuleId, ModuleLibrary};
pub use render::{HitTarget, MarkView, SearchFilter};
pub use storage::LocalStore;
pub use store::MarkStore;
pub use viewport::{Viewport, ZoomDirection};
