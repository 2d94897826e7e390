pub mod color;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layers;
pub mod loader;
pub mod removal;
pub mod surface;
pub mod text;

pub use compositor::{Composite, CompositionInput, Compositor, CompositorOptions, FinalRasterArtifact};
pub use editor::EditorState;
pub use error::{CompositeError, CompositeWarning, LoadError, RemovalError};
