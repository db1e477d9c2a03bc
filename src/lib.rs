//! HubEdit - raster edit pipeline.
//!
//! A single owned [`PixelBuffer`] is edited through the [`Editor`] controller:
//! non-destructive filters and text overlays are composited at preview time,
//! destructive operations (crop, resize, flip, kernel convolution, burn-in)
//! replace the buffer and are recorded in a linear undo/redo history.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod settings;
pub mod worker;

pub use canvas::{CropRegion, PixelBuffer};
pub use components::history::{HistoryManager, HistorySnapshot};
pub use editor::{EditCommand, Editor, Outcome};
pub use error::{EditorError, Result};
pub use ops::filters::{FilterPreset, FilterStage, FilterState};
pub use ops::text::{GlyphRasterizer, TextOverlay, TextOverlayPatch};
pub use ops::transform::{FlipAxis, Interpolation, ResizeSpec};
pub use settings::EditorSettings;
pub use worker::EditorWorker;
