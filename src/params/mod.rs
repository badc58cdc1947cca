//! Parameter definitions with units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Units (world units, ticks, Hz, milliseconds)
//! - Documented ranges and meanings
//! - A `validate` pass run once at startup

mod audio;
mod field;
mod render;

// Re-export all types
pub use audio::AnalysisConfig;
pub use field::FieldPhysics;
pub use render::{RecordingConfig, RenderConfig};
