//! Emberflow library - audio-reactive curl-noise flame

pub mod audio;
pub mod camera;
pub mod cli;
pub mod error;
pub mod field;
pub mod gpu;
pub mod params;
pub mod pipeline;
pub mod raster;
pub mod style;
pub mod visual;
