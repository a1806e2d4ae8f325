//! Slicepack - CSS image slicing, sprite packing and compositing
//!
//! This library provides functionality to:
//! - Cut named regions out of source images, preferring `@2x` variants in retina mode
//! - Pack slices into sprites by repeat mode and composite the sprite images
//! - Rewrite stylesheet placeholders for sprited, data-URL or MHTML delivery

pub mod cli;
pub mod codec;
pub mod config;
pub mod encode;
pub mod engine;
pub mod error;
pub mod files;
pub mod models;
pub mod output;
pub mod report;
pub mod slicing;
pub mod sprite;

pub use engine::{BuildOutput, Engine, EngineOptions};
pub use error::{EngineError, SliceError, SpriteError};
pub use models::{Offsets, Repeat, SliceRequest};
pub use report::{Advisory, Diagnostics};
