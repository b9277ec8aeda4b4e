// Library exports for def2png

pub mod config;
pub mod event;
pub mod pipeline;
pub mod pipeline_worker;

pub use pipeline::{def, lod};
