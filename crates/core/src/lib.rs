#![deny(warnings)]

pub mod config;
pub mod letters;
pub mod mapping;
pub mod pipeline;
pub mod playback;
pub mod render;
pub mod sequence;
pub mod stats;
pub mod synth;
