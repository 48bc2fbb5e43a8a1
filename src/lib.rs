// Library exports for the F5-TTS service controller

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod process;
