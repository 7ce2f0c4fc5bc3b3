//! character-tts-rs: voice cloning text-to-speech service.
//!
//! Accepts generation requests over HTTP, runs them as background tasks
//! through a chain of synthesis backends, and serves the resulting audio.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod server;
pub mod voice;

#[cfg(test)]
mod test_support;
