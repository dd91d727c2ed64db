//! Core library for redraft: llama-server supervision and streaming inference.

pub mod client;
pub mod config;
pub mod server;
