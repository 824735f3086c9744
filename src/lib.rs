//! temporal-architect library crate.
//!
//! Generates cinematic before/after timelapse videos through the Veo
//! long-running video API. The `veo` module holds the generation client;
//! `config` and `cli` back the command-line front-end.

pub mod cli;
pub mod config;
pub mod veo;
