//! Language model gateways for KernelTune.
//!
//! All gateways implement the `kerneltune_core::Provider` trait. The tuning
//! loop talks to a locally served, OpenAI-compatible endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
