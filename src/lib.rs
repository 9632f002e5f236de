//! Alfred: a conversational assistant with a remote model, a local fallback,
//! and explicit confirmation for sensitive actions.

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;
pub mod workspace;
