//! Command-line interface for benchscope
//!
//! This module contains CLI argument parsing and configuration

pub mod args;

pub use args::{AgentArgs, Args, Command, CredentialArgs, ServeArgs, ToolArgs};
