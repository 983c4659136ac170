//! Submit software to Apple's notary service, wait for the verdict and staple
//! the ticket.
//!
//! The binary in `main.rs` is a thin shell over `workflow::Orchestrator`;
//! every external tool call goes through `runner::ToolRunner`.
pub mod classify;
pub mod cli;
pub mod error;
pub mod job;
pub mod logging;
pub mod notify;
pub mod output;
pub mod package;
pub mod poll;
pub mod report;
pub mod response;
pub mod retry;
pub mod runner;
pub mod settings;
pub mod staple;
pub mod submit;
pub mod util;
pub mod workflow;
