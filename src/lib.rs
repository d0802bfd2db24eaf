//! Nodeserve - build and serve a static web app from a GitHub repository
//!
//! Provisions a pinned Node.js toolchain and a snapshot of the project
//! sources, runs the project's install and build scripts, and serves the
//! build output over HTTP.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod reference;
pub mod server;
pub mod source;
pub mod toolchain;

pub use error::{NodeserveError, NodeserveResult};
