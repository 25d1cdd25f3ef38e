//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management and bridge injection
//! - Event bus for broadcast notifications
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback crate depends
//! on. It establishes the logging conventions and the broadcast mechanism
//! through which observers without a direct delegate reference learn about
//! playback.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
