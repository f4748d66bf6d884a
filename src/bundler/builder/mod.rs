//! Release orchestration and coordination.
//!
//! This module provides the main [`Pipeline`] orchestrator that coordinates
//! DMG assembly, feed reconciliation and publishing.
//!
//! # Overview
//!
//! The pipeline:
//! 1. Reads configuration from [`ReleaseConfig`](crate::bundler::ReleaseConfig)
//! 2. Assembles the DMG through the macOS platform module
//! 3. Upserts the release into the appcast feed
//! 4. Publishes the DMG, the feed and the release notes
//! 5. Returns a [`PublishReport`](crate::bundler::PublishReport) with sizes and checksums
//!
//! # Module Organization
//!
//! - [`checksum`] - SHA256 checksum calculation for artifacts
//! - [`orchestrator`] - Main [`Pipeline`] struct and stage entry points
//! - [`tool_detection`] - External tool availability checking

pub mod checksum;
mod orchestrator;
pub mod tool_detection;

pub use checksum::calculate_sha256;
pub use orchestrator::Pipeline;
