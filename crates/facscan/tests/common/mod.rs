//! Shared test utilities for facscan integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with temp input/output/review folders
//! - Fake collaborators: a rasterizer that draws generated pages, an OCR
//!   engine that returns scripted text and compressors with fixed behavior

pub mod harness;

pub use harness::TestHarness;
