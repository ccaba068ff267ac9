// ==============================================================================
// lib.rs - Viral Report Library
// ==============================================================================
// Description: Library interface for viral-sequencing report assembly modules
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

pub mod coverage;
pub mod locator;
pub mod models;
pub mod output;
pub mod parsers;
pub mod processor;
pub mod qc;
pub mod run_log;
pub mod sample_name;
pub mod table;
pub mod variants;
