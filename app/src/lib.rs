// ==============================================================================
// lib.rs - SNP Extractor Library
// ==============================================================================
// Description: Library interface for genome SNP extraction modules
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================

pub mod catalog;
pub mod config;
pub mod extraction;
pub mod license;
pub mod models;
pub mod output;
pub mod parsers;
pub mod processor;
pub mod validator;
