//! Target-signal preprocessing
//!
//! The solver requires the target amplitude-normalized to a known reference
//! range; peak normalization runs once before the dictionary is built.

pub mod normalization;
