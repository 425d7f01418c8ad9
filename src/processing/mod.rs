//! Processing module for path filtering and file preparation.
//!
//! This module provides:
//! - Security and noise filtering of enumerated paths
//! - Language detection from file names, extensions and shebangs
//! - Bounded reading, binary detection and encoding normalization

pub mod file_processor;
pub mod filter;
pub mod language;

pub use file_processor::{FileProcessor, FileStats, ProcessedFile};
pub use filter::{FileFilter, FilterOutcome, FilterRejection};
pub use language::{Language, LanguageDetector, ScriptGrammar};
