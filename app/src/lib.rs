//! File Zipper — open a text file, show it, and pack it into a single-entry ZIP.

pub mod api;
pub mod archiver;
pub mod config;
pub mod error;
pub mod loader;
pub mod session;
pub mod state;
pub mod zip_utils;
