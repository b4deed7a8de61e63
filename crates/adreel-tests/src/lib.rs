//! Integration test crate for AdReel.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on multiple adreel crates to verify they work together.

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod render;

#[cfg(test)]
mod regeneration;
