//! Common utilities and types shared across Object Gateway components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (header decoding, size limits, clock skew)
pub mod jwt;
