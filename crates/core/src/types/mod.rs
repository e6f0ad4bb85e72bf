//! Core types for Techshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod preorder;
pub mod status;

pub use id::*;
pub use preorder::{ChangeSource, MissingPreorderId, PreorderChange, PreorderStatus};
pub use status::PreorderPhase;
