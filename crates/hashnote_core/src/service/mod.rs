//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own transaction boundaries so note writes and tag counts move together.

pub mod note_service;
pub mod tag_service;
