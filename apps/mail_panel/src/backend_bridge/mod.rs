//! Bridge between the UI command queue and the backend worker that owns the controller.

pub mod commands;
pub mod runtime;
