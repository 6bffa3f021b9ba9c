//! Presentation: HTML fragments for each panel region and the timed notice board.

pub mod notices;
pub mod render;
