//! Utility modules for the site regenerator.

pub mod date;
pub mod exec;
pub mod fs;
pub mod slug;
