//! macOS packaging: drag-to-install disk images.

pub mod dmg;
