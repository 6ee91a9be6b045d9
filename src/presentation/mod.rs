// Presentation layer - Read-only projections of dashboard snapshots
pub mod console_view;
pub mod view_model;
