// Public API for integration tests and embedding

pub mod app;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod origin;
pub mod protocol;
pub mod settings;
pub mod state;
pub mod stone;
pub mod ticker;
pub mod types;
pub mod ws;
pub mod xp;

// Sandbox-only helpers, public for testing
pub mod api;
pub mod broadcast;
