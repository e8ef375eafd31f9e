//! External-interface adapters: the imagery provider contract

pub mod provider;

pub use provider::{ImageryProvider, InMemoryProvider};
