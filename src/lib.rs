pub mod claims;
pub mod config;
pub mod guard;
pub mod provider;
pub mod services;
pub mod session;
pub mod types;
