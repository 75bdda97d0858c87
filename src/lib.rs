pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod relay;
pub mod services;
