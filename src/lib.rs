/// Basic application code
pub mod app;
/// Administrator authentication
pub mod auth;
/// REST clients for outside services
pub mod client;
/// Controllers for REST endpoints
pub mod controller;
/// Cryptography-related objects
pub mod crypto;
/// Database connection
pub mod db;
/// Domain objects
pub mod domain;
/// Core error taxonomy
pub mod error;
/// Stored records and their state transitions
pub mod model;
/// Repositories
pub mod repo;
/// Newsletter, subscription and audit workflows
pub mod service;
/// Application settings
pub mod settings;
/// Application telemetry for tracing and logging
pub mod telemetry;
/// Template rendering
pub mod template;
