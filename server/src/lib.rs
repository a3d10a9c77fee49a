//! Real-time presence and messaging server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod calls;
pub mod chat;
pub mod config;
pub mod db;
pub mod dm;
pub mod error;
pub mod live;
pub mod media;
pub mod moderation;
pub mod notifications;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod ws;
