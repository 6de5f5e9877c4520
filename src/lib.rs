//! ChatClass — multi-tenant classroom chat front-end for hosted AI agents.

pub mod api;
pub mod assistant;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod provision;
pub mod store;
