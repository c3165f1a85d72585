// Library exports for the content center
// Integration tests build the router through these modules

pub mod auth;
pub mod chat;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod events;
pub mod extractors;
pub mod graphql;
pub mod preferences;
pub mod routes;
pub mod state;
pub mod storage;
