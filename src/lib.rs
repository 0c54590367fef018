pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod reveal;
pub mod routes;
pub mod schema;
pub mod state;
pub mod token;
