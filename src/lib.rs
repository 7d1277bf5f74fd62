pub mod archive;
pub mod auth;
pub mod config;
pub mod crm;
pub mod db;
pub mod error;
pub mod locks;
pub mod messages;
pub mod models;
pub mod onboarding;
pub mod requirements;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod store;
pub mod sync;
pub mod telegram;
pub mod utils;
