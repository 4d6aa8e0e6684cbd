pub mod api_client;
pub mod api_error;
pub mod api_result;
pub mod config;
pub mod resource;
pub mod resources;
pub mod session;
pub mod token_store;
