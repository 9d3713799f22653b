pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod events;
pub mod external;
pub mod server;

#[cfg(test)]
pub mod testing;
