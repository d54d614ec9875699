pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod poa;
pub mod server;
pub mod state;
pub mod verify;
pub mod worker;
