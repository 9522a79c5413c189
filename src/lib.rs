pub mod appstate;
pub mod backend;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod pairing;
pub mod registry;
pub mod resource;
pub mod storage;
pub mod transport;
