pub mod config;
pub mod destination;
pub mod frame;
