pub mod config;
pub mod contexts;
pub mod data;
pub mod memory;
pub mod registries;
