pub mod commands;
pub mod config;
pub mod executor;
pub mod filter;
pub mod graph;
pub mod id;
pub mod job;
pub mod rect;
pub mod strategy;
pub mod suspend;
pub mod ui;

#[cfg(test)]
mod testing;

pub use id::UniqueID;
