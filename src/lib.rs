pub mod api;
pub mod color;
pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod geometry;
pub mod orchestrator;
pub mod output;
pub mod render;
pub mod stats;

#[cfg(test)]
mod testing;
