pub mod api;
pub mod capability;
pub mod client;
pub mod config;
pub mod error;
pub mod recognizer;
pub mod task;
pub mod upload;

#[cfg(test)]
mod testing;
