// src/storage/mod.rs

//! Durable progress storage.

pub mod checkpoint;

pub use checkpoint::{CheckpointStore, JobLock};
