// src/engine/mod.rs

pub mod assignment;
pub mod grading;
pub mod scheduler;
pub mod sessions;
pub mod violations;
