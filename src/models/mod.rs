// src/models/mod.rs

pub mod assignment;
pub mod pagination;
pub mod progress;
pub mod quiz;
pub mod stats;
pub mod topic;
pub mod user;
