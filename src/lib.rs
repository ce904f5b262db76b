//! Survival match server: lifecycle coordinator for round-based elimination
//! matches, driven by a single-owner actor and a cancellable timer task.

pub mod app;
pub mod config;
pub mod game;
pub mod services;
pub mod util;
