//! Process-wide application state

mod state;

pub use state::AppState;
