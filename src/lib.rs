pub mod adapters;
pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod core_loop;
pub mod error;
pub mod logging;
pub mod periodic;
pub mod ports;
pub mod service;
pub mod session;
pub mod side_effects;
pub mod signal;
#[doc(hidden)]
pub mod testing;
pub mod types;
pub mod viewer;
