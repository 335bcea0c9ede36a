pub mod api;
pub mod attendance;
pub mod commands;
pub mod config;
pub mod errors;
pub mod leave;
pub mod milestone;
pub mod models;
pub mod planner;
pub mod projects;
pub mod remote;
pub mod session;
pub mod shifts;
pub mod tasks;
pub mod timesheet;
pub mod tui;
pub mod week;
pub mod workload;
