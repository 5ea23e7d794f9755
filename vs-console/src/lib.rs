//! Team Assistant VS Console - trace timeline viewer
//!
//! This crate provides the terminal front-end for the Team Assistant
//! service: a polling client over the trace-events API feeding a text
//! timeline, with shell commands for the control endpoints.

pub mod api;
pub mod app;
pub mod config;
pub mod poller;
pub mod timeline;
