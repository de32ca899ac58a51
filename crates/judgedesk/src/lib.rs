//! Core library for the judging platform's applicant lifecycle service.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
