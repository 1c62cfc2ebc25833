//! Profile Onboarding: progressive, resumable profile questionnaire.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod onboarding;
pub mod progress;
pub mod remote;
pub mod store;
