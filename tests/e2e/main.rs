//! E2E test suite entry point.

mod fixture;
mod http_workflow;
mod scenarios;
