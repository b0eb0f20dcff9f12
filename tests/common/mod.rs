//! Shared test utilities for pmm-admin
//!
//! - Fake pmm-agent, PMM Server, vmagent and pprof endpoints
//! - Summary archive inspection
//! - Captured log output
