//! Scenario tests
//!
//! Drive the engine and the controller end to end against a recording
//! renderer and a manual clock:
//! - Cursor resets on seeks and overshoot
//! - OSD precedence and expiry
//! - Delay, pause and source switching
//! - Prepare failures and bitmap geometry
//! - Stop latency and thread lifecycle

pub mod timing;
