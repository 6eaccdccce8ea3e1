//! Driver layer for browser automation.
//!
//! This crate exposes the browser driver and page/element helpers used by
//! the page fetchers to collect content in a stealthy, reliable way.
//!
//! - [`scout_browser::driver::ScoutDriver`]: WebDriver client wrapper, one isolated session per instance
//! - [`scout_browser::page::ScoutPage`]: DOM helpers with bounded waits
//! - [`scout_browser::behavioral::BehavioralEngine`]: human‑like timings and typing
//! - [`scout_browser::fingerprint::UserAgentManager`]: plausible desktop fingerprints
//! - [`scout_browser::stealth`]: stealth profiles and JS evasions
pub mod scout_browser;
