//! Workflow scenario tests.
//!
//! - `common` - Shared test server, outbox, and account helpers
//! - `outreach_flow` - Outreach requests and identity resolution
//! - `referral_flow` - Referral submission and consent decisions
//! - `introduction_flow` - Direct introductions and mutual acceptance
//! - `auth_flow` - Registration and magic link sign-in

pub mod common;

mod outreach_flow;
