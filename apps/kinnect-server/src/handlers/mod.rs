//! Workflow operations, one module per inbound trigger family.

pub mod accounts;
pub mod auth;
pub mod contacts;
pub mod introductions;
pub mod notifications;
pub mod outreach;
pub mod referrals;

use kinnect_template::StatementFields;
use serde::{Deserialize, Serialize};

use crate::notify::ChannelFlags;
use crate::templates::TemplateOverride;

/// Caller-supplied knobs for a dispatch of outbound requests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    pub template_override: Option<TemplateOverride>,
    pub channels: ChannelFlags,
    /// Free-text note included with the request.
    pub message: Option<String>,
    /// Sender's profile facts for the personal statement.
    pub statement: StatementFields,
}
