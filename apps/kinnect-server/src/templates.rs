//! Message templates for every notification kind.
//!
//! Each kind has a subject, an HTML body and an SMS text. Built-in defaults
//! can be replaced per kind from a JSON file at startup, and any part can be
//! replaced again for a single dispatch with a [`TemplateOverride`].
//!
//! Tokens available to all kinds: `{recipient_name}`, `{sender_name}`,
//! `{action_url}` (empty when the message carries no link). Kind specific
//! tokens are listed next to each default below.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use kinnect_storage::NotificationKind;
use kinnect_template::{conditional_section, render, TemplateValues};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<head>.*?</head>").expect("valid head regex")
});
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\b[^>]*\bhref="([^"]*)"[^>]*>(.*?)</a>"#).expect("valid link regex")
});
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)*").expect("valid blank line regex"));

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse template file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown notification kind in template file: {0}")]
    UnknownKind(String),
}

/// One kind's templates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub subject: String,
    pub html: String,
    pub sms: String,
}

/// Partial replacement of a [`MessageTemplate`]. Unset parts keep the
/// template they are applied to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOverride {
    pub subject: Option<String>,
    pub html: Option<String>,
    pub sms: Option<String>,
}

impl TemplateOverride {
    pub fn apply_to(&self, base: &MessageTemplate) -> MessageTemplate {
        MessageTemplate {
            subject: self.subject.clone().unwrap_or_else(|| base.subject.clone()),
            html: self.html.clone().unwrap_or_else(|| base.html.clone()),
            sms: self.sms.clone().unwrap_or_else(|| base.sms.clone()),
        }
    }
}

/// Output of rendering a template against one recipient's values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub sms: String,
}

impl MessageTemplate {
    /// Subject and SMS get raw values. The HTML body gets escaped values.
    pub fn render(&self, values: &TemplateValues) -> RenderedMessage {
        let html = render(&self.html, &values.html_escaped());
        RenderedMessage {
            subject: render(&self.subject, values),
            text: html_to_text(&html),
            html,
            sms: render(&self.sms, values),
        }
    }
}

/// Plain-text alternative of an HTML body.
fn html_to_text(html: &str) -> String {
    let without_head = HEAD.replace_all(html, "");
    let links_inline = LINK.replace_all(&without_head, "$2: $1");
    let stripped = TAG.replace_all(&links_inline, "");
    let unescaped = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let lines: Vec<&str> = unescaped.lines().map(str::trim).collect();
    BLANK_LINES
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned()
}

/// The full set of templates in effect for this process.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    templates: HashMap<NotificationKind, MessageTemplate>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl TemplateSet {
    /// Built-in templates for every kind.
    pub fn defaults() -> Self {
        let templates = NotificationKind::ALL
            .into_iter()
            .map(|kind| (kind, default_template(kind)))
            .collect();
        Self { templates }
    }

    /// Defaults with the per-kind overrides from a JSON object keyed by kind
    /// name, e.g. `{"outreach_request": {"subject": "..."}}`.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let overrides: HashMap<String, TemplateOverride> = serde_json::from_str(json)?;
        let mut set = Self::defaults();
        for (name, over) in overrides {
            let kind = NotificationKind::from_str(&name)
                .map_err(|_| TemplateError::UnknownKind(name.clone()))?;
            let merged = over.apply_to(set.get(kind));
            set.templates.insert(kind, merged);
        }
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, kind: NotificationKind) -> &MessageTemplate {
        // Every kind is populated by `defaults()` and never removed.
        &self.templates[&kind]
    }

    /// Template for one dispatch, with the caller's override applied.
    pub fn resolve(
        &self,
        kind: NotificationKind,
        over: Option<&TemplateOverride>,
    ) -> MessageTemplate {
        let base = self.get(kind);
        match over {
            Some(o) => o.apply_to(base),
            None => base.clone(),
        }
    }
}

fn layout(heading: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background: #f5f5f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #1a1a1a; margin-top: 0; font-size: 22px; }}
        .statement {{ border-left: 3px solid #2563eb; padding-left: 16px; color: #444; }}
        .button {{ display: inline-block; background: #2563eb; color: white; padding: 12px 24px; border-radius: 6px; text-decoration: none; }}
        .footer {{ margin-top: 32px; padding-top: 20px; border-top: 1px solid #eee; color: #888; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>{heading}</h1>
{content}
            <div class="footer">
                <p>You received this because someone you know used Kinnect.</p>
            </div>
        </div>
    </div>
</body>
</html>"#
    )
}

fn action_button(label: &str) -> String {
    conditional_section(
        "action_url",
        &format!(r#"<p><a class="button" href="{{action_url}}">{label}</a></p>"#),
    )
}

fn default_template(kind: NotificationKind) -> MessageTemplate {
    use NotificationKind::*;

    match kind {
        // {statement}, {message}
        OutreachRequest => MessageTemplate {
            subject: "{sender_name} would like your help with an introduction".into(),
            html: layout(
                "{sender_name} is asking for an introduction",
                &format!(
                    "<p>Hi {{recipient_name}},</p>\n<p>{{sender_name}} thinks you might know someone they should meet.</p>\n{}\n{}\n{}",
                    conditional_section("message", "<p>{message}</p>"),
                    conditional_section(
                        "statement",
                        r#"<p class="statement">{statement}</p>"#
                    ),
                    action_button("Suggest an introduction"),
                ),
            ),
            sms: "Hi {recipient_name}, {sender_name} would like your help with an introduction: {action_url}".into(),
        },
        // {referee_name}, {statement}
        ReferralRequest => MessageTemplate {
            subject: "{sender_name} would like to introduce you to {referee_name}".into(),
            html: layout(
                "An introduction from {sender_name}",
                &format!(
                    "<p>Hi {{recipient_name}},</p>\n<p>{{sender_name}} would like to introduce you to {{referee_name}}.</p>\n{}\n<p>Nothing is shared with {{referee_name}} unless you agree.</p>\n{}",
                    conditional_section(
                        "statement",
                        r#"<p class="statement">{statement}</p>"#
                    ),
                    action_button("Respond"),
                ),
            ),
            sms: "Hi {recipient_name}, {sender_name} would like to introduce you to {referee_name}. Respond: {action_url}".into(),
        },
        // {referral_name}, {referral_contact}, {first_degree_name}
        ReferralApprovedReferee => MessageTemplate {
            subject: "{referral_name} accepted your introduction".into(),
            html: layout(
                "{referral_name} said yes",
                "<p>Hi {recipient_name},</p>\n<p>{referral_name} accepted the introduction {first_degree_name} made for you.</p>\n<p>You can reach them at <strong>{referral_contact}</strong>.</p>",
            ),
            sms: "{referral_name} accepted your introduction via {first_degree_name}. Contact: {referral_contact}".into(),
        },
        // {referee_name}, {referral_name}
        ReferralApprovedFirstDegree => MessageTemplate {
            subject: "Thanks for introducing {referee_name}".into(),
            html: layout(
                "Your introduction was accepted",
                "<p>Hi {recipient_name},</p>\n<p>{referral_name} accepted your introduction to {referee_name}. Thank you for making the connection.</p>",
            ),
            sms: "{referral_name} accepted your introduction to {referee_name}. Thank you!".into(),
        },
        // {referee_name}, {referee_contact}
        ReferralApprovedReferral => MessageTemplate {
            subject: "You're connected with {referee_name}".into(),
            html: layout(
                "You're connected",
                "<p>Hi {recipient_name},</p>\n<p>Thanks for accepting the introduction to {referee_name}.</p>\n<p>You can reach them at <strong>{referee_contact}</strong>.</p>",
            ),
            sms: "You're connected with {referee_name}. Contact: {referee_contact}".into(),
        },
        // {first_degree_name}
        ReferralDeniedReferee => MessageTemplate {
            subject: "An update on your introduction request".into(),
            html: layout(
                "Introduction update",
                "<p>Hi {recipient_name},</p>\n<p>One of the introductions {first_degree_name} suggested for you won't be going ahead this time.</p>",
            ),
            sms: "An introduction {first_degree_name} suggested for you won't be going ahead this time.".into(),
        },
        // {other_name}, {other_company}, {note}
        IntroductionRequest => MessageTemplate {
            subject: "{sender_name} would like to introduce you to {other_name}".into(),
            html: layout(
                "An introduction from {sender_name}",
                &format!(
                    "<p>Hi {{recipient_name}},</p>\n<p>{{sender_name}} would like to introduce you to {{other_name}}{}.</p>\n{}\n{}",
                    conditional_section("other_company", " of {other_company}"),
                    conditional_section("note", "<p>{note}</p>"),
                    action_button("Respond"),
                ),
            ),
            sms: "{sender_name} would like to introduce you to {other_name}. Respond: {action_url}".into(),
        },
        // {other_name}, {other_contact}
        IntroductionMutual => MessageTemplate {
            subject: "You and {other_name} are connected".into(),
            html: layout(
                "It's mutual",
                "<p>Hi {recipient_name},</p>\n<p>You and {other_name} both accepted the introduction from {sender_name}.</p>\n<p>You can reach them at <strong>{other_contact}</strong>.</p>",
            ),
            sms: "You and {other_name} both accepted. Contact: {other_contact}".into(),
        },
        // {expires_minutes}
        MagicLink => MessageTemplate {
            subject: "Your Kinnect sign-in link".into(),
            html: layout(
                "Sign in to Kinnect",
                &format!(
                    "<p>Hi {{recipient_name}},</p>\n{}\n<p>This link expires in {{expires_minutes}} minutes and can be used once.</p>",
                    action_button("Sign in"),
                ),
            ),
            sms: "Your Kinnect sign-in link (expires in {expires_minutes} minutes): {action_url}".into(),
        },
    }
}
