//! Builds the referee's one-paragraph personal statement used in outreach
//! messages.

use serde::{Deserialize, Serialize};

/// Optional profile facts a referee can supply for their statement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementFields {
    pub skills: Vec<String>,
    pub company: Option<String>,
    pub achievement: Option<String>,
    pub achievement_method: Option<String>,
    pub intro_request: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Join a list as `a`, `a and b`, `a, b and c`.
fn join_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Assemble the statement in a fixed clause order, skipping any clause whose
/// field is absent. A method without an achievement is ignored.
pub fn build_statement(fields: &StatementFields) -> String {
    let mut clauses = Vec::new();

    let skills: Vec<&str> = fields
        .skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !skills.is_empty() {
        clauses.push(format!("I specialize in {}.", join_list(&skills)));
    }

    if let Some(company) = present(&fields.company) {
        clauses.push(format!("I currently work at {company}."));
    }

    if let Some(achievement) = present(&fields.achievement) {
        match present(&fields.achievement_method) {
            Some(method) => clauses.push(format!("Recently, I {achievement} by {method}.")),
            None => clauses.push(format!("Recently, I {achievement}.")),
        }
    }

    if let Some(request) = present(&fields.intro_request) {
        clauses.push(format!("I'd love an introduction to {request}."));
    }

    clauses.join(" ")
}
