//! Template substitution for kinnect messages.
//!
//! Templates are plain strings containing `{token}` placeholders and optional
//! conditional sections:
//!
//! ```text
//! Hi {name},<!-- if:bonus --><p>{bonus}</p><!-- endif:bonus -->
//! ```
//!
//! A section whose named value is missing or blank is removed together with
//! everything between its markers. Otherwise only the markers are removed.
//! Sections are resolved first, then placeholders are substituted in a single
//! pass, so substituted text is never re-scanned. Unknown placeholders are left
//! as literal text.

mod statement;

pub use statement::{build_statement, StatementFields};

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid token regex"));

static SECTION_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*if:([A-Za-z_][A-Za-z0-9_]*)\s*-->").expect("valid section regex")
});

static SECTION_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*endif:([A-Za-z_][A-Za-z0-9_]*)\s*-->").expect("valid section regex")
});

/// Flat set of named values a template is rendered against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateValues {
    values: BTreeMap<String, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Insert only when a value is present; a `None` leaves the name unset.
    pub fn set_opt(&mut self, name: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(v) = value {
            self.set(name, v);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// A value counts as present when it is set and not blank.
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    /// Copy of these values with every value HTML-escaped.
    pub fn html_escaped(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), escape_html(v)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = TemplateValues::new();
        for (k, v) in iter {
            values.set(k, v);
        }
        values
    }
}

/// Render a template: drop empty conditional sections, then substitute.
pub fn render(template: &str, values: &TemplateValues) -> String {
    let resolved = resolve_sections(template, values);
    TOKEN
        .replace_all(&resolved, |caps: &Captures| match values.get(&caps[1]) {
            Some(v) => v.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Wrap `inner` in a conditional section keyed on `name`.
pub fn conditional_section(name: &str, inner: &str) -> String {
    format!("<!-- if:{name} -->{inner}<!-- endif:{name} -->")
}

fn resolve_sections(template: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let Some(caps) = SECTION_OPEN.captures(rest) else {
            break;
        };
        let (Some(marker), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let name = name.as_str();
        let body = &rest[marker.end()..];

        let close = SECTION_CLOSE
            .captures_iter(body)
            .filter_map(|c| Some((c.get(0)?, c.get(1)?)))
            .find(|(_, close_name)| close_name.as_str() == name)
            .map(|(m, _)| m);

        let Some(close) = close else {
            // Unterminated section: keep the marker as literal text.
            out.push_str(&rest[..marker.end()]);
            rest = body;
            continue;
        };

        out.push_str(&rest[..marker.start()]);
        if values.is_present(name) {
            out.push_str(&resolve_sections(&body[..close.start()], values));
        }
        rest = &body[close.end()..];
    }

    out.push_str(rest);
    out
}

/// Minimal HTML escaping for substituted values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bonus_template() -> String {
        format!(
            "Hi {{name}}, {}",
            conditional_section("bonusSection", "<p>{bonusSection}</p>")
        )
    }

    #[test]
    fn substitutes_known_tokens() {
        let values = TemplateValues::new().with("name", "Ada").with("company", "Acme");
        assert_eq!(
            render("{name} works at {company}.", &values),
            "Ada works at Acme."
        );
    }

    #[test]
    fn unknown_tokens_stay_literal() {
        let values = TemplateValues::new().with("name", "Ada");
        assert_eq!(render("Hi {name}, {missing}!", &values), "Hi Ada, {missing}!");
    }

    #[test]
    fn repeated_tokens_all_replaced() {
        let values = TemplateValues::new().with("n", "x");
        assert_eq!(render("{n}{n} {n}", &values), "xx x");
    }

    #[test]
    fn empty_section_removed_with_markup() {
        let values = TemplateValues::new().with("name", "Ada");
        let out = render(&bonus_template(), &values);
        assert_eq!(out, "Hi Ada, ");
        assert!(!out.contains("bonusSection"));
        assert!(!out.contains("<p>"));
        assert!(!out.contains("<!--"));
    }

    #[test]
    fn blank_value_counts_as_empty() {
        let values = TemplateValues::new()
            .with("name", "Ada")
            .with("bonusSection", "   ");
        assert_eq!(render(&bonus_template(), &values), "Hi Ada, ");
    }

    #[test]
    fn present_section_kept_and_substituted() {
        let values = TemplateValues::new()
            .with("name", "Ada")
            .with("bonusSection", "Free coffee");
        assert_eq!(
            render(&bonus_template(), &values),
            "Hi Ada, <p>Free coffee</p>"
        );
    }

    #[test]
    fn nested_sections() {
        let template = "A<!-- if:outer -->[{outer}<!-- if:inner -->({inner})<!-- endif:inner -->]<!-- endif:outer -->B";
        let only_outer = TemplateValues::new().with("outer", "o");
        assert_eq!(render(template, &only_outer), "A[o]B");

        let both = TemplateValues::new().with("outer", "o").with("inner", "i");
        assert_eq!(render(template, &both), "A[o(i)]B");

        let only_inner = TemplateValues::new().with("inner", "i");
        assert_eq!(render(template, &only_inner), "AB");
    }

    #[test]
    fn marker_whitespace_is_tolerated() {
        let template = "x<!--if:a-->{a}<!--   endif:a   -->y";
        assert_eq!(render(template, &TemplateValues::new()), "xy");
    }

    #[test]
    fn unterminated_section_left_literal() {
        let template = "x<!-- if:a -->{a}";
        let values = TemplateValues::new().with("a", "1");
        assert_eq!(render(template, &values), "x<!-- if:a -->1");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let values = TemplateValues::new()
            .with("a", "{b}")
            .with("b", "nope");
        assert_eq!(render("{a}", &values), "{b}");
    }

    #[test]
    fn css_braces_untouched() {
        let template = "<style>body { color: red; }</style>{name}";
        let values = TemplateValues::new().with("name", "Ada");
        assert_eq!(
            render(template, &values),
            "<style>body { color: red; }</style>Ada"
        );
    }

    #[test]
    fn html_escaping_of_values() {
        let values = TemplateValues::new().with("name", "<b>Tom & \"Jerry\"</b>");
        let escaped = values.html_escaped();
        assert_eq!(
            escaped.get("name"),
            Some("&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;")
        );
    }

    #[test]
    fn set_opt_skips_none() {
        let mut values = TemplateValues::new();
        values.set_opt("a", None::<String>);
        values.set_opt("b", Some("2"));
        assert_eq!(values.get("a"), None);
        assert_eq!(values.get("b"), Some("2"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let values: TemplateValues = [("name", "Ada"), ("bonusSection", "yes")]
            .into_iter()
            .collect();
        let template = bonus_template();
        assert_eq!(render(&template, &values), render(&template, &values));
    }
}
