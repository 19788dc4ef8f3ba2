//! Newsletter template rendering.
//!
//! Templates are trusted HTML written by administrators. Two textual markers are
//! understood, both anchored to the complete token:
//!
//! - `{{name}}` is replaced by the value of field `name`
//! - `<!--IF:name-->…<!--ENDIF:name-->` keeps or drops the enclosed body
//!   depending on the boolean value of field `name`
//!
//! Values are inserted as-is, no HTML escaping takes place.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use regex::{Captures, Regex};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder reserved for the per-recipient unsubscribe link, filled at dispatch time
pub const UNSUBSCRIBE_URL_FIELD: &str = "unsubscribe_url";

lazy_static::lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\{\{([\w-]+)\}\}").unwrap();
    static ref IF_REGEX: Regex = Regex::new(r"<!--IF:([\w-]+)-->").unwrap();
    static ref FIELD_NAME_REGEX: Regex = Regex::new(r"^[\w-]+$").unwrap();
}

/// Whether `name` can be referenced by the `{{name}}` and `<!--IF:name-->` markers
pub fn is_field_name(name: &str) -> bool {
    FIELD_NAME_REGEX.is_match(name)
}

/// Value supplied for an editable field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => value.fmt(f),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl FieldValue {
    /// Read form-style text (`true`, `on`, `0`, ...) as a boolean, other values are kept
    pub fn coerce_flag(self) -> Self {
        match self {
            Self::Text(text) => match text.trim() {
                "true" | "on" | "1" => Self::Bool(true),
                "false" | "off" | "0" | "" => Self::Bool(false),
                _ => Self::Text(text),
            },
            value => value,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

pub type FieldValues = HashMap<String, FieldValue>;

/// Render a template with the given field values.
///
/// Conditional blocks are resolved first, then every placeholder is substituted
/// in a single pass, so inserted values are never scanned again. Markers whose
/// field has no value are left verbatim, as is a conditional without a
/// matching `ENDIF` or whose field is not boolean.
pub fn render(html: &str, values: &FieldValues) -> String {
    let rendered = substitute(html, values);

    let unresolved: Vec<&str> = unresolved_placeholders(&rendered)
        .into_iter()
        .filter(|name| *name != UNSUBSCRIBE_URL_FIELD)
        .collect();
    if !unresolved.is_empty() {
        tracing::warn!(?unresolved, "Template rendered with unresolved placeholders");
    }

    rendered
}

/// Same as [`render`] without reporting unresolved placeholders
pub fn substitute(html: &str, values: &FieldValues) -> String {
    let html = render_conditionals(html, values);

    PLACEHOLDER_REGEX
        .replace_all(&html, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Whether the markup itself still carries `{{name}}` once conditionals are resolved.
/// Field values are not considered.
pub fn keeps_placeholder(html: &str, values: &FieldValues, name: &str) -> bool {
    placeholders(&render_conditionals(html, values)).contains(name)
}

/// Values for ad-hoc HTML that has no declared fields: anything gating a
/// conditional block must read as a boolean.
pub fn coerce_conditionals(html: &str, values: &FieldValues) -> Result<FieldValues> {
    let mut values = values.clone();
    for key in conditional_keys(html) {
        if let Some(value) = values.remove(key) {
            match value.coerce_flag() {
                value @ FieldValue::Bool(_) => {
                    values.insert(key.to_string(), value);
                }
                FieldValue::Text(text) => {
                    return Err(Error::validation(format!(
                        "Value {:?} of {} gates a conditional block and must be true or false",
                        text, key
                    )))
                }
            }
        }
    }
    Ok(values)
}

fn render_conditionals<'h>(html: &'h str, values: &FieldValues) -> Cow<'h, str> {
    if !IF_REGEX.is_match(html) {
        return Cow::Borrowed(html);
    }

    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(caps) = IF_REGEX.captures(rest) {
        let (Some(open), Some(key)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let after_open = &rest[open.end()..];
        let close_tag = format!("<!--ENDIF:{}-->", key.as_str());

        match (values.get(key.as_str()), after_open.find(&close_tag)) {
            (Some(FieldValue::Bool(include)), Some(close)) => {
                out.push_str(&rest[..open.start()]);
                if *include {
                    out.push_str(&render_conditionals(&after_open[..close], values));
                }
                rest = &after_open[close + close_tag.len()..];
            }
            _ => {
                out.push_str(&rest[..open.end()]);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Names of every `{{name}}` placeholder in the document
pub fn placeholders(html: &str) -> BTreeSet<&str> {
    PLACEHOLDER_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .collect()
}

/// Names of every field gating a conditional block in the document
pub fn conditional_keys(html: &str) -> BTreeSet<&str> {
    IF_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .collect()
}

/// Placeholders still present after rendering
pub fn unresolved_placeholders(html: &str) -> BTreeSet<&str> {
    placeholders(html)
}
