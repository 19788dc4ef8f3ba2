use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::template::{self, FieldValue, FieldValues, UNSUBSCRIBE_URL_FIELD};

/// Kind of input an editable field is presented with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Color,
    Boolean,
    Image,
}

/// A named, typed input that parameterizes a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableField {
    /// Unique key within the template, referenced as `{{name}}` or `<!--IF:name-->`
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub default_value: Option<FieldValue>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

impl EditableField {
    /// Interpret a value for this field, booleans may arrive as text from HTML forms
    fn coerce(&self, value: FieldValue) -> FieldValue {
        match self.field_type {
            FieldType::Boolean => value.coerce_flag(),
            _ => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Newsletter,
    Announcement,
    Custom,
}

impl Default for TemplateKind {
    fn default() -> Self {
        Self::Newsletter
    }
}

impl AsRef<str> for TemplateKind {
    fn as_ref(&self) -> &str {
        match self {
            Self::Newsletter => "newsletter",
            Self::Announcement => "announcement",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for TemplateKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "newsletter" => Ok(Self::Newsletter),
            "announcement" => Ok(Self::Announcement),
            "custom" => Ok(Self::Custom),
            other => Err(Error::validation(format!(
                "{} is not a valid template type",
                other
            ))),
        }
    }
}

/// Template document as authored by an administrator.
/// Used both for creation and for full-document replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub html_content: String,
    #[serde(default)]
    pub editable_fields: Vec<EditableField>,
    #[serde(default, rename = "type")]
    pub kind: TemplateKind,
}

impl NewTemplate {
    /// Check the document before it is stored: every marker in the HTML must
    /// refer to a declared field, and field names must be unique.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Template name cannot be empty"));
        }
        if self.html_content.trim().is_empty() {
            return Err(Error::validation("Template content cannot be empty"));
        }

        let mut declared = HashSet::new();
        for field in &self.editable_fields {
            if field.name.trim().is_empty() {
                return Err(Error::validation("Field name cannot be empty"));
            }
            if !template::is_field_name(&field.name) {
                return Err(Error::validation(format!(
                    "Field name {:?} may only contain letters, digits, '_' and '-'",
                    field.name
                )));
            }
            if field.name == UNSUBSCRIBE_URL_FIELD {
                return Err(Error::validation(format!(
                    "Field name {} is reserved",
                    UNSUBSCRIBE_URL_FIELD
                )));
            }
            if !declared.insert(field.name.as_str()) {
                return Err(Error::validation(format!(
                    "Field {} is declared more than once",
                    field.name
                )));
            }
        }

        let undeclared: Vec<&str> = template::placeholders(&self.html_content)
            .into_iter()
            .chain(template::conditional_keys(&self.html_content))
            .filter(|name| *name != UNSUBSCRIBE_URL_FIELD && !declared.contains(name))
            .collect();
        if !undeclared.is_empty() {
            return Err(Error::validation(format!(
                "Template references undeclared fields: {}",
                undeclared.join(", ")
            )));
        }

        let not_boolean: Vec<&str> = template::conditional_keys(&self.html_content)
            .into_iter()
            .filter(|name| {
                self.editable_fields
                    .iter()
                    .any(|f| f.name == *name && f.field_type != FieldType::Boolean)
            })
            .collect();
        if !not_boolean.is_empty() {
            return Err(Error::validation(format!(
                "Conditional blocks must be gated by boolean fields: {}",
                not_boolean.join(", ")
            )));
        }

        Ok(())
    }
}

/// Stored template record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub html_content: String,
    pub editable_fields: Vec<EditableField>,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Merge supplied values with the declared defaults.
    /// Supplied values win; fields with neither stay unresolved.
    pub fn resolve_values(&self, supplied: &FieldValues) -> FieldValues {
        let mut values = supplied.clone();
        for field in &self.editable_fields {
            let value = values
                .remove(&field.name)
                .or_else(|| field.default_value.clone());
            if let Some(value) = value {
                values.insert(field.name.clone(), field.coerce(value));
            }
        }
        values
    }

    /// Render the template HTML with supplied values, falling back to defaults
    pub fn render(&self, supplied: &FieldValues) -> String {
        template::render(&self.html_content, &self.resolve_values(supplied))
    }
}
