use std::collections::HashSet;
use std::str::FromStr;

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

const MAX_LEN: usize = 256;

/// Display name a subscriber may leave alongside their email
#[derive(Debug, Clone, PartialEq)]
pub struct PersonName(String);

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PersonName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        lazy_static::lazy_static! {
            static ref INVALID_CHARS: HashSet<char> = vec!['/', '(', ')', '"', '<', '>', '\\', '{', '}']
                .into_iter()
                .collect();
        }

        let value = value.trim();

        if value.is_empty() {
            return Err(Error::validation("Name cannot be empty"));
        }
        if value.graphemes(true).count() > MAX_LEN {
            return Err(Error::validation("Name too long"));
        }
        if value.chars().any(|c| INVALID_CHARS.contains(&c)) {
            return Err(Error::validation("Name contains invalid characters"));
        }
        Ok(Self(value.to_string()))
    }
}
