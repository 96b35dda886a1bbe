//! Content-derived identity keys.
//!
//! A step is identified by `type|message|primary|secondary|stage`, an image by
//! `<step key>|<image name>`. Each component is escaped (`\` → `\\`,
//! `|` → `\|`) before joining, so distinct tuples never produce the same key.
//! Keys are built the same way from desired and actual records; remote ids
//! never take part.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Coded, Stage};

/// Component separator.
pub const SEPARATOR: char = '|';

const ESCAPE: char = '\\';

/// Identity of a step, stable across re-registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

/// Identity of an image: its step's key plus the image name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(String);

impl StepKey {
    /// Build a step key. An absent secondary entity and an empty one are the
    /// same binding.
    pub fn new(
        type_name: &str,
        message: &str,
        primary_entity: &str,
        secondary_entity: Option<&str>,
        stage: Stage,
    ) -> Self {
        Self(join(&[
            type_name,
            message,
            primary_entity,
            secondary_entity.unwrap_or(""),
            stage.name(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ImageKey {
    pub fn new(step: &StepKey, image_name: &str) -> Self {
        let mut key = String::with_capacity(step.0.len() + image_name.len() + 1);
        key.push_str(&step.0);
        key.push(SEPARATOR);
        push_escaped(&mut key, image_name);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn join(parts: &[&str]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEPARATOR);
        }
        push_escaped(&mut key, part);
    }
    key
}

fn push_escaped(out: &mut String, part: &str) {
    for c in part.chars() {
        if c == SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}
