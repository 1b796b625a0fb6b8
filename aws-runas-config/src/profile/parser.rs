/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Config file section reader
//!
//! Reads the subset of the shared config file format needed for profile resolution:
//! `[default]`, `[profile name]` and bare `[name]` section headers followed by `key = value`
//! properties. Comment lines start with `#` or `;`. Indented lines belong to a nested property
//! block (eg. `s3 =` settings) and are skipped.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

const PROFILE_PREFIX: &str = "profile";

/// A single config section, keyed by lowercase property name
pub type Section = HashMap<String, String>;

/// Parsed config file sections, keyed by profile name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSections {
    sections: HashMap<String, Section>,
}

impl ConfigSections {
    pub fn get(&self, profile: &str) -> Option<&Section> {
        self.sections.get(profile)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|name| name.as_str())
    }
}

/// The config file could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileParseError {
    line_number: usize,
    message: &'static str,
}

impl ProfileParseError {
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl fmt::Display for ProfileParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error parsing line {}: {}", self.line_number, self.message)
    }
}

impl Error for ProfileParseError {}

/// Parse the contents of a config file into sections
pub fn parse_config(contents: &str) -> Result<ConfigSections, ProfileParseError> {
    let mut sections = ConfigSections::default();
    let mut current: Option<String> = None;

    for (idx, line) in contents.lines().enumerate() {
        let line_number = idx + 1;
        let err = |message| ProfileParseError {
            line_number,
            message,
        };
        if line.starts_with(|c: char| c.is_whitespace()) && !line.trim().is_empty() {
            if current.is_none() {
                return Err(err("expected a section header"));
            }
            continue;
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let header = header
                .strip_suffix(']')
                .ok_or_else(|| err("section header must end with `]`"))?;
            let name = section_name(header);
            if name.is_empty() {
                return Err(err("section name must not be empty"));
            }
            sections.sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| err("expected a `key = value` property"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(err("property name must not be empty"));
        }
        let section = match &current {
            Some(name) => sections.sections.entry(name.clone()).or_default(),
            None => return Err(err("property defined before any section header")),
        };
        section.insert(key.to_ascii_lowercase(), strip_comment(value.trim()).to_string());
    }
    Ok(sections)
}

fn section_name(header: &str) -> &str {
    let header = header.trim_start();
    match header.strip_prefix(PROFILE_PREFIX) {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => header.trim_end(),
    }
}

/// Strip a trailing ` #` or ` ;` comment from a property value
fn strip_comment(value: &str) -> &str {
    let mut prev_is_space = false;
    for (idx, c) in value.char_indices() {
        if prev_is_space && (c == '#' || c == ';') {
            return value[..idx].trim_end();
        }
        prev_is_space = c.is_whitespace();
    }
    value
}
