/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use thiserror::Error;

use super::consts::*;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("`{0}` is not a port number")]
    InvalidPortNumber(String),
    #[error("Port not in range {start}-{end}", start = PORT_RANGE.start(), end = PORT_RANGE.end())]
    PortNotInRange,
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
    #[error("`{0}` is not larger than 0")]
    NotGreaterThanZero(String),
    #[error("Subdomain cannot be empty")]
    SubdomainEmpty,
    #[error("Subdomain can only contain lowercase letters, numbers, and dashes")]
    SubdomainInvalidCharacters,
    #[error("Subdomain can only start and end with letters or numbers")]
    SubdomainInvalidStartEnd,
    #[error("This subdomain is reserved and cannot be used")]
    SubdomainReserved,
    #[error("Build command cannot be empty")]
    BuildCommandEmpty,
    #[error("Build command contains a forbidden pattern: `{0}`")]
    BuildCommandForbiddenPattern(String),
    #[error("Build command segment must start with an allowed program: `{0}`")]
    BuildCommandDisallowedProgram(String),
}

pub fn port_in_range(s: &str) -> Result<u16, InputError> {
    let port: usize = s
        .parse()
        .map_err(|_| InputError::InvalidPortNumber(s.to_string()))?;

    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(InputError::PortNotInRange)
    }
}

pub fn greater_than_zero<
    T: std::str::FromStr + std::cmp::PartialOrd + std::fmt::Display + Default,
>(
    s: &str,
) -> Result<T, InputError> {
    let num: T = s
        .parse()
        .map_err(|_| InputError::InvalidNumber(s.to_string()))?;

    if num > T::default() {
        Ok(num)
    } else {
        Err(InputError::NotGreaterThanZero(s.to_string()))
    }
}

/// Accepts `^[a-z0-9]([a-z0-9-]*[a-z0-9])?$` minus the reserved set.
pub fn check_subdomain(s: &str) -> Result<(), InputError> {
    if s.is_empty() {
        return Err(InputError::SubdomainEmpty);
    }

    if s.contains(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-') {
        return Err(InputError::SubdomainInvalidCharacters);
    }

    if s.starts_with('-') || s.ends_with('-') {
        return Err(InputError::SubdomainInvalidStartEnd);
    }

    if RESERVED_SUBDOMAINS.contains(&s) {
        return Err(InputError::SubdomainReserved);
    }

    Ok(())
}

pub fn valid_subdomain(s: &str) -> bool {
    check_subdomain(s).is_ok()
}

/// Build commands are chains of `&&`-separated segments. Every non-empty
/// segment must start with an allowed program and the whole string must be
/// free of the forbidden patterns. Acceptance does not change under
/// per-segment whitespace normalization.
pub fn check_build_command(s: &str) -> Result<(), InputError> {
    if s.trim().is_empty() {
        return Err(InputError::BuildCommandEmpty);
    }

    for pattern in FORBIDDEN_COMMAND_PATTERNS {
        if s.contains(pattern) {
            return Err(InputError::BuildCommandForbiddenPattern(
                pattern.to_string(),
            ));
        }
    }

    for segment in s.split("&&") {
        let segment = segment.trim();

        if segment.is_empty() {
            continue;
        }

        let program = segment.split_whitespace().next().unwrap_or_default();

        if !ALLOWED_COMMAND_PREFIXES.contains(&program) {
            return Err(InputError::BuildCommandDisallowedProgram(
                program.to_string(),
            ));
        }
    }

    Ok(())
}

/// Lowercases a project name into subdomain shape. The result is not
/// guaranteed to pass `check_subdomain` (it may collide with the reserved
/// set or come out empty), so callers re-validate.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Splits `hello.apps.example.com` into `hello` for base `apps.example.com`.
/// A bare subdomain passes through unchanged.
pub fn subdomain_of<'a>(domain: &'a str, base_domain: &str) -> &'a str {
    domain
        .strip_suffix(base_domain)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(domain)
}
