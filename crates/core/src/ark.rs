//! ARK identifier types and parsing.

use crate::noid::check_char;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal label that introduces the ARK part of an identifier string.
pub const ARK_LABEL: &str = "ark:";

/// Name Assigning Authority Number.
pub type Naan = u64;

/// A shoulder: the namespace partition between NAAN and assigned name.
///
/// Always starts with `/` and never contains whitespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Shoulder(String);

impl Shoulder {
    /// Maximum shoulder length, slash included.
    pub const MAX_LEN: usize = 50;

    /// Validate and wrap a shoulder string.
    pub fn new(shoulder: impl Into<String>) -> crate::Result<Self> {
        let shoulder = shoulder.into();
        if !shoulder.starts_with('/') {
            return Err(crate::Error::InvalidShoulder(
                "shoulders must start with a forward slash".to_string(),
            ));
        }
        if shoulder.len() > Self::MAX_LEN {
            return Err(crate::Error::InvalidShoulder(format!(
                "shoulder exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if shoulder.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(crate::Error::InvalidShoulder(
                "shoulder contains whitespace".to_string(),
            ));
        }
        Ok(Self(shoulder))
    }

    /// Get the shoulder string, leading slash included.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Shoulder {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<Shoulder> for String {
    fn from(value: Shoulder) -> Self {
        value.0
    }
}

impl fmt::Debug for Shoulder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shoulder({})", self.0)
    }
}

impl fmt::Display for Shoulder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed ARK reference such as `https://n2t.net/ark:/12345/x6np1wh8k/c3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArkId {
    nma: String,
    naan: Naan,
    identifier: String,
}

impl ArkId {
    /// Parse an identifier string.
    ///
    /// The string must contain the `ark:` label exactly once. Whatever comes
    /// before it is the name mapping authority. After it, leading slashes are
    /// dropped and the rest must be `<naan>/<identifier>`, where the
    /// identifier may itself contain further `/`-separated segments.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let mut parts = input.split(ARK_LABEL);
        let (nma, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(nma), Some(rest), None) => (nma, rest),
            _ => {
                return Err(crate::Error::InvalidArk(format!(
                    "expected exactly one '{ARK_LABEL}' label"
                )));
            }
        };

        let rest = rest.trim_start_matches('/');
        let (naan, identifier) = rest
            .split_once('/')
            .ok_or_else(|| crate::Error::InvalidArk("missing identifier after NAAN".to_string()))?;

        let naan: Naan = naan
            .parse()
            .map_err(|_| crate::Error::InvalidArk("ARK NAAN must be an integer".to_string()))?;

        if identifier.is_empty() {
            return Err(crate::Error::InvalidArk(
                "identifier cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            nma: nma.to_string(),
            naan,
            identifier: identifier.to_string(),
        })
    }

    /// Name mapping authority (text before the `ark:` label, possibly empty).
    pub fn nma(&self) -> &str {
        &self.nma
    }

    /// The NAAN component.
    pub fn naan(&self) -> Naan {
        self.naan
    }

    /// Everything after the NAAN, without the separating slash.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The record-store key: `{naan}/{identifier}`.
    pub fn lookup_key(&self) -> String {
        format!("{}/{}", self.naan, self.identifier)
    }

    /// Lookup keys of every proper prefix of the identifier, longest first.
    ///
    /// Prefixes are formed by dropping trailing `/`-delimited segments, so
    /// `100/ab/cd/ef` yields `100/ab/cd` then `100/ab`.
    pub fn prefix_keys(&self) -> Vec<String> {
        let segments: Vec<&str> = self.identifier.split('/').collect();
        (1..segments.len())
            .rev()
            .map(|len| format!("{}/{}", self.naan, segments[..len].join("/")))
            .collect()
    }
}

impl fmt::Display for ArkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ARK_LABEL}/{}/{}", self.naan, self.identifier)
    }
}

/// Render a stored key the way clients see it (`ark:/{key}`).
pub fn display_ark(key: &str) -> String {
    format!("{ARK_LABEL}/{key}")
}

/// A freshly composed identity for a new record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignedName {
    /// Full primary key: `{naan}{shoulder}{assigned_name}`.
    pub ark: String,
    /// Generated name followed by its check character.
    pub assigned_name: String,
}

/// Compose the identity for candidate `noid` under `naan` and `shoulder`.
///
/// The check character is computed over the whole `{naan}{shoulder}{noid}`
/// string, not the bare name.
pub fn assign_name(naan: Naan, shoulder: &Shoulder, noid: &str) -> AssignedName {
    let base = format!("{naan}{shoulder}{noid}");
    let check = check_char(&base);
    AssignedName {
        ark: format!("{base}{check}"),
        assigned_name: format!("{noid}{check}"),
    }
}

/// Check that a stored key equals the concatenation of its parts.
pub fn verify_composition(
    ark: &str,
    naan: Naan,
    shoulder: &str,
    assigned_name: &str,
) -> crate::Result<()> {
    let expected = format!("{naan}{shoulder}{assigned_name}");
    if ark != expected {
        return Err(crate::Error::Integrity {
            expected,
            actual: ark.to_string(),
        });
    }
    Ok(())
}
