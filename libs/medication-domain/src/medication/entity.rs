//! Domain entities for medication records
//!
//! A Medication is owned by exactly one owner and addressed by a caller-supplied id.
//! The pair (owner, id) is the record's [`Identity`] and is unique across the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::medication::ids::Version;

/// Maximum length, in characters, of the free-form name and dosage fields
pub const MAX_FIELD_CHARS: usize = 1023;

/// The unique key of a medication record
///
/// `owner` comes from the caller's authentication context, `id` is supplied by the
/// caller. Both must be non-empty for any persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub owner: String,
    pub id: String,
}

impl Identity {
    pub fn new(owner: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner={} id={}", self.owner, self.id)
    }
}

/// Physical form of a medication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    Tablet,
    Capsule,
    Liquid,
}

impl Form {
    /// Parse a form, ignoring surrounding whitespace and letter case
    ///
    /// ```rust
    /// use medication_domain::Form;
    ///
    /// assert_eq!(Form::parse(" tablEt\t"), Some(Form::Tablet));
    /// assert_eq!(Form::parse("tablte"), None);
    /// ```
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "tablet" => Some(Self::Tablet),
            "capsule" => Some(Self::Capsule),
            "liquid" => Some(Self::Liquid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tablet => "tablet",
            Self::Capsule => "capsule",
            Self::Liquid => "liquid",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Form {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("<{}> is not a valid form", s))
    }
}

/// Caller-supplied content of a medication record
///
/// Name and dosage are free-form for now. Structuring the dosage (amount + unit) and
/// normalizing drug names are future concerns of the domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationData {
    pub name: String,
    pub dosage: String,
    pub form: Form,
}

impl MedicationData {
    /// Create medication data without validating it
    pub fn new(name: impl Into<String>, dosage: impl Into<String>, form: Form) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            form,
        }
    }

    /// Check the basic shape constraints the calling layer must enforce
    ///
    /// Name and dosage must each hold between 1 and [`MAX_FIELD_CHARS`] characters.
    /// The returned message is safe to send back to a client.
    pub fn validate(&self) -> Result<(), String> {
        check_field("name", &self.name)?;
        check_field("dosage", &self.dosage)
    }
}

fn check_field(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(format!(
            "{} must be at most {} characters",
            field, MAX_FIELD_CHARS
        ));
    }
    Ok(())
}

/// A persisted medication record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub identity: Identity,
    pub data: MedicationData,
    /// Opaque token supplied back on update as a compare-and-swap precondition
    pub version: Version,
}

impl Medication {
    pub fn new(identity: Identity, data: MedicationData, version: Version) -> Self {
        Self {
            identity,
            data,
            version,
        }
    }
}
