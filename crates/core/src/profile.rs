//! User profile details and the rules for editing them.
//!
//! A [`Profile`] is whatever the user has filled in so far, so every field
//! may be blank. Saving goes through [`Profile::validate`], which trims the
//! names and requires a first name, and yields a [`ProfileUpdate`] that is
//! known to be acceptable.

use core::fmt;
use core::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors editing a profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// The first name is empty after trimming.
    #[error("first name cannot be empty")]
    EmptyName,

    /// Not one of the offered gender options.
    #[error("unknown gender '{0}' (expected masculino, femenino or otro)")]
    UnknownGender(String),
}

/// Gender options offered by the profile form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// The value stored by the backend.
    #[must_use]
    pub const fn wire_label(self) -> &'static str {
        match self {
            Self::Male => "masculino",
            Self::Female => "femenino",
            Self::Other => "otro",
        }
    }

    /// Human-readable label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the stored values and the English labels, case-insensitively.
impl FromStr for Gender {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "masculino" | "male" => Ok(Self::Male),
            "femenino" | "female" => Ok(Self::Female),
            "otro" | "other" => Ok(Self::Other),
            _ => Err(ProfileError::UnknownGender(s.to_string())),
        }
    }
}

/// Personal details attached to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
}

impl Profile {
    /// First and last name joined, or `None` if both are blank.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Check the profile is fit to save.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::EmptyName`] if the first name is blank.
    pub fn validate(self) -> Result<ProfileUpdate, ProfileError> {
        let first_name = self.first_name.trim().to_string();
        if first_name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        let last_name = self.last_name.trim().to_string();
        Ok(ProfileUpdate(Self {
            first_name,
            last_name,
            ..self
        }))
    }
}

/// A [`Profile`] that passed [`Profile::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate(Profile);

impl ProfileUpdate {
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.0
    }

    #[must_use]
    pub fn into_profile(self) -> Profile {
        self.0
    }
}
