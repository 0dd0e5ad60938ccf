//! Profile commands.

use chrono::NaiveDate;

use cafe_loyalty_client::AppState;
use cafe_loyalty_core::{Gender, Profile, ProfileError};

use super::{CliError, out};

/// Fields given on the command line; `None` keeps the saved value.
#[derive(Debug, Default)]
pub struct ProfileEdits {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Gender option, or `none` to clear it
    pub gender: Option<String>,
    /// `YYYY-MM-DD`, or `none` to clear it
    pub birth_date: Option<String>,
}

pub async fn show(state: &AppState) -> Result<(), CliError> {
    state.session().wait_until_resolved().await;
    let session = state.require_session()?;

    match state.profiles()?.profile(&session).await? {
        Some(profile) => print_profile(&profile),
        None => out("No profile saved yet (use `cafe profile edit`)"),
    }
}

pub async fn edit(state: &AppState, edits: ProfileEdits) -> Result<(), CliError> {
    state.session().wait_until_resolved().await;
    let session = state.require_session()?;
    let profiles = state.profiles()?;

    let saved = profiles.profile(&session).await?.unwrap_or_default();
    let update = apply(saved.clone(), edits)?.validate()?;
    if *update.profile() == saved {
        return out("Nothing to change");
    }

    profiles.update_profile(&session, &update).await?;
    out("Profile updated")?;
    print_profile(update.profile())
}

fn print_profile(profile: &Profile) -> Result<(), CliError> {
    out(format!(
        "Name:       {}",
        profile.full_name().unwrap_or_else(|| "-".to_string())
    ))?;
    out(format!("Phone:      {}", or_dash(&profile.phone)))?;
    out(format!(
        "Gender:     {}",
        profile.gender.map_or("-", Gender::label)
    ))?;
    match profile.birth_date {
        Some(date) => out(format!("Birth date: {}", date.format("%Y-%m-%d"))),
        None => out("Birth date: -"),
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

/// Overlay the command-line edits on the saved profile.
fn apply(mut profile: Profile, edits: ProfileEdits) -> Result<Profile, CliError> {
    if let Some(first_name) = edits.first_name {
        profile.first_name = first_name;
    }
    if let Some(last_name) = edits.last_name {
        profile.last_name = last_name;
    }
    if let Some(phone) = edits.phone {
        profile.phone = phone.trim().to_string();
    }
    if let Some(gender) = edits.gender {
        profile.gender = if clearing(&gender) {
            None
        } else {
            let gender = gender
                .parse::<Gender>()
                .map_err(|e: ProfileError| CliError::InvalidArgument(e.to_string()))?;
            Some(gender)
        };
    }
    if let Some(date) = edits.birth_date {
        profile.birth_date = if clearing(&date) {
            None
        } else {
            let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
                CliError::InvalidArgument(format!("birth date '{date}' is not YYYY-MM-DD: {e}"))
            })?;
            Some(parsed)
        };
    }
    Ok(profile)
}

fn clearing(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("none")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn saved() -> Profile {
        Profile {
            first_name: "Ana".to_string(),
            last_name: "López".to_string(),
            phone: "4771234567".to_string(),
            gender: Some(Gender::Female),
            birth_date: NaiveDate::from_ymd_opt(1995, 4, 12),
        }
    }

    #[test]
    fn test_unset_edits_keep_saved_values() {
        assert_eq!(apply(saved(), ProfileEdits::default()).unwrap(), saved());
    }

    #[test]
    fn test_edits_overlay_and_clear() {
        let edits = ProfileEdits {
            phone: Some(" 4779876543 ".to_string()),
            gender: Some("none".to_string()),
            birth_date: Some("1996-01-30".to_string()),
            ..ProfileEdits::default()
        };
        let profile = apply(saved(), edits).unwrap();
        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.phone, "4779876543");
        assert_eq!(profile.gender, None);
        assert_eq!(profile.birth_date, NaiveDate::from_ymd_opt(1996, 1, 30));
    }

    #[test]
    fn test_bad_values_are_invalid_arguments() {
        let edits = ProfileEdits {
            gender: Some("robot".to_string()),
            ..ProfileEdits::default()
        };
        assert!(matches!(
            apply(saved(), edits),
            Err(CliError::InvalidArgument(_))
        ));

        let edits = ProfileEdits {
            birth_date: Some("12/04/1995".to_string()),
            ..ProfileEdits::default()
        };
        assert!(matches!(
            apply(saved(), edits),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_blank_first_name_fails_validation() {
        let edits = ProfileEdits {
            first_name: Some("  ".to_string()),
            ..ProfileEdits::default()
        };
        let profile = apply(saved(), edits).unwrap();
        assert_eq!(profile.validate(), Err(ProfileError::EmptyName));
    }
}
