//! Form validation run before any remote call. Failures are field-scoped
//! and never touch session or remote state.

use chrono::{Datelike, NaiveDate};

use crate::{
    error::ClientError,
    types::{GroupForm, MediaAttachment, OnboardingForm, ProfileUpdateForm},
};

/// Maximum accepted avatar/image upload size.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;
/// Minimum user age accepted at onboarding.
pub const MIN_AGE_YEARS: i32 = 13;
/// Maximum username length.
pub const MAX_USERNAME_LEN: usize = 30;
/// Maximum group name length.
pub const MAX_GROUP_NAME_LEN: usize = 50;

/// Validate the onboarding (KYC) form against `today`.
pub fn validate_onboarding(form: &OnboardingForm, today: NaiveDate) -> Result<(), ClientError> {
    if form.display_name.trim().is_empty()
        || form.date_of_birth.trim().is_empty()
        || form.gender.trim().is_empty()
    {
        return Err(ClientError::validation(
            "missing_field",
            "Please fill in all required fields",
        ));
    }

    let birth_date = NaiveDate::parse_from_str(form.date_of_birth.trim(), "%Y-%m-%d")
        .map_err(|_| ClientError::validation("invalid_date", "Date of birth must be YYYY-MM-DD"))?;
    if birth_date > today {
        return Err(ClientError::validation(
            "invalid_date",
            "Date of birth cannot be in the future",
        ));
    }
    if age_on(birth_date, today) < MIN_AGE_YEARS {
        return Err(ClientError::validation(
            "age_floor",
            format!("You must be at least {MIN_AGE_YEARS} years old to use this app"),
        ));
    }

    if let Some(avatar) = &form.avatar {
        validate_avatar(avatar)?;
    }
    Ok(())
}

/// Validate the profile edit form. Username availability is a separate
/// remote check; only local rules apply here.
pub fn validate_profile_update(form: &ProfileUpdateForm) -> Result<(), ClientError> {
    if form.display_name.trim().is_empty() || form.username.trim().is_empty() {
        return Err(ClientError::validation(
            "missing_field",
            "Display name and username are required",
        ));
    }
    validate_username(form.username.trim())?;
    if let Some(avatar) = &form.avatar {
        validate_avatar(avatar)?;
    }
    Ok(())
}

/// Validate username format: letters, numbers, underscores, bounded length.
pub fn validate_username(username: &str) -> Result<(), ClientError> {
    if username.len() > MAX_USERNAME_LEN {
        return Err(ClientError::validation(
            "username_too_long",
            format!("Username must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ClientError::validation(
            "username_format",
            "Use letters, numbers, underscores only",
        ));
    }
    Ok(())
}

/// Validate the group creation form for `creator_id`.
pub fn validate_group(form: &GroupForm, creator_id: &str) -> Result<(), ClientError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ClientError::validation(
            "group_name_required",
            "Group name is required",
        ));
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(ClientError::validation(
            "group_name_too_long",
            format!("Group name must be at most {MAX_GROUP_NAME_LEN} characters"),
        ));
    }
    if !form.member_ids.iter().any(|id| id != creator_id) {
        return Err(ClientError::validation(
            "group_members_required",
            "Select at least one member for the group",
        ));
    }
    if let Some(avatar) = &form.avatar {
        validate_avatar(avatar)?;
    }
    Ok(())
}

/// Validate an avatar/image attachment: size cap and image content type.
pub fn validate_avatar(attachment: &MediaAttachment) -> Result<(), ClientError> {
    if attachment.data.len() > MAX_AVATAR_BYTES {
        return Err(ClientError::validation(
            "image_too_large",
            "Image size must be less than 2MB",
        ));
    }
    if !attachment.content_type.starts_with("image/") {
        return Err(ClientError::validation(
            "image_type",
            "Please select a valid image file",
        ));
    }
    Ok(())
}

/// Whole years between `birth_date` and `today`.
fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn onboarding(dob: &str) -> OnboardingForm {
        OnboardingForm {
            display_name: "Alex Morgan".to_owned(),
            date_of_birth: dob.to_owned(),
            gender: "non-binary".to_owned(),
            avatar: None,
        }
    }

    #[test]
    fn accepts_complete_onboarding_form() {
        validate_onboarding(&onboarding("2000-05-20"), date(2026, 1, 1))
            .expect("adult form should validate");
    }

    #[test]
    fn rejects_missing_required_fields() {
        let mut form = onboarding("2000-05-20");
        form.gender = String::new();
        let err = validate_onboarding(&form, date(2026, 1, 1)).expect_err("must reject");
        assert_eq!(err.code, "missing_field");
    }

    #[test]
    fn enforces_age_floor_down_to_the_day() {
        let today = date(2026, 8, 29);
        // Turns 13 tomorrow.
        let err = validate_onboarding(&onboarding("2013-08-30"), today)
            .expect_err("12-year-old must be rejected");
        assert_eq!(err.code, "age_floor");
        // Turned 13 today.
        validate_onboarding(&onboarding("2013-08-29"), today)
            .expect("exactly 13 should be accepted");
    }

    #[test]
    fn rejects_unparseable_and_future_birth_dates() {
        let today = date(2026, 8, 29);
        let err = validate_onboarding(&onboarding("29/08/2000"), today).expect_err("bad format");
        assert_eq!(err.code, "invalid_date");
        let err = validate_onboarding(&onboarding("2027-01-01"), today).expect_err("future date");
        assert_eq!(err.code, "invalid_date");
    }

    #[test]
    fn username_rules_match_observed_behavior() {
        validate_username("alex_morgan_99").expect("valid username");
        assert_eq!(
            validate_username("alex morgan").expect_err("space").code,
            "username_format"
        );
        assert_eq!(
            validate_username("").expect_err("empty").code,
            "username_format"
        );
        assert_eq!(
            validate_username(&"a".repeat(31)).expect_err("too long").code,
            "username_too_long"
        );
    }

    #[test]
    fn avatar_limits_apply_to_size_and_type() {
        let oversized = MediaAttachment {
            data: vec![0; MAX_AVATAR_BYTES + 1],
            content_type: "image/png".to_owned(),
        };
        assert_eq!(
            validate_avatar(&oversized).expect_err("too large").code,
            "image_too_large"
        );

        let wrong_type = MediaAttachment {
            data: vec![0; 16],
            content_type: "application/pdf".to_owned(),
        };
        assert_eq!(
            validate_avatar(&wrong_type).expect_err("not an image").code,
            "image_type"
        );
    }

    #[test]
    fn group_form_requires_name_and_a_second_member() {
        let creator = "uid-me";
        let valid = GroupForm {
            name: "Product Team".to_owned(),
            member_ids: vec!["uid-b".to_owned()],
            avatar: None,
        };
        validate_group(&valid, creator).expect("valid group form");

        let unnamed = GroupForm {
            name: "  ".to_owned(),
            ..valid.clone()
        };
        assert_eq!(
            validate_group(&unnamed, creator).expect_err("no name").code,
            "group_name_required"
        );

        let solo = GroupForm {
            member_ids: vec![creator.to_owned()],
            ..valid.clone()
        };
        assert_eq!(
            validate_group(&solo, creator).expect_err("creator only").code,
            "group_members_required"
        );

        let long_name = GroupForm {
            name: "g".repeat(MAX_GROUP_NAME_LEN + 1),
            ..valid
        };
        assert_eq!(
            validate_group(&long_name, creator).expect_err("too long").code,
            "group_name_too_long"
        );
    }
}
