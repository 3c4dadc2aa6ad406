use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ProfileMarker;

/// A user's developer profile. Every user has at most one.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Profile {
    pub id: Id<ProfileMarker>,
    pub user: Id<UserMarker>,
    pub handle: String,
    pub status: String,
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
    pub skills: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// Profile form as submitted by the owner. `skills` is comma separated.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
pub struct ProfileFields {
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 40,
        message = "Handle needs to be between 2 and 40 characters"
    ))]
    pub handle: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Status field is required"))]
    pub status: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Skills field is required"))]
    pub skills: String,
    #[validate(url(message = "Not a valid URL"))]
    pub website: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

impl ProfileFields {
    /// Trims every field and treats blank optional fields as absent.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            handle: self.handle.trim().to_owned(),
            status: self.status.trim().to_owned(),
            skills: self.skills.trim().to_owned(),
            website: non_blank(self.website),
            company: non_blank(self.company),
            location: non_blank(self.location),
            bio: non_blank(self.bio),
            github_username: non_blank(self.github_username),
        }
    }

    #[must_use]
    pub fn skill_list(&self) -> Vec<String> {
        self.skills
            .split(',')
            .map(str::trim)
            .filter(|skill| !skill.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

impl Profile {
    #[must_use]
    pub fn from_fields(
        id: Id<ProfileMarker>,
        user: Id<UserMarker>,
        fields: ProfileFields,
        date: OffsetDateTime,
    ) -> Self {
        let skills = fields.skill_list();

        Self {
            id,
            user,
            handle: fields.handle,
            status: fields.status,
            company: fields.company,
            website: fields.website,
            location: fields.location,
            bio: fields.bio,
            github_username: fields.github_username,
            skills,
            date,
        }
    }
}
