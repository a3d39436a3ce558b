//! User profiles

use serde::{Deserialize, Serialize};

/// Languages a user speaks. Stored either as one string or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Language {
    One(String),
    Many(Vec<String>),
}

impl Language {
    /// True if `language` is, or is among, these languages
    pub fn speaks(&self, language: &str) -> bool {
        match self {
            Language::One(l) => l == language,
            Language::Many(ls) => ls.iter().any(|l| l == language),
        }
    }

    /// Every language as a slice of names
    pub fn names(&self) -> Vec<&str> {
        match self {
            Language::One(l) => vec![l.as_str()],
            Language::Many(ls) => ls.iter().map(String::as_str).collect(),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Many(Vec::new())
    }
}

/// A user's public profile
///
/// Empty strings are left out when serializing, so saving a partly filled
/// profile through a merge keeps the stored values of the unset fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub intro: String,
    #[serde(default, rename = "ageRange", skip_serializing_if = "String::is_empty")]
    pub age_range: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timezone: String,
    #[serde(default)]
    pub hobbies: Vec<String>,
    #[serde(default, rename = "avatarUrl", skip_serializing_if = "String::is_empty")]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Ids of the chats this user takes part in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chats: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_language_one_or_many() {
        let one: Language = serde_json::from_value(json!("Xhosa")).unwrap();
        assert!(one.speaks("Xhosa"));
        assert!(!one.speaks("Zulu"));

        let many: Language = serde_json::from_value(json!(["Zulu", "English"])).unwrap();
        assert!(many.speaks("English"));
        assert_eq!(many.names(), vec!["Zulu", "English"]);
    }

    #[test]
    fn test_profile_from_document() {
        let profile: Profile = serde_json::from_value(json!({
            "userID": "u1",
            "username": "penpal_tokyo",
            "language": "Japanese",
            "timezone": "(UTC+09:00) Osaka, Sapporo, Tokyo",
            "hobbies": ["travel"],
            "MatchedUsers": ["u2"]
        }))
        .unwrap();
        assert_eq!(profile.user_id, "u1");
        assert!(profile.language.speaks("Japanese"));
        assert!(profile.intro.is_empty());
        assert!(!profile.blocked);
    }

    #[test]
    fn test_unset_strings_are_not_serialized() {
        let profile = Profile {
            user_id: "u1".to_string(),
            intro: "hi".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["userID"], "u1");
        assert_eq!(value["intro"], "hi");
        for key in ["username", "avatarUrl", "ageRange", "timezone", "country", "blocked"] {
            assert!(value.get(key).is_none(), "{} should be omitted", key);
        }
    }
}
