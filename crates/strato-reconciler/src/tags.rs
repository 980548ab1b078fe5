//! Display-name aliasing through the remote tag set.
//!
//! The remote system stores an instance's display name as a tag keyed
//! `Name`. On write the alias is synthesized into the tag set; on read it is
//! reabsorbed into the display name and never surfaces as an ordinary tag.

use std::collections::BTreeMap;

/// Remote tag key that aliases the display name.
pub const NAME_TAG: &str = "Name";

/// Tag set for a create call: the display-name alias, then the user's tags
/// in key order.
pub fn synthesize(
    display_name: Option<&str>,
    user_tags: Option<&BTreeMap<String, String>>,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Some(name) = display_name {
        out.push((NAME_TAG.to_string(), name.to_string()));
    }
    if let Some(tags) = user_tags {
        for (key, value) in tags {
            out.push((key.clone(), value.clone()));
        }
    }
    out
}

/// Split a remote tag set into the display name and the resolved tag
/// mapping.
///
/// The mapping is always produced; empty means the remote reported no user
/// tags, which is a meaningful value distinct from unknown.
pub fn absorb(remote: &[(String, String)]) -> (Option<String>, BTreeMap<String, String>) {
    let mut display_name = None;
    let mut tags = BTreeMap::new();
    for (key, value) in remote {
        if key == NAME_TAG {
            display_name = Some(value.clone());
        } else {
            tags.insert(key.clone(), value.clone());
        }
    }
    (display_name, tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_becomes_the_name_tag() {
        let tags = synthesize(Some("test-instance"), None);
        assert_eq!(
            tags,
            vec![("Name".to_string(), "test-instance".to_string())]
        );
    }

    #[test]
    fn user_tags_follow_the_alias() {
        let user: BTreeMap<_, _> =
            [("Environment".to_string(), "test".to_string())].into();
        let tags = synthesize(Some("test-instance"), Some(&user));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].0, "Name");
        assert_eq!(tags[1], ("Environment".to_string(), "test".to_string()));
    }

    #[test]
    fn absorb_extracts_the_alias_and_keeps_the_rest() {
        let remote = vec![
            ("Environment".to_string(), "test".to_string()),
            ("Name".to_string(), "test-instance".to_string()),
        ];
        let (display_name, tags) = absorb(&remote);
        assert_eq!(display_name.as_deref(), Some("test-instance"));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("Environment").unwrap(), "test");
        assert!(!tags.contains_key("Name"));
    }

    #[test]
    fn absorb_of_empty_set_yields_empty_mapping() {
        let (display_name, tags) = absorb(&[]);
        assert_eq!(display_name, None);
        assert!(tags.is_empty());
    }

    #[test]
    fn synthesize_then_absorb_round_trips() {
        let user: BTreeMap<_, _> = [
            ("Environment".to_string(), "test".to_string()),
            ("ManagedBy".to_string(), "strato".to_string()),
        ]
        .into();
        let written = synthesize(Some("test-instance"), Some(&user));
        let (display_name, tags) = absorb(&written);
        assert_eq!(display_name.as_deref(), Some("test-instance"));
        assert_eq!(tags, user);
    }
}
