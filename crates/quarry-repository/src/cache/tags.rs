//! Cache tags
//!
//! Every cached read of an entity is stored under the entity's singular and
//! plural names plus a shared `repositories` tag, so one write can drop all
//! of them at once.

/// Tag shared by every repository
pub const REPOSITORIES_TAG: &str = "repositories";

/// Tag set of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTags(Vec<String>);

impl CacheTags {
    /// Tags for an entity name such as `user` or `Category`
    pub fn for_entity(name: &str) -> Self {
        let singular = name.trim().to_lowercase();
        let plural = pluralize(&singular);

        let mut tags = vec![singular];
        if !tags.contains(&plural) {
            tags.push(plural);
        }
        tags.push(REPOSITORIES_TAG.to_string());
        Self(tags)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}
