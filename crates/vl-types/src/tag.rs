use std::cmp::Ordering;

/// Sort key for a free-form version tag.
///
/// Tags that parse as semantic versions (an optional leading `v` or `=` is
/// accepted) order by semver precedence and always rank above tags that do
/// not parse. Unparseable tags order lexicographically among themselves, so
/// the ordering is total for any input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagOrder<'a> {
    Opaque(&'a str),
    Semantic(semver::Version),
}

impl<'a> TagOrder<'a> {
    pub fn parse(tag: &'a str) -> Self {
        let trimmed = tag.trim();
        let bare = trimmed
            .strip_prefix(['v', 'V', '='])
            .unwrap_or(trimmed);
        match semver::Version::parse(bare) {
            Ok(version) => Self::Semantic(version),
            Err(_) => Self::Opaque(tag),
        }
    }
}

impl PartialOrd for TagOrder<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagOrder<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Semantic(a), Self::Semantic(b)) => a.cmp(b),
            (Self::Semantic(_), Self::Opaque(_)) => Ordering::Greater,
            (Self::Opaque(_), Self::Semantic(_)) => Ordering::Less,
            (Self::Opaque(a), Self::Opaque(b)) => a.cmp(b),
        }
    }
}

/// Compare two tags under [`TagOrder`].
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    TagOrder::parse(a).cmp(&TagOrder::parse(b))
}
