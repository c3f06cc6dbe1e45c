use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform package identifier. Compared by exact string match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ApplicationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Applications the user wants kept out of the foreground during a session.
///
/// Each entry may carry a display label; the accessibility heuristic matches
/// on-screen text against both the identifier and the label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSet {
    entries: BTreeMap<ApplicationId, Option<String>>,
}

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ApplicationId) {
        self.entries.entry(id).or_insert(None);
    }

    pub fn insert_labeled(&mut self, id: ApplicationId, label: impl Into<String>) {
        let label = label.into();
        let label = if label.trim().is_empty() { None } else { Some(label) };
        self.entries.insert(id, label);
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn label(&self, id: &ApplicationId) -> Option<&str> {
        self.entries.get(id).and_then(|label| label.as_deref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &ApplicationId> {
        self.entries.keys()
    }

    /// Entries paired with their optional label.
    pub fn entries(&self) -> impl Iterator<Item = (&ApplicationId, Option<&str>)> {
        self.entries.iter().map(|(id, label)| (id, label.as_deref()))
    }

    pub fn to_id_set(&self) -> BTreeSet<ApplicationId> {
        self.entries.keys().cloned().collect()
    }
}

impl FromIterator<ApplicationId> for BlockSet {
    fn from_iter<I: IntoIterator<Item = ApplicationId>>(iter: I) -> Self {
        let mut set = BlockSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl<'a> FromIterator<&'a str> for BlockSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(ApplicationId::from).collect()
    }
}

/// Home-screen and launcher packages. Blocking one of these would leave the
/// user with nowhere to navigate, so they always resolve to "allow".
const BUILTIN_LAUNCHERS: &[&str] = &[
    "com.android.launcher",
    "com.android.launcher2",
    "com.android.launcher3",
    "com.google.android.apps.nexuslauncher",
    "com.google.android.launcher",
    "com.sec.android.app.launcher",
    "com.miui.home",
    "com.huawei.android.launcher",
    "com.oppo.launcher",
    "com.coloros.launcher",
    "com.oneplus.launcher",
    "net.oneplus.launcher",
    "com.vivo.launcher",
    "com.bbk.launcher2",
    "com.motorola.launcher3",
    "com.lge.launcher3",
    "com.sonymobile.home",
    "com.asus.launcher",
    "com.teslacoilsw.launcher",
    "com.microsoft.launcher",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    ids: BTreeSet<ApplicationId>,
}

impl AllowList {
    /// The built-in launcher set extended by configured extras.
    pub fn with_extras<I, S>(extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: BTreeSet<ApplicationId> = BUILTIN_LAUNCHERS
            .iter()
            .map(|id| ApplicationId::from(*id))
            .collect();
        ids.extend(
            extras
                .into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.trim().is_empty())
                .map(ApplicationId::from),
        );
        Self { ids }
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.ids.contains(id)
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::with_extras(std::iter::empty::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_set_ignores_duplicates() {
        let set: BlockSet = ["com.a", "com.b", "com.a"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ApplicationId::from("com.a")));
    }

    #[test]
    fn application_ids_are_not_normalized() {
        let set: BlockSet = ["com.Example.App"].into_iter().collect();
        assert!(!set.contains(&ApplicationId::from("com.example.app")));
        assert!(!set.contains(&ApplicationId::from(" com.Example.App")));
    }

    #[test]
    fn blank_labels_are_dropped() {
        let mut set = BlockSet::new();
        set.insert_labeled(ApplicationId::from("com.a"), "  ");
        set.insert_labeled(ApplicationId::from("com.b"), "Bee");
        assert_eq!(set.label(&ApplicationId::from("com.a")), None);
        assert_eq!(set.label(&ApplicationId::from("com.b")), Some("Bee"));
    }

    #[test]
    fn plain_insert_keeps_existing_label() {
        let mut set = BlockSet::new();
        set.insert_labeled(ApplicationId::from("com.b"), "Bee");
        set.insert(ApplicationId::from("com.b"));
        assert_eq!(set.label(&ApplicationId::from("com.b")), Some("Bee"));
    }

    #[test]
    fn allow_list_includes_builtin_launchers_and_extras() {
        let allow = AllowList::with_extras(["org.custom.home", ""]);
        assert!(allow.contains(&ApplicationId::from("com.android.launcher3")));
        assert!(allow.contains(&ApplicationId::from("org.custom.home")));
        assert!(!allow.contains(&ApplicationId::from("")));
        assert!(!allow.contains(&ApplicationId::from("com.instagram.android")));
    }
}
