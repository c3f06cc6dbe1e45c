//! Best-effort foreground extraction from UI accessibility notifications.
//!
//! This is a heuristic fallback, not a primary signal. Window events name their
//! owning package directly, but click events often originate from a launcher
//! icon whose only link to the target app is its caption. For those we walk the
//! clicked element's ancestors and compare caption text against the blocked
//! apps. That comparison is a case-insensitive substring match and will both
//! over-match ("Mail" in "Gmail") and under-match (localized captions).

use serde::{Deserialize, Serialize};

use crate::models::{ApplicationId, BlockSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessibilityEventKind {
    WindowStateChanged,
    WindowsChanged,
    WindowContentChanged,
    ViewClicked,
    ViewFocused,
    ViewAccessibilityFocused,
}

/// One element of the on-screen UI tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiNode {
    pub package_name: Option<ApplicationId>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub clickable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityEvent {
    pub kind: AccessibilityEventKind,
    /// Package of the surface that raised the event.
    pub package_name: Option<ApplicationId>,
    /// The source element followed by its ancestors, innermost first.
    #[serde(default)]
    pub source_chain: Vec<UiNode>,
}

impl AccessibilityEvent {
    pub fn window_state_changed(package: impl Into<ApplicationId>) -> Self {
        Self {
            kind: AccessibilityEventKind::WindowStateChanged,
            package_name: Some(package.into()),
            source_chain: Vec::new(),
        }
    }

    pub fn view_clicked(source_chain: Vec<UiNode>) -> Self {
        Self {
            kind: AccessibilityEventKind::ViewClicked,
            package_name: source_chain.first().and_then(|n| n.package_name.clone()),
            source_chain,
        }
    }
}

/// The application an event points at, if any.
///
/// Only members of the block set are ever returned. Windows of other apps
/// (the overlay itself, system UI, keyboards) surface constantly while a
/// blocked app is in front, so they say nothing about leaving it; the poller
/// owns that direction.
pub fn extract_application(
    event: &AccessibilityEvent,
    block_set: &BlockSet,
) -> Option<ApplicationId> {
    match event.kind {
        AccessibilityEventKind::WindowStateChanged | AccessibilityEventKind::WindowsChanged => event
            .package_name
            .clone()
            .filter(|id| block_set.contains(id)),
        AccessibilityEventKind::ViewFocused => event
            .source_chain
            .first()
            .and_then(|node| node.package_name.clone())
            .filter(|id| block_set.contains(id)),
        AccessibilityEventKind::ViewClicked => match_ancestor_chain(&event.source_chain, block_set),
        AccessibilityEventKind::WindowContentChanged
        | AccessibilityEventKind::ViewAccessibilityFocused => None,
    }
}

/// Walk from the clicked element outwards looking for either a node owned by a
/// blocked package or a clickable node whose caption mentions a blocked app.
pub fn match_ancestor_chain(chain: &[UiNode], block_set: &BlockSet) -> Option<ApplicationId> {
    for node in chain {
        if let Some(id) = node.package_name.as_ref().filter(|id| block_set.contains(id)) {
            return Some(id.clone());
        }

        if !node.clickable {
            continue;
        }

        let captions = [node.text.as_deref(), node.content_description.as_deref()];
        for (id, label) in block_set.entries() {
            let names = [Some(id.as_str()), label];
            let hit = captions.iter().flatten().any(|caption| {
                names
                    .iter()
                    .flatten()
                    .any(|name| contains_ignore_case(caption, name))
            });
            if hit {
                return Some(id.clone());
            }
        }
    }
    None
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked() -> BlockSet {
        let mut set = BlockSet::new();
        set.insert_labeled(ApplicationId::from("com.instagram.android"), "Instagram");
        set.insert(ApplicationId::from("com.zhiliaoapp.musically"));
        set
    }

    fn caption(text: &str, clickable: bool) -> UiNode {
        UiNode {
            package_name: Some(ApplicationId::from("com.android.launcher3")),
            text: Some(text.into()),
            content_description: None,
            clickable,
        }
    }

    #[test]
    fn window_event_of_blocked_app_matches() {
        let event = AccessibilityEvent::window_state_changed("com.instagram.android");
        assert_eq!(
            extract_application(&event, &blocked()),
            Some(ApplicationId::from("com.instagram.android"))
        );
    }

    #[test]
    fn window_events_of_other_apps_yield_nothing() {
        for package in ["com.android.settings", "com.android.systemui", "com.example.focuslock"] {
            let event = AccessibilityEvent::window_state_changed(package);
            assert_eq!(extract_application(&event, &blocked()), None, "{package}");
        }
    }

    #[test]
    fn windows_changed_without_package_yields_nothing() {
        let event = AccessibilityEvent {
            kind: AccessibilityEventKind::WindowsChanged,
            package_name: None,
            source_chain: vec![],
        };
        assert_eq!(extract_application(&event, &blocked()), None);
    }

    #[test]
    fn focused_element_of_blocked_app_matches() {
        let event = AccessibilityEvent {
            kind: AccessibilityEventKind::ViewFocused,
            package_name: None,
            source_chain: vec![UiNode {
                package_name: Some(ApplicationId::from("com.instagram.android")),
                ..UiNode::default()
            }],
        };
        assert_eq!(
            extract_application(&event, &blocked()),
            Some(ApplicationId::from("com.instagram.android"))
        );
    }

    #[test]
    fn focused_element_of_other_app_is_ignored() {
        let event = AccessibilityEvent {
            kind: AccessibilityEventKind::ViewFocused,
            package_name: None,
            source_chain: vec![UiNode {
                package_name: Some(ApplicationId::from("com.android.chrome")),
                ..UiNode::default()
            }],
        };
        assert_eq!(extract_application(&event, &blocked()), None);
    }

    #[test]
    fn clicked_launcher_icon_matches_label_case_insensitively() {
        let event = AccessibilityEvent::view_clicked(vec![
            UiNode {
                package_name: Some(ApplicationId::from("com.android.launcher3")),
                ..UiNode::default()
            },
            caption("INSTAGRAM", true),
        ]);
        assert_eq!(
            extract_application(&event, &blocked()),
            Some(ApplicationId::from("com.instagram.android"))
        );
    }

    #[test]
    fn caption_on_non_clickable_node_is_not_considered() {
        let chain = vec![caption("Instagram", false)];
        assert_eq!(match_ancestor_chain(&chain, &blocked()), None);
    }

    #[test]
    fn content_description_can_carry_the_package_name() {
        let chain = vec![UiNode {
            package_name: None,
            text: None,
            content_description: Some("open com.zhiliaoapp.musically".into()),
            clickable: true,
        }];
        assert_eq!(
            match_ancestor_chain(&chain, &blocked()),
            Some(ApplicationId::from("com.zhiliaoapp.musically"))
        );
    }

    #[test]
    fn substring_heuristic_over_matches_by_nature() {
        let mut set = BlockSet::new();
        set.insert_labeled(ApplicationId::from("com.mail.client"), "Mail");
        let chain = vec![caption("Gmail", true)];
        assert_eq!(
            match_ancestor_chain(&chain, &set),
            Some(ApplicationId::from("com.mail.client"))
        );
    }

    #[test]
    fn content_changes_are_ignored() {
        let event = AccessibilityEvent {
            kind: AccessibilityEventKind::WindowContentChanged,
            package_name: Some(ApplicationId::from("com.instagram.android")),
            source_chain: vec![],
        };
        assert_eq!(extract_application(&event, &blocked()), None);
    }
}
