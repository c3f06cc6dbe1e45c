use serde::Serialize;

use crate::models::{AllowList, ApplicationId, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "decision", content = "target")]
pub enum Decision {
    Allow,
    Block(ApplicationId),
}

impl Decision {
    pub fn is_block(&self) -> bool {
        matches!(self, Decision::Block(_))
    }
}

/// Blocking decision for one foreground guess. Fails open: anything short of a
/// confirmed, non-launcher member of the active block set is allowed.
pub fn decide(
    guess: Option<&ApplicationId>,
    session: &SessionState,
    allow_list: &AllowList,
) -> Decision {
    if !session.active || session.suspended {
        return Decision::Allow;
    }
    let Some(id) = guess else {
        return Decision::Allow;
    };
    if allow_list.contains(id) {
        return Decision::Allow;
    }
    if session.block_set.contains(id) {
        Decision::Block(id.clone())
    } else {
        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockSet;
    use chrono::{Duration, Utc};

    fn active(block: &[&str]) -> SessionState {
        let mut state = SessionState::new();
        state.begin(
            "test".into(),
            block.iter().copied().collect::<BlockSet>(),
            Utc::now(),
        );
        state
    }

    fn id(value: &str) -> ApplicationId {
        ApplicationId::from(value)
    }

    #[test]
    fn blocks_member_of_block_set() {
        let session = active(&["com.game"]);
        assert_eq!(
            decide(Some(&id("com.game")), &session, &AllowList::default()),
            Decision::Block(id("com.game"))
        );
    }

    #[test]
    fn allows_non_member() {
        let session = active(&["com.game"]);
        assert_eq!(
            decide(Some(&id("com.notes")), &session, &AllowList::default()),
            Decision::Allow
        );
    }

    #[test]
    fn inactive_session_always_allows() {
        let mut session = active(&["com.game"]);
        session.active = false;
        assert_eq!(
            decide(Some(&id("com.game")), &session, &AllowList::default()),
            Decision::Allow
        );
    }

    #[test]
    fn suspension_overrides_block() {
        let mut session = active(&["com.game"]);
        session.suspend_until(Utc::now() + Duration::seconds(3));
        assert_eq!(
            decide(Some(&id("com.game")), &session, &AllowList::default()),
            Decision::Allow
        );
    }

    #[test]
    fn missing_signal_never_blocks() {
        let session = active(&["x"]);
        assert_eq!(decide(None, &session, &AllowList::default()), Decision::Allow);
    }

    #[test]
    fn launcher_is_never_blocked_even_if_listed() {
        let launcher = "com.google.android.apps.nexuslauncher";
        let session = active(&[launcher]);
        assert_eq!(
            decide(Some(&id(launcher)), &session, &AllowList::default()),
            Decision::Allow
        );
    }

    #[test]
    fn configured_extra_launcher_is_never_blocked() {
        let session = active(&["org.custom.home"]);
        let allow = AllowList::with_extras(["org.custom.home"]);
        assert_eq!(
            decide(Some(&id("org.custom.home")), &session, &allow),
            Decision::Allow
        );
    }
}
