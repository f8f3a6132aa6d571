use crate::TabId;

/// Prefix of the one-shot alarms that close opened tabs.
pub const CLOSE_TAB_PREFIX: &str = "closeTab";

/// Alarm name for closing `tab_id`, e.g. `closeTab_482`.
pub fn close_tab_alarm(tab_id: TabId) -> String {
    format!("{CLOSE_TAB_PREFIX}_{tab_id}")
}

/// Recover the tab id from a close-tab alarm name.
pub fn parse_close_tab_alarm(name: &str) -> Option<TabId> {
    name.strip_prefix(CLOSE_TAB_PREFIX)?
        .strip_prefix('_')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_embed_the_tab_id() {
        assert_eq!(close_tab_alarm(482), "closeTab_482");
        assert_eq!(parse_close_tab_alarm("closeTab_482"), Some(482));
    }

    #[test]
    fn foreign_names_are_rejected() {
        assert_eq!(parse_close_tab_alarm("closeTab482"), None);
        assert_eq!(parse_close_tab_alarm("refresh_12"), None);
        assert_eq!(parse_close_tab_alarm("closeTab_x"), None);
    }
}
