//! Action names understood by the host.
//!
//! Reply event names are derived from these via [`ReplyTopic`](crate::topic::ReplyTopic);
//! action names therefore must not contain `.`.

pub const OPEN_CONNECTION: &str = "openConnection";
pub const CLOSE_CONNECTION: &str = "closeConnection";
pub const EXECUTE_QUERY: &str = "executeQuery";
pub const TEST_CONNECTION: &str = "testConnection";

pub const GET_ITEM: &str = "getItem";
pub const SET_ITEM: &str = "setItem";
pub const DELETE_ITEM: &str = "deleteItem";

pub const GET_TABS: &str = "getTabs";
pub const OPEN_TAB: &str = "openTab";
pub const SELECT_TAB: &str = "selectTab";
pub const CLOSE_TAB: &str = "closeTab";
pub const SET_TAB_TITLE: &str = "setTabTitle";
pub const SET_TAB_URL: &str = "setTabUrl";
pub const REFRESH_TAB: &str = "refreshTab";

/// Push event carrying the full tab snapshot to every surface.
pub const TABS_BROADCAST: &str = "tabs";
