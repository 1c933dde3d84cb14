//! Per-user topic names. These strings are shared with peer implementations
//! and must not change.

pub fn user_requests(user_id: &str) -> String {
    format!("/user/{user_id}/request")
}

pub fn user_responses(user_id: &str) -> String {
    format!("/user/{user_id}/response")
}

pub fn user_updates(user_id: &str) -> String {
    format!("/user/{user_id}/update")
}
