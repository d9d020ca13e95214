pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Unique id stamped on every outbound signaling message.
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
