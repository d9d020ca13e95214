//! Per-section validators.

use super::helpers::validate_range;
use crate::schema::MeshConfig;

pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &MeshConfig) {
    validate_range(
        errors,
        "signaling.dedup_capacity",
        config.signaling.dedup_capacity as u64,
        1,
        10_000,
    );
    validate_range(
        errors,
        "signaling.subscription_buffer",
        config.signaling.subscription_buffer as u64,
        1,
        65_536,
    );
}

pub(crate) fn validate_capture(errors: &mut Vec<String>, config: &MeshConfig) {
    validate_range(
        errors,
        "capture.sample_rate",
        config.capture.sample_rate as u64,
        8_000,
        192_000,
    );
    validate_range(
        errors,
        "capture.channel_count",
        config.capture.channel_count as u64,
        1,
        2,
    );
}

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &MeshConfig) {
    validate_range(
        errors,
        "session.handshake_timeout_secs",
        config.session.handshake_timeout_secs,
        0,
        3_600,
    );
    validate_range(
        errors,
        "session.event_buffer",
        config.session.event_buffer as u64,
        1,
        65_536,
    );
    for url in &config.session.ice_servers {
        let scheme_ok = ["stun:", "turn:", "turns:"]
            .iter()
            .any(|scheme| url.starts_with(scheme));
        if !scheme_ok {
            errors.push(format!(
                "session.ice_servers entry '{url}' must start with stun:, turn: or turns:"
            ));
        }
    }
}

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &MeshConfig) {
    let url = &config.relay.url;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!("relay.url '{url}' must start with ws:// or wss://"));
    }
    validate_range(
        errors,
        "relay.inbox_ttl_secs",
        config.relay.inbox_ttl_secs,
        10,
        86_400,
    );
    validate_range(
        errors,
        "relay.hello_timeout_secs",
        config.relay.hello_timeout_secs,
        1,
        120,
    );
}
