//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Jamroom mesh configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# dedup_capacity = 100        # 1-10000, recently seen message ids
# subscription_buffer = 256   # 1-65536

[capture]
# prefer_display_audio = true # try system audio before the microphone
# echo_cancellation = false
# noise_suppression = false
# auto_gain_control = false
# sample_rate = 48000         # 8000-192000
# channel_count = 2           # 1-2

[session]
# allow_receive_only = true   # answer offers before sharing starts
# handshake_timeout_secs = 0  # 0-3600, 0 disables
# event_buffer = 256          # 1-65536
# ice_servers = ["stun:stun.l.google.com:19302"]

[relay]
# url = "ws://127.0.0.1:8080"
# port = 8080
# inbox_ttl_secs = 300        # 10-86400
# hello_timeout_secs = 10     # 1-120

[logging]
# level = "info"              # trace, debug, info, warn, error
"##
    .to_string()
}
