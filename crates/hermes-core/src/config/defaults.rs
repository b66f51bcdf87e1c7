//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Hermes".to_string()
}

pub fn default_data_dir() -> String {
    "~/.hermes".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_session_id() -> String {
    "default".to_string()
}

pub fn default_device_name() -> String {
    "Hermes".to_string()
}

pub fn default_reconnect_delay() -> u64 {
    5
}

pub fn default_connect_timeout() -> u64 {
    30
}

pub fn default_db_path() -> String {
    "~/.hermes/data/hermes.db".to_string()
}

pub fn default_flush_interval() -> u64 {
    10
}

pub fn default_creds_debounce() -> u64 {
    3000
}

pub fn default_prefix() -> String {
    ".".to_string()
}
