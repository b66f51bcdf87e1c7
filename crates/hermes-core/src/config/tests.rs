use super::*;

#[test]
fn test_defaults_when_sections_missing() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.hermes.data_dir, "~/.hermes");
    assert_eq!(cfg.whatsapp.reconnect_delay_secs, 5);
    assert_eq!(cfg.whatsapp.connect_timeout_secs, 30);
    assert_eq!(cfg.persistence.backend, PersistenceBackend::File);
    assert_eq!(cfg.persistence.creds_debounce_ms, 3000);
    assert_eq!(cfg.modules.prefix, ".");
    assert!(cfg.modules.self_only);
    assert!(!cfg.telegram.enabled);
}

#[test]
fn test_parse_full_config() {
    let toml_str = r#"
        [hermes]
        data_dir = "/var/lib/hermes"

        [whatsapp]
        session_id = "work"
        reconnect_delay_secs = 2

        [persistence]
        backend = "sqlite"
        db_path = "/tmp/hermes.db"
        creds_debounce_ms = 1500

        [modules]
        prefix = "!"
        self_only = false
        allowed_users = ["5511999887766"]
        disabled = ["search"]

        [telegram]
        enabled = true
        bot_token = "123:abc"
        chat_id = -100200
        mirror_messages = false
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.whatsapp.session_id, "work");
    assert_eq!(cfg.whatsapp.reconnect_delay(), Duration::from_secs(2));
    assert_eq!(cfg.whatsapp.connect_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.persistence.backend, PersistenceBackend::Sqlite);
    assert_eq!(cfg.persistence.creds_debounce(), Duration::from_millis(1500));
    assert_eq!(cfg.modules.prefix, "!");
    assert_eq!(cfg.modules.disabled, vec!["search"]);
    assert_eq!(cfg.telegram.chat_id, -100200);
    assert!(!cfg.telegram.mirror_messages);
    assert!(cfg.telegram.mirror_status);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_env_overrides_secrets() {
    let mut cfg = Config::default();
    cfg.apply_env_overrides(|key| match key {
        ENV_TELEGRAM_TOKEN => Some(" 999:xyz ".to_string()),
        ENV_TELEGRAM_CHAT => Some("42".to_string()),
        _ => None,
    });
    assert_eq!(cfg.telegram.bot_token, "999:xyz");
    assert_eq!(cfg.telegram.chat_id, 42);
}

#[test]
fn test_env_override_ignores_bad_chat_id() {
    let mut cfg = Config::default();
    cfg.telegram.chat_id = 7;
    cfg.apply_env_overrides(|key| (key == ENV_TELEGRAM_CHAT).then(|| "not-a-number".to_string()));
    assert_eq!(cfg.telegram.chat_id, 7);
}

#[test]
fn test_validate_rejects_telegram_without_token() {
    let mut cfg = Config::default();
    cfg.telegram.enabled = true;
    cfg.telegram.chat_id = 1;
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("bot_token"));
}

#[test]
fn test_validate_rejects_empty_prefix() {
    let mut cfg = Config::default();
    cfg.modules.prefix = "  ".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__hermes_test__/config.toml").unwrap();
    assert_eq!(cfg.whatsapp.session_id, "default");
}

#[test]
fn test_data_path_expands_home() {
    let cfg = HermesConfig {
        data_dir: "/srv/hermes".to_string(),
        ..Default::default()
    };
    assert_eq!(
        cfg.data_path("auth/default.json"),
        PathBuf::from("/srv/hermes/auth/default.json")
    );
}

#[test]
fn test_shellexpand_passthrough() {
    assert_eq!(shellexpand("/absolute/path"), "/absolute/path");
    assert_eq!(shellexpand("relative"), "relative");
}
