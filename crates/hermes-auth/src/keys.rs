use std::fmt;

/// Families of key material the protocol layer stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Identity,
    Session,
    PreKey,
    SignedPreKey,
    SenderKey,
    AppStateSyncKey,
    AppStateVersion,
    AppStateMac,
    LidMapping,
    DeviceList,
    Skdm,
    BaseKey,
    ForgetSenderKey,
}

impl KeyKind {
    pub const ALL: [KeyKind; 13] = [
        Self::Identity,
        Self::Session,
        Self::PreKey,
        Self::SignedPreKey,
        Self::SenderKey,
        Self::AppStateSyncKey,
        Self::AppStateVersion,
        Self::AppStateMac,
        Self::LidMapping,
        Self::DeviceList,
        Self::Skdm,
        Self::BaseKey,
        Self::ForgetSenderKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Session => "session",
            Self::PreKey => "pre-key",
            Self::SignedPreKey => "signed-pre-key",
            Self::SenderKey => "sender-key",
            Self::AppStateSyncKey => "app-state-sync-key",
            Self::AppStateVersion => "app-state-version",
            Self::AppStateMac => "app-state-mac",
            Self::LidMapping => "lid-mapping",
            Self::DeviceList => "device-list",
            Self::Skdm => "skdm",
            Self::BaseKey => "base-key",
            Self::ForgetSenderKey => "forget-sender-key",
        }
    }

    /// Flat storage id: `"{kind}-{id}"`.
    pub fn key_id(&self, id: &str) -> String {
        format!("{}-{id}", self.as_str())
    }

    /// The `id` part of a flat storage id of this kind.
    pub(crate) fn strip<'a>(&self, flat: &'a str) -> Option<&'a str> {
        flat.strip_prefix(self.as_str())?.strip_prefix('-')
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_format() {
        assert_eq!(KeyKind::PreKey.key_id("7"), "pre-key-7");
        assert_eq!(KeyKind::Session.key_id("123@s.whatsapp.net.0"), "session-123@s.whatsapp.net.0");
    }

    #[test]
    fn test_strip_does_not_cross_kinds() {
        // "pre-key" is a prefix of neither "signed-pre-key" ids nor the reverse.
        let flat = KeyKind::SignedPreKey.key_id("3");
        assert_eq!(KeyKind::SignedPreKey.strip(&flat), Some("3"));
        assert_eq!(KeyKind::PreKey.strip(&flat), None);

        // "app-state-sync-key-x" must not be read as an "app-state-..." sibling.
        let flat = KeyKind::AppStateSyncKey.key_id("x");
        assert_eq!(KeyKind::AppStateVersion.strip(&flat), None);
    }
}
