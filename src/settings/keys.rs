//! Canonical option key constants and the built-in panel schemas.
//!
//! Use these instead of raw string literals to prevent typo-based key mismatches.

use super::schema::{PanelSchema, SettingShape::*, SettingSpec};

// General
pub const TOP_UP_LINK: &str = "TopUpLink";
pub const CHAT_LINK: &str = "ChatLink";
pub const CHAT_LINK_2: &str = "ChatLink2";
pub const QUOTA_PER_UNIT: &str = "QuotaPerUnit";
pub const RETRY_TIMES: &str = "RetryTimes";
pub const DISPLAY_IN_CURRENCY_ENABLED: &str = "DisplayInCurrencyEnabled";
pub const DISPLAY_TOKEN_STAT_ENABLED: &str = "DisplayTokenStatEnabled";
pub const DEFAULT_COLLAPSE_SIDEBAR: &str = "DefaultCollapseSidebar";

// Credit limit
pub const QUOTA_FOR_NEW_USER: &str = "QuotaForNewUser";
pub const PRE_CONSUMED_QUOTA: &str = "PreConsumedQuota";
pub const QUOTA_FOR_INVITER: &str = "QuotaForInviter";
pub const QUOTA_FOR_INVITEE: &str = "QuotaForInvitee";

// Monitoring
pub const CHANNEL_DISABLE_THRESHOLD: &str = "ChannelDisableThreshold";
pub const QUOTA_REMIND_THRESHOLD: &str = "QuotaRemindThreshold";
pub const AUTOMATIC_DISABLE_CHANNEL_ENABLED: &str = "AutomaticDisableChannelEnabled";
pub const AUTOMATIC_ENABLE_CHANNEL_ENABLED: &str = "AutomaticEnableChannelEnabled";

// Magnification (rate tables)
pub const MODEL_PRICE: &str = "ModelPrice";
pub const MODEL_RATIO: &str = "ModelRatio";
pub const COMPLETION_RATIO: &str = "CompletionRatio";
pub const GROUP_RATIO: &str = "GroupRatio";
pub const USER_USABLE_GROUPS: &str = "UserUsableGroups";

// Chats
pub const CHATS: &str = "Chats";

// Other
pub const NOTICE: &str = "Notice";
pub const SYSTEM_NAME: &str = "SystemName";
pub const LOGO: &str = "Logo";
pub const FOOTER: &str = "Footer";
pub const ABOUT: &str = "About";
pub const HOME_PAGE_CONTENT: &str = "HomePageContent";

// System
pub const SERVER_ADDRESS: &str = "ServerAddress";
pub const WORKER_URL: &str = "WorkerUrl";
pub const WORKER_VALID_KEY: &str = "WorkerValidKey";
pub const PAY_ADDRESS: &str = "PayAddress";
pub const EPAY_ID: &str = "EpayId";
pub const EPAY_KEY: &str = "EpayKey";
pub const PRICE: &str = "Price";
pub const TOPUP_GROUP_RATIO: &str = "TopupGroupRatio";
pub const SMTP_SERVER: &str = "SMTPServer";
pub const SMTP_PORT: &str = "SMTPPort";
pub const SMTP_ACCOUNT: &str = "SMTPAccount";
pub const SMTP_FROM: &str = "SMTPFrom";
pub const SMTP_TOKEN: &str = "SMTPToken";
pub const SMTP_SSL_ENABLED: &str = "SMTPSSLEnabled";
pub const EMAIL_DOMAIN_RESTRICTION_ENABLED: &str = "EmailDomainRestrictionEnabled";
pub const EMAIL_DOMAIN_WHITELIST: &str = "EmailDomainWhitelist";
pub const GITHUB_OAUTH_ENABLED: &str = "GitHubOAuthEnabled";
pub const GITHUB_CLIENT_ID: &str = "GitHubClientId";
pub const GITHUB_CLIENT_SECRET: &str = "GitHubClientSecret";
pub const WECHAT_AUTH_ENABLED: &str = "WeChatAuthEnabled";
pub const WECHAT_SERVER_ADDRESS: &str = "WeChatServerAddress";
pub const WECHAT_SERVER_TOKEN: &str = "WeChatServerToken";
pub const WECHAT_ACCOUNT_QRCODE_IMAGE_URL: &str = "WeChatAccountQRCodeImageURL";
pub const TELEGRAM_OAUTH_ENABLED: &str = "TelegramOAuthEnabled";
pub const TELEGRAM_BOT_TOKEN: &str = "TelegramBotToken";
pub const TELEGRAM_BOT_NAME: &str = "TelegramBotName";

/// Names accepted by [`panel`], in display order.
pub const PANEL_NAMES: &[&str] = &[
    "general",
    "credit-limit",
    "monitoring",
    "magnification",
    "chats",
    "other",
    "system",
];

const GENERAL: &[SettingSpec] = &[
    SettingSpec::new(TOP_UP_LINK, Url),
    SettingSpec::new(CHAT_LINK, Url),
    SettingSpec::new(CHAT_LINK_2, Url),
    SettingSpec::new(QUOTA_PER_UNIT, Numeric),
    SettingSpec::new(RETRY_TIMES, Numeric),
    SettingSpec::new(DISPLAY_IN_CURRENCY_ENABLED, Boolean),
    SettingSpec::new(DISPLAY_TOKEN_STAT_ENABLED, Boolean),
    SettingSpec::new(DEFAULT_COLLAPSE_SIDEBAR, Boolean),
];

const CREDIT_LIMIT: &[SettingSpec] = &[
    SettingSpec::new(QUOTA_FOR_NEW_USER, Numeric),
    SettingSpec::new(PRE_CONSUMED_QUOTA, Numeric),
    SettingSpec::new(QUOTA_FOR_INVITER, Numeric),
    SettingSpec::new(QUOTA_FOR_INVITEE, Numeric),
];

const MONITORING: &[SettingSpec] = &[
    SettingSpec::new(CHANNEL_DISABLE_THRESHOLD, Numeric),
    SettingSpec::new(QUOTA_REMIND_THRESHOLD, Numeric),
    SettingSpec::new(AUTOMATIC_DISABLE_CHANNEL_ENABLED, Boolean),
    SettingSpec::new(AUTOMATIC_ENABLE_CHANNEL_ENABLED, Boolean),
];

const MAGNIFICATION: &[SettingSpec] = &[
    SettingSpec::new(MODEL_PRICE, JsonObject),
    SettingSpec::new(MODEL_RATIO, JsonObject),
    SettingSpec::new(COMPLETION_RATIO, JsonObject),
    SettingSpec::new(GROUP_RATIO, JsonObject),
    SettingSpec::new(USER_USABLE_GROUPS, JsonObject),
];

const CHATS_PANEL: &[SettingSpec] = &[SettingSpec::new(CHATS, JsonArray)];

const OTHER: &[SettingSpec] = &[
    SettingSpec::new(NOTICE, Text),
    SettingSpec::new(SYSTEM_NAME, Text),
    SettingSpec::new(LOGO, Url),
    SettingSpec::new(FOOTER, Text),
    SettingSpec::new(ABOUT, Text),
    SettingSpec::new(HOME_PAGE_CONTENT, Text),
];

const SYSTEM: &[SettingSpec] = &[
    SettingSpec::new(SERVER_ADDRESS, Url),
    SettingSpec::new(WORKER_URL, Url),
    SettingSpec::new(WORKER_VALID_KEY, Secret),
    SettingSpec::new(PAY_ADDRESS, Url),
    SettingSpec::new(EPAY_ID, Text),
    SettingSpec::new(EPAY_KEY, Secret),
    SettingSpec::new(PRICE, Numeric),
    SettingSpec::new(TOPUP_GROUP_RATIO, JsonObject),
    SettingSpec::new(SMTP_SERVER, Text),
    SettingSpec::new(SMTP_PORT, Numeric),
    SettingSpec::new(SMTP_ACCOUNT, Text),
    SettingSpec::new(SMTP_FROM, Text),
    SettingSpec::new(SMTP_TOKEN, Secret),
    SettingSpec::new(SMTP_SSL_ENABLED, Boolean),
    SettingSpec::new(EMAIL_DOMAIN_RESTRICTION_ENABLED, Boolean),
    SettingSpec::gated(EMAIL_DOMAIN_WHITELIST, List, EMAIL_DOMAIN_RESTRICTION_ENABLED),
    SettingSpec::new(GITHUB_OAUTH_ENABLED, Boolean),
    SettingSpec::gated(GITHUB_CLIENT_ID, Text, GITHUB_OAUTH_ENABLED),
    SettingSpec::gated(GITHUB_CLIENT_SECRET, Secret, GITHUB_OAUTH_ENABLED),
    SettingSpec::new(WECHAT_AUTH_ENABLED, Boolean),
    SettingSpec::gated(WECHAT_SERVER_ADDRESS, Url, WECHAT_AUTH_ENABLED),
    SettingSpec::gated(WECHAT_SERVER_TOKEN, Secret, WECHAT_AUTH_ENABLED),
    SettingSpec::gated(WECHAT_ACCOUNT_QRCODE_IMAGE_URL, Url, WECHAT_AUTH_ENABLED),
    SettingSpec::new(TELEGRAM_OAUTH_ENABLED, Boolean),
    SettingSpec::gated(TELEGRAM_BOT_TOKEN, Secret, TELEGRAM_OAUTH_ENABLED),
    SettingSpec::gated(TELEGRAM_BOT_NAME, Text, TELEGRAM_OAUTH_ENABLED),
];

/// Look up a built-in panel schema by name.
pub fn panel(name: &str) -> Option<PanelSchema> {
    let specs = match name {
        "general" => GENERAL,
        "credit-limit" => CREDIT_LIMIT,
        "monitoring" => MONITORING,
        "magnification" => MAGNIFICATION,
        "chats" => CHATS_PANEL,
        "other" => OTHER,
        "system" => SYSTEM,
        _ => return None,
    };
    Some(PanelSchema::new(name, specs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::schema::SettingShape;

    #[test]
    fn test_every_panel_name_resolves() {
        for name in PANEL_NAMES {
            let schema = panel(name).unwrap();
            assert_eq!(schema.name(), *name);
            assert!(!schema.specs().is_empty());
        }
        assert!(panel("drawing").is_none());
    }

    #[test]
    fn test_rate_tables_are_json_objects() {
        let schema = panel("magnification").unwrap();
        assert!(schema
            .specs()
            .iter()
            .all(|spec| spec.shape == SettingShape::JsonObject));
    }

    #[test]
    fn test_gates_reference_declared_flags() {
        let schema = panel("system").unwrap();
        for spec in schema.specs() {
            if let Some(flag) = spec.requires {
                assert!(schema.contains(flag), "{} gated on undeclared {flag}", spec.key);
            }
        }
    }
}
