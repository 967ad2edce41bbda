use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub provisioner: ProvisionerConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default = "default_plans")]
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub trial: TrialConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub miniapp: MiniAppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// Channel a user must join before the trial is issued, e.g. `@mychannel`.
    pub channel_id: String,
    #[serde(default)]
    pub support_url: Option<String>,
    #[serde(default)]
    pub welcome_animation_url: Option<String>,
    #[serde(default)]
    pub bot_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub region: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub no_proxy_hosts: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: String::new(),
            region: "nl".to_string(),
            timeout_secs: 10,
            no_proxy_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub shop_id: String,
    #[serde(default)]
    pub secret_key: String,
    pub api_base: String,
    pub return_url: String,
    pub currency: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            shop_id: String::new(),
            secret_key: String::new(),
            api_base: "https://api.yookassa.ru/v3".to_string(),
            return_url: "https://t.me".to_string(),
            currency: "RUB".to_string(),
            poll_interval_secs: 10,
            max_poll_attempts: 60,
        }
    }
}

/// A purchasable period; a month is always 30 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub months: u32,
    pub price_rub: u32,
}

impl Plan {
    pub fn days(&self) -> i64 {
        i64::from(self.months) * 30
    }
}

fn default_plans() -> Vec<Plan> {
    [(1, 149), (3, 399), (6, 699), (12, 999)]
        .into_iter()
        .map(|(months, price_rub)| Plan { months, price_rub })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialConfig {
    pub days: i64,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self { days: 14 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Client link with a `{token}` placeholder.
    pub link_template: String,
    /// Prefix of the VPN app's import deep link.
    pub import_scheme: String,
    pub ios_app_url: String,
    pub android_app_url: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            link_template: "vless://{token}@127.0.0.1:443?type=tcp&security=reality&fp=chrome&flow=xtls-rprx-vision#ShardVPN".to_string(),
            import_scheme: "v2raytun://import/".to_string(),
            ios_app_url: "https://apps.apple.com/app/v2raytun/id6448898396".to_string(),
            android_app_url: "https://play.google.com/store/apps/details?id=com.v2raytun.app"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniAppConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

impl Default for MiniAppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            base_url: "https://example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/users.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub session_ttl_secs: u64,
    pub broadcast_delay_ms: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 300,
            broadcast_delay_ms: 50,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::find_config_file()?;
        let config_content = std::fs::read_to_string(&config_path)?;
        let mut settings = Self::from_toml(&config_content)?;
        settings.apply_env_overrides(|k| std::env::var(k).ok());

        if settings.telegram.token.trim().is_empty() {
            return Err("BOT_TOKEN is not set (env or [telegram].token)".into());
        }
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("BOT_TOKEN") {
            self.telegram.token = v;
        }
        if let Some(v) = non_empty("PROVISIONER_API_KEY") {
            self.provisioner.api_key = v;
        }
        if let Some(v) = non_empty("YOOKASSA_SHOP_ID") {
            self.payment.shop_id = v;
        }
        if let Some(v) = non_empty("YOOKASSA_SECRET_KEY") {
            self.payment.secret_key = v;
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.telegram.admin_ids.contains(&user_id)
    }

    pub fn plan_for_months(&self, months: u32) -> Option<Plan> {
        self.plans.iter().copied().find(|p| p.months == months)
    }

    fn find_config_file() -> Result<String, Box<dyn std::error::Error>> {
        let possible_names = ["custom-config.toml", "config.toml"];

        for name in &possible_names {
            if Path::new(name).exists() {
                return Ok(name.to_string());
            }
        }

        Err("Configuration file not found. Please create custom-config.toml or config.toml".into())
    }
}
