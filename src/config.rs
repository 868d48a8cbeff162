use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub twilio: TwilioConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub raffle: RaffleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    /// Public callback URL configured on the Twilio number. Signatures are
    /// computed over this exact string when set.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub validate_signature: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// bcrypt hash, takes precedence over `password`
    #[serde(default)]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleConfig {
    #[serde(default = "default_number_pattern")]
    pub number_pattern: String,
    #[serde(default = "default_winner_copy")]
    pub winner_copy: String,
    #[serde(default = "default_loser_copy")]
    pub loser_copy: String,
    #[serde(default = "default_already_submitted_copy")]
    pub already_submitted_copy: String,
    #[serde(default = "default_invalid_number_copy")]
    pub invalid_number_copy: String,
    #[serde(default = "default_error_copy")]
    pub error_copy: String,
    #[serde(default)]
    pub drawing_window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub drawing_window_end: Option<DateTime<Utc>>,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            number_pattern: default_number_pattern(),
            winner_copy: default_winner_copy(),
            loser_copy: default_loser_copy(),
            already_submitted_copy: default_already_submitted_copy(),
            invalid_number_copy: default_invalid_number_copy(),
            error_copy: default_error_copy(),
            drawing_window_start: None,
            drawing_window_end: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_number_pattern() -> String {
    r"^[0-9]{4,5}$".to_string()
}

fn default_winner_copy() -> String {
    "WINNER! WINNER! CHICKEN DINNER!".to_string()
}

fn default_loser_copy() -> String {
    "NEXT TIME, USE THE FORCE!".to_string()
}

fn default_already_submitted_copy() -> String {
    "You've already submitted this number.".to_string()
}

fn default_invalid_number_copy() -> String {
    "Please submit a valid raffle number!".to_string()
}

fn default_error_copy() -> String {
    "Sorry, something went wrong. Please try again later.".to_string()
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 配置文件不存在时完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse {config_path}: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    twilio: TwilioConfig {
                        account_sid: get_env("TWILIO_ACCOUNT_SID").unwrap_or_default(),
                        auth_token: get_env("TWILIO_AUTH_TOKEN").unwrap_or_default(),
                        from_phone: get_env("TWILIO_FROM_PHONE").unwrap_or_default(),
                        webhook_url: get_env("TWILIO_WEBHOOK_URL"),
                        validate_signature: get_env_parse("TWILIO_VALIDATE_SIGNATURE", true),
                    },
                    admin: AdminConfig {
                        username: get_env("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                        password: get_env("ADMIN_PASSWORD"),
                        password_hash: get_env("ADMIN_PASSWORD_HASH"),
                    },
                    raffle: RaffleConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Unable to read {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("TWILIO_ACCOUNT_SID") {
            config.twilio.account_sid = v;
        }
        if let Ok(v) = env::var("TWILIO_AUTH_TOKEN") {
            config.twilio.auth_token = v;
        }
        if let Ok(v) = env::var("TWILIO_FROM_PHONE") {
            config.twilio.from_phone = v;
        }
        if let Ok(v) = env::var("TWILIO_WEBHOOK_URL") {
            config.twilio.webhook_url = Some(v);
        }
        if let Ok(v) = env::var("TWILIO_VALIDATE_SIGNATURE")
            && let Ok(b) = v.parse()
        {
            config.twilio.validate_signature = b;
        }
        if let Ok(v) = env::var("ADMIN_USERNAME") {
            config.admin.username = v;
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD") {
            config.admin.password = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD_HASH") {
            config.admin.password_hash = Some(v);
        }

        // Raffle
        if let Ok(v) = env::var("RAFFLE_NUMBER_PATTERN") {
            config.raffle.number_pattern = v;
        }
        if let Ok(v) = env::var("RAFFLE_WINNER_COPY") {
            config.raffle.winner_copy = v;
        }
        if let Ok(v) = env::var("RAFFLE_LOSER_COPY") {
            config.raffle.loser_copy = v;
        }
        if let Ok(v) = env::var("RAFFLE_ALREADY_SUBMITTED_COPY") {
            config.raffle.already_submitted_copy = v;
        }
        if let Ok(v) = env::var("RAFFLE_INVALID_NUMBER_COPY") {
            config.raffle.invalid_number_copy = v;
        }
        if let Ok(v) = env::var("RAFFLE_ERROR_COPY") {
            config.raffle.error_copy = v;
        }
        if let Ok(v) = env::var("RAFFLE_DRAWING_WINDOW_START") {
            config.raffle.drawing_window_start = Some(
                parse_datetime(&v).ok_or("RAFFLE_DRAWING_WINDOW_START must be RFC 3339")?,
            );
        }
        if let Ok(v) = env::var("RAFFLE_DRAWING_WINDOW_END") {
            config.raffle.drawing_window_end = Some(
                parse_datetime(&v).ok_or("RAFFLE_DRAWING_WINDOW_END must be RFC 3339")?,
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raffle_section_defaults_when_omitted() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "sqlite::memory:"
            max_connections = 1

            [twilio]
            account_sid = "AC123"
            auth_token = "secret"
            from_phone = "+18085550000"

            [admin]
            username = "staff"
            password = "hunter2"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.twilio.validate_signature);
        assert!(config.twilio.webhook_url.is_none());
        assert_eq!(config.raffle.number_pattern, r"^[0-9]{4,5}$");
        assert_eq!(config.raffle.loser_copy, "NEXT TIME, USE THE FORCE!");
        assert!(config.admin.password_hash.is_none());
    }

    #[test]
    fn test_raffle_section_overrides() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            url = "postgres://localhost/raffle"
            max_connections = 5

            [twilio]
            account_sid = "AC123"
            auth_token = "secret"
            from_phone = "+18085550000"
            webhook_url = "https://raffle.example.com/sms/raffle-check"
            validate_signature = false

            [admin]
            username = "staff"

            [raffle]
            number_pattern = "^[0-9]{1,4}$"
            winner_copy = "You won!"
            drawing_window_start = "2015-05-14T00:00:00Z"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(!config.twilio.validate_signature);
        assert_eq!(config.raffle.number_pattern, "^[0-9]{1,4}$");
        assert_eq!(config.raffle.winner_copy, "You won!");
        assert_eq!(config.raffle.already_submitted_copy, "You've already submitted this number.");
        assert!(config.raffle.drawing_window_start.is_some());
        assert!(config.raffle.drawing_window_end.is_none());
    }

    #[test]
    fn test_parse_datetime() {
        assert!(parse_datetime("2015-05-16T23:59:59-10:00").is_some());
        assert!(parse_datetime("May 16").is_none());
    }
}
