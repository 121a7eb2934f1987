//! Server configuration.
//!
//! Read once from the environment at startup and injected into the services
//! that need it:
//!
//! ```bash
//! # Where magic links point
//! KINNECT_PUBLIC_URL=https://kinnect.example.com
//!
//! # Email provider: Resend
//! KINNECT_EMAIL_PROVIDER=resend
//! RESEND_API_KEY=re_...
//!
//! # Email provider: SMTP
//! KINNECT_EMAIL_PROVIDER=smtp
//! SMTP_HOST=smtp.gmail.com
//! SMTP_PORT=587
//! SMTP_USERNAME=user@example.com
//! SMTP_PASSWORD=app_password
//! SMTP_USE_TLS=true
//!
//! # Sender
//! KINNECT_EMAIL_FROM=hello@kinnect.example.com
//! KINNECT_EMAIL_FROM_NAME="Kinnect"
//!
//! # SMS provider: Twilio
//! KINNECT_SMS_PROVIDER=twilio
//! TWILIO_ACCOUNT_SID=AC...
//! TWILIO_AUTH_TOKEN=...
//! TWILIO_FROM_NUMBER=+15550001111
//!
//! # Optional JSON file replacing the built-in message templates
//! KINNECT_TEMPLATES=/etc/kinnect/templates.json
//! ```

use std::env;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL that magic links are built on
    pub public_base_url: Url,
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
    /// Optional template override file
    pub templates_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_url(),
            email: None,
            sms: None,
            templates_path: None,
        }
    }
}

fn default_public_url() -> Url {
    Url::parse(DEFAULT_PUBLIC_URL).expect("default public URL is valid")
}

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Email provider configuration
    pub provider: EmailProviderConfig,
    /// From email address
    pub from_address: String,
    /// Optional from name
    pub from_name: Option<String>,
}

impl EmailConfig {
    /// `Name <address>` when a name is configured, else the bare address.
    pub fn sender(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_address),
            None => self.from_address.clone(),
        }
    }
}

/// Email provider configuration
#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    /// Resend email provider
    Resend {
        /// Resend API key
        #[allow(dead_code)] // Used when email-resend feature is enabled
        api_key: String,
    },
    /// SMTP email provider
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        use_tls: bool,
    },
}

/// SMS configuration
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub provider: SmsProviderConfig,
}

/// SMS provider configuration
#[derive(Debug, Clone)]
pub enum SmsProviderConfig {
    #[allow(dead_code)] // Used when sms-twilio feature is enabled
    Twilio {
        account_sid: String,
        auth_token: String,
        from_number: String,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid email provider: {0}. Expected 'resend' or 'smtp'")]
    InvalidProvider(String),

    #[error("Invalid SMS provider: {0}. Expected 'twilio'")]
    InvalidSmsProvider(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Missing from address: KINNECT_EMAIL_FROM is required when email is configured")]
    MissingFromAddress,

    #[error("SMTP provider requires SMTP_HOST")]
    SmtpMissingHost,

    #[error("Invalid public URL {0}: {1}")]
    InvalidPublicUrl(String, String),
}

fn required(var: &str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
}

fn flag(var: &str, default: bool) -> bool {
    env::var(var)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let public_base_url = match env::var("KINNECT_PUBLIC_URL") {
            Ok(raw) => Url::parse(&raw)
                .map_err(|e| ConfigError::InvalidPublicUrl(raw.clone(), e.to_string()))?,
            Err(_) => default_public_url(),
        };

        Ok(Self {
            public_base_url,
            email: email_from_env()?,
            sms: sms_from_env()?,
            templates_path: env::var("KINNECT_TEMPLATES").ok().map(PathBuf::from),
        })
    }
}

fn email_from_env() -> Result<Option<EmailConfig>, ConfigError> {
    let Ok(provider_type) = env::var("KINNECT_EMAIL_PROVIDER") else {
        return Ok(None);
    };

    let provider = match provider_type.to_lowercase().as_str() {
        "resend" => EmailProviderConfig::Resend {
            api_key: required("RESEND_API_KEY")?,
        },
        "smtp" => {
            let host = env::var("SMTP_HOST").map_err(|_| ConfigError::SmtpMissingHost)?;
            let port_raw = env::var("SMTP_PORT").unwrap_or_else(|_| "587".to_string());
            let port = port_raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(port_raw.clone()))?;

            EmailProviderConfig::Smtp {
                host,
                port,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                use_tls: flag("SMTP_USE_TLS", true),
            }
        }
        other => return Err(ConfigError::InvalidProvider(other.to_string())),
    };

    let from_address =
        env::var("KINNECT_EMAIL_FROM").map_err(|_| ConfigError::MissingFromAddress)?;
    let from_name = env::var("KINNECT_EMAIL_FROM_NAME").ok();

    Ok(Some(EmailConfig {
        provider,
        from_address,
        from_name,
    }))
}

fn sms_from_env() -> Result<Option<SmsConfig>, ConfigError> {
    let Ok(provider_type) = env::var("KINNECT_SMS_PROVIDER") else {
        return Ok(None);
    };

    let provider = match provider_type.to_lowercase().as_str() {
        "twilio" => SmsProviderConfig::Twilio {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: required("TWILIO_AUTH_TOKEN")?,
            from_number: required("TWILIO_FROM_NUMBER")?,
        },
        other => return Err(ConfigError::InvalidSmsProvider(other.to_string())),
    };

    Ok(Some(SmsConfig { provider }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serializes tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "KINNECT_PUBLIC_URL",
        "KINNECT_EMAIL_PROVIDER",
        "RESEND_API_KEY",
        "SMTP_HOST",
        "SMTP_PORT",
        "SMTP_USERNAME",
        "SMTP_PASSWORD",
        "SMTP_USE_TLS",
        "KINNECT_EMAIL_FROM",
        "KINNECT_EMAIL_FROM_NAME",
        "KINNECT_SMS_PROVIDER",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_FROM_NUMBER",
        "KINNECT_TEMPLATES",
    ];

    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
    }

    impl<'a> EnvGuard<'a> {
        fn new() -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            for var in ENV_VARS {
                env::remove_var(var);
            }
            Self { _lock: lock }
        }

        fn set(&self, key: &str, value: &str) {
            env::set_var(key, value);
        }
    }

    impl<'a> Drop for EnvGuard<'a> {
        fn drop(&mut self) {
            for var in ENV_VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _guard = EnvGuard::new();

        let config = ServerConfig::from_env().unwrap();
        assert!(config.email.is_none());
        assert!(config.sms.is_none());
        assert!(config.templates_path.is_none());
        assert_eq!(config.public_base_url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_public_url() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_PUBLIC_URL", "https://kinnect.example.com");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.public_base_url.host_str(), Some("kinnect.example.com"));
    }

    #[test]
    fn test_invalid_public_url() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_PUBLIC_URL", "not a url");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidPublicUrl(_, _))));
    }

    #[test]
    fn test_resend_provider_config() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "resend");
        guard.set("RESEND_API_KEY", "re_test_key");
        guard.set("KINNECT_EMAIL_FROM", "test@example.com");
        guard.set("KINNECT_EMAIL_FROM_NAME", "Test Sender");

        let config = ServerConfig::from_env().unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.from_address, "test@example.com");
        assert_eq!(email.sender(), "Test Sender <test@example.com>");

        match email.provider {
            EmailProviderConfig::Resend { api_key } => assert_eq!(api_key, "re_test_key"),
            _ => panic!("Expected Resend provider"),
        }
    }

    #[test]
    fn test_resend_missing_api_key() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "resend");
        guard.set("KINNECT_EMAIL_FROM", "test@example.com");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_smtp_defaults() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "smtp");
        guard.set("SMTP_HOST", "smtp.example.com");
        guard.set("KINNECT_EMAIL_FROM", "test@example.com");

        let config = ServerConfig::from_env().unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.sender(), "test@example.com");

        match email.provider {
            EmailProviderConfig::Smtp {
                port,
                username,
                password,
                use_tls,
                ..
            } => {
                assert_eq!(port, 587);
                assert!(username.is_none());
                assert!(password.is_none());
                assert!(use_tls);
            }
            _ => panic!("Expected SMTP provider"),
        }
    }

    #[test]
    fn test_smtp_missing_host() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "smtp");
        guard.set("KINNECT_EMAIL_FROM", "test@example.com");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::SmtpMissingHost)));
    }

    #[test]
    fn test_invalid_port() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "smtp");
        guard.set("SMTP_HOST", "smtp.example.com");
        guard.set("SMTP_PORT", "not_a_number");
        guard.set("KINNECT_EMAIL_FROM", "test@example.com");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidPort(p)) if p == "not_a_number"));
    }

    #[test]
    fn test_invalid_provider() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "mailgun");
        guard.set("KINNECT_EMAIL_FROM", "test@example.com");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidProvider(_))));
    }

    #[test]
    fn test_missing_from_address() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_EMAIL_PROVIDER", "RESEND");
        guard.set("RESEND_API_KEY", "re_test_key");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingFromAddress)));
    }

    #[test]
    fn test_twilio_config() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_SMS_PROVIDER", "twilio");
        guard.set("TWILIO_ACCOUNT_SID", "AC123");
        guard.set("TWILIO_AUTH_TOKEN", "secret");
        guard.set("TWILIO_FROM_NUMBER", "+15550001111");

        let config = ServerConfig::from_env().unwrap();
        match config.sms.unwrap().provider {
            SmsProviderConfig::Twilio {
                account_sid,
                from_number,
                ..
            } => {
                assert_eq!(account_sid, "AC123");
                assert_eq!(from_number, "+15550001111");
            }
        }
    }

    #[test]
    fn test_twilio_missing_token() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_SMS_PROVIDER", "twilio");
        guard.set("TWILIO_ACCOUNT_SID", "AC123");
        guard.set("TWILIO_FROM_NUMBER", "+15550001111");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "TWILIO_AUTH_TOKEN"));
    }

    #[test]
    fn test_invalid_sms_provider() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_SMS_PROVIDER", "pigeon");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidSmsProvider(_))));
    }

    #[test]
    fn test_templates_path() {
        let guard = EnvGuard::new();
        guard.set("KINNECT_TEMPLATES", "/etc/kinnect/templates.json");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(
            config.templates_path,
            Some(PathBuf::from("/etc/kinnect/templates.json"))
        );
    }
}
