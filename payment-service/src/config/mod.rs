use anyhow::Result;
use dotenvy::dotenv;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub paytr: PaytrConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

/// PayTR merchant credentials and endpoints.
///
/// Injected into the gateway client at construction time; nothing reads
/// these from ambient globals after startup.
#[derive(Deserialize, Clone, Debug)]
pub struct PaytrConfig {
    pub merchant_id: String,
    pub merchant_key: Secret<String>,
    pub merchant_salt: Secret<String>,
    /// Sandbox flag sent as `test_mode` ("1" test, "0" production).
    pub test_mode: bool,
    /// Base URL of the token API, e.g. "https://www.paytr.com/odeme/api".
    pub api_base_url: String,
    /// Base URL the hosted payment page token is appended to.
    pub iframe_base_url: String,
    /// Browser redirect targets registered with the gateway.
    pub ok_url: String,
    pub fail_url: String,
    /// Client-side limit on the token request; the gateway documents ~30s.
    pub timeout_secs: u64,
}

impl PaytrConfig {
    /// Credentials are optional at startup but payment creation fails closed
    /// without them.
    pub fn is_configured(&self) -> bool {
        !self.merchant_id.is_empty()
            && !self.merchant_key.expose_secret().is_empty()
            && !self.merchant_salt.expose_secret().is_empty()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("PAYMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PAYMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3003".to_string())
            .parse()?;

        let db_url = env::var("PAYMENT_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name =
            env::var("PAYMENT_DATABASE_NAME").unwrap_or_else(|_| "mumdeco".to_string());

        let merchant_id = env::var("PAYTR_MERCHANT_ID").unwrap_or_default();
        let merchant_key = env::var("PAYTR_MERCHANT_KEY").unwrap_or_default();
        let merchant_salt = env::var("PAYTR_MERCHANT_SALT").unwrap_or_default();
        let test_mode = env::var("PAYTR_TEST_MODE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let api_base_url = env::var("PAYTR_API_BASE_URL")
            .unwrap_or_else(|_| "https://www.paytr.com/odeme/api".to_string());
        let iframe_base_url = env::var("PAYTR_IFRAME_BASE_URL")
            .unwrap_or_else(|_| "https://www.paytr.com/odeme/guvenli".to_string());
        let ok_url = env::var("PAYTR_OK_URL")
            .unwrap_or_else(|_| "https://mumdeco.com/payment/success".to_string());
        let fail_url = env::var("PAYTR_FAIL_URL")
            .unwrap_or_else(|_| "https://mumdeco.com/payment/failure".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            paytr: PaytrConfig {
                merchant_id,
                merchant_key: Secret::new(merchant_key),
                merchant_salt: Secret::new(merchant_salt),
                test_mode,
                api_base_url,
                iframe_base_url,
                ok_url,
                fail_url,
                timeout_secs: 30,
            },
            service_name: "payment-service".to_string(),
        })
    }
}
