//! PayTR gateway client.
//!
//! Implements the token API for payment initiation and hash verification
//! for the server-to-server payment callback.

use crate::config::PaytrConfig;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// PayTR client for the token endpoint and callback verification.
#[derive(Clone)]
pub struct PaytrClient {
    client: Client,
    config: PaytrConfig,
    callback_schemes: Vec<CallbackScheme>,
}

/// Everything that participates in the outbound token hash, in the
/// gateway's documented concatenation order. Reordering or omitting a field
/// produces a hash the gateway rejects with no diagnostic.
#[derive(Debug)]
pub struct TokenRequest {
    pub merchant_oid: String,
    pub user_ip: String,
    pub email: String,
    pub user_name: String,
    pub user_address: String,
    pub user_phone: String,
    /// Minor currency units.
    pub payment_amount: i64,
    /// Base64 basket from the encoder, sent byte-for-byte.
    pub user_basket: String,
    pub currency: String,
    pub no_installment: u8,
    pub max_installment: u8,
    pub ok_url: String,
    pub fail_url: String,
}

/// Token endpoint response: `{status, token?, reason?}`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub status: String,
    pub token: Option<String>,
    pub reason: Option<String>,
}

/// Candidate constructions for the callback hash.
///
/// The gateway's callback signing scheme is inconsistently documented across
/// integrations, so verification walks an ordered list and accepts the first
/// match. The documented HMAC formula goes first; anything after it matching
/// is logged loudly as a signal the list can be collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackScheme {
    /// base64(HMAC-SHA256(oid + salt + status + amount, merchant_key)),
    /// the gateway's documented formula.
    HmacKeyOidSaltStatusAmount,
    /// base64(SHA-256(oid + salt + status + amount))
    Sha256OidSaltStatusAmount,
    /// base64(SHA-256(oid + status + amount + salt))
    Sha256OidStatusAmountSalt,
    /// base64(SHA-256(salt + oid + status + amount))
    Sha256SaltOidStatusAmount,
    /// base64(HMAC-SHA256(oid + status + amount, merchant_salt))
    HmacSaltOidStatusAmount,
    /// base64(HMAC-SHA256(oid + status + amount + salt, merchant_key))
    HmacKeyOidStatusAmountSalt,
}

impl CallbackScheme {
    /// The default ordered candidate list.
    pub fn default_chain() -> Vec<CallbackScheme> {
        vec![
            CallbackScheme::HmacKeyOidSaltStatusAmount,
            CallbackScheme::Sha256OidSaltStatusAmount,
            CallbackScheme::Sha256OidStatusAmountSalt,
            CallbackScheme::Sha256SaltOidStatusAmount,
            CallbackScheme::HmacSaltOidStatusAmount,
            CallbackScheme::HmacKeyOidStatusAmountSalt,
        ]
    }

    /// Compute this candidate's digest for the given callback fields.
    /// Pure: same inputs, same output.
    pub fn compute(
        &self,
        merchant_oid: &str,
        status: &str,
        total_amount: &str,
        merchant_key: &str,
        merchant_salt: &str,
    ) -> Result<String> {
        let digest = match self {
            CallbackScheme::HmacKeyOidSaltStatusAmount => hmac_b64(
                merchant_key,
                &format!("{merchant_oid}{merchant_salt}{status}{total_amount}"),
            )?,
            CallbackScheme::Sha256OidSaltStatusAmount => {
                sha256_b64(&format!("{merchant_oid}{merchant_salt}{status}{total_amount}"))
            }
            CallbackScheme::Sha256OidStatusAmountSalt => {
                sha256_b64(&format!("{merchant_oid}{status}{total_amount}{merchant_salt}"))
            }
            CallbackScheme::Sha256SaltOidStatusAmount => {
                sha256_b64(&format!("{merchant_salt}{merchant_oid}{status}{total_amount}"))
            }
            CallbackScheme::HmacSaltOidStatusAmount => hmac_b64(
                merchant_salt,
                &format!("{merchant_oid}{status}{total_amount}"),
            )?,
            CallbackScheme::HmacKeyOidStatusAmountSalt => hmac_b64(
                merchant_key,
                &format!("{merchant_oid}{status}{total_amount}{merchant_salt}"),
            )?,
        };
        Ok(digest)
    }
}

fn hmac_b64(key: &str, payload: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| anyhow!("Invalid key length"))?;
    mac.update(payload.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn sha256_b64(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

impl PaytrClient {
    pub fn new(config: PaytrConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config,
            callback_schemes: CallbackScheme::default_chain(),
        }
    }

    /// Override the candidate chain (ordered, first match wins).
    pub fn with_callback_schemes(mut self, schemes: Vec<CallbackScheme>) -> Self {
        self.callback_schemes = schemes;
        self
    }

    /// Check if PayTR is configured (merchant credentials are set).
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn test_mode_flag(&self) -> &'static str {
        if self.config.test_mode {
            "1"
        } else {
            "0"
        }
    }

    /// Hosted payment page URL for a granted token.
    pub fn iframe_url(&self, token: &str) -> String {
        format!("{}/{}", self.config.iframe_base_url, token)
    }

    pub fn default_ok_url(&self) -> &str {
        &self.config.ok_url
    }

    pub fn default_fail_url(&self) -> &str {
        &self.config.fail_url
    }

    /// Compute the outbound token hash.
    ///
    /// Concatenation order is the gateway's contract:
    /// `merchant_id + user_ip + merchant_oid + email + payment_amount +
    /// user_basket + no_installment + max_installment + currency + test_mode`,
    /// then the merchant salt is appended and the whole string is
    /// HMAC-SHA256'd with the merchant key, base64 output.
    pub fn compute_token_hash(&self, req: &TokenRequest) -> Result<String> {
        let base = format!(
            "{}{}{}{}{}{}{}{}{}{}",
            self.config.merchant_id,
            req.user_ip,
            req.merchant_oid,
            req.email,
            req.payment_amount,
            req.user_basket,
            req.no_installment,
            req.max_installment,
            req.currency,
            self.test_mode_flag(),
        );
        let salted = format!("{}{}", base, self.config.merchant_salt.expose_secret());
        hmac_b64(self.config.merchant_key.expose_secret(), &salted)
    }

    /// Request a payment token from the gateway.
    ///
    /// Posts the signed form payload to the token endpoint and returns the
    /// raw `{status, token, reason}` response; the orchestrator decides what
    /// a failure means for the order.
    pub async fn get_token(&self, req: &TokenRequest) -> Result<TokenResponse> {
        if !self.is_configured() {
            return Err(anyhow!("PayTR credentials not configured"));
        }

        let paytr_token = self.compute_token_hash(req)?;
        let amount = req.payment_amount.to_string();
        let no_installment = req.no_installment.to_string();
        let max_installment = req.max_installment.to_string();
        let timeout_limit = self.config.timeout_secs.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("merchant_id", self.config.merchant_id.as_str()),
            ("user_ip", req.user_ip.as_str()),
            ("merchant_oid", req.merchant_oid.as_str()),
            ("email", req.email.as_str()),
            ("payment_amount", amount.as_str()),
            ("payment_type", "card"),
            ("currency", req.currency.as_str()),
            ("user_basket", req.user_basket.as_str()),
            ("no_installment", no_installment.as_str()),
            ("max_installment", max_installment.as_str()),
            ("non_3d", "0"),
            ("test_mode", self.test_mode_flag()),
            ("merchant_ok_url", req.ok_url.as_str()),
            ("merchant_fail_url", req.fail_url.as_str()),
            ("user_name", req.user_name.as_str()),
            ("user_address", req.user_address.as_str()),
            ("user_phone", req.user_phone.as_str()),
            ("debug_on", "0"),
            ("timeout_limit", timeout_limit.as_str()),
            ("paytr_token", paytr_token.as_str()),
        ];

        let url = format!("{}/get-token", self.config.api_base_url);

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "PayTR get-token response received");

        if !status.is_success() {
            return Err(anyhow!("PayTR token endpoint returned HTTP {}", status));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("unparseable PayTR token response: {}", e))?;
        Ok(parsed)
    }

    /// Verify a callback hash against the candidate chain.
    ///
    /// Returns the matching scheme, or `None` when no candidate matches (the
    /// callback must then be rejected without touching order state). A match
    /// on any non-first candidate logs a warning: that is the signal to pin
    /// the chain down to the one formula the live gateway actually uses.
    pub fn verify_callback_hash(
        &self,
        merchant_oid: &str,
        status: &str,
        total_amount: &str,
        claimed_hash: &str,
    ) -> Result<Option<CallbackScheme>> {
        let key = self.config.merchant_key.expose_secret();
        let salt = self.config.merchant_salt.expose_secret();

        for (index, scheme) in self.callback_schemes.iter().enumerate() {
            let computed = scheme.compute(merchant_oid, status, total_amount, key, salt)?;
            if computed == claimed_hash {
                if index > 0 {
                    tracing::warn!(
                        merchant_oid = %merchant_oid,
                        candidate_index = index,
                        scheme = ?scheme,
                        "callback hash matched a non-primary candidate; confirm the \
                         gateway's formula and collapse the chain"
                    );
                } else {
                    tracing::debug!(
                        merchant_oid = %merchant_oid,
                        "callback hash verified with primary scheme"
                    );
                }
                return Ok(Some(*scheme));
            }
        }

        tracing::warn!(
            merchant_oid = %merchant_oid,
            claimed_status = %status,
            "callback hash matched no candidate scheme; rejecting"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaytrConfig;
    use secrecy::Secret;

    fn test_config() -> PaytrConfig {
        PaytrConfig {
            merchant_id: "123456".to_string(),
            merchant_key: Secret::new("test-merchant-key".to_string()),
            merchant_salt: Secret::new("test-merchant-salt".to_string()),
            test_mode: true,
            api_base_url: "https://www.paytr.com/odeme/api".to_string(),
            iframe_base_url: "https://www.paytr.com/odeme/guvenli".to_string(),
            ok_url: "https://mumdeco.com/payment/success".to_string(),
            fail_url: "https://mumdeco.com/payment/failure".to_string(),
            timeout_secs: 30,
        }
    }

    fn token_request() -> TokenRequest {
        TokenRequest {
            merchant_oid: "ORDER1700000000000abc".to_string(),
            user_ip: "203.0.113.7".to_string(),
            email: "a@b.com".to_string(),
            user_name: "Ada Lovelace".to_string(),
            user_address: "İstanbul".to_string(),
            user_phone: "5551234567".to_string(),
            payment_amount: 30000,
            user_basket: "W1siTGF2ZW5kZXIiLCIxNTAwMCIsMl1d".to_string(),
            currency: "TRY".to_string(),
            no_installment: 0,
            max_installment: 0,
            ok_url: "https://mumdeco.com/payment/success".to_string(),
            fail_url: "https://mumdeco.com/payment/failure".to_string(),
        }
    }

    #[test]
    fn token_hash_is_deterministic() {
        let client = PaytrClient::new(test_config());
        let req = token_request();
        let first = client.compute_token_hash(&req).unwrap();
        let second = client.compute_token_hash(&req).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn token_hash_is_sensitive_to_every_field() {
        let client = PaytrClient::new(test_config());
        let base = client.compute_token_hash(&token_request()).unwrap();

        let mut req = token_request();
        req.payment_amount = 30001;
        assert_ne!(client.compute_token_hash(&req).unwrap(), base);

        let mut req = token_request();
        req.merchant_oid = "ORDER1700000000000abd".to_string();
        assert_ne!(client.compute_token_hash(&req).unwrap(), base);

        let mut req = token_request();
        req.currency = "USD".to_string();
        assert_ne!(client.compute_token_hash(&req).unwrap(), base);

        let mut req = token_request();
        req.email = "b@b.com".to_string();
        assert_ne!(client.compute_token_hash(&req).unwrap(), base);

        let mut req = token_request();
        req.user_basket = "W10=".to_string();
        assert_ne!(client.compute_token_hash(&req).unwrap(), base);
    }

    #[test]
    fn callback_accepts_primary_scheme() {
        let client = PaytrClient::new(test_config());
        let hash = CallbackScheme::HmacKeyOidSaltStatusAmount
            .compute(
                "ORDER123",
                "success",
                "30000",
                "test-merchant-key",
                "test-merchant-salt",
            )
            .unwrap();

        let matched = client
            .verify_callback_hash("ORDER123", "success", "30000", &hash)
            .unwrap();
        assert_eq!(matched, Some(CallbackScheme::HmacKeyOidSaltStatusAmount));
    }

    #[test]
    fn callback_accepts_fallback_scheme() {
        let client = PaytrClient::new(test_config());
        let hash = CallbackScheme::Sha256OidStatusAmountSalt
            .compute(
                "ORDER123",
                "success",
                "30000",
                "test-merchant-key",
                "test-merchant-salt",
            )
            .unwrap();

        let matched = client
            .verify_callback_hash("ORDER123", "success", "30000", &hash)
            .unwrap();
        assert_eq!(matched, Some(CallbackScheme::Sha256OidStatusAmountSalt));
    }

    #[test]
    fn callback_rejects_unknown_hash() {
        let client = PaytrClient::new(test_config());
        let matched = client
            .verify_callback_hash("ORDER123", "success", "30000", "bm90LWEtcmVhbC1oYXNo")
            .unwrap();
        assert_eq!(matched, None);
    }

    #[test]
    fn callback_hash_binds_all_fields() {
        let client = PaytrClient::new(test_config());
        let hash = CallbackScheme::HmacKeyOidSaltStatusAmount
            .compute(
                "ORDER123",
                "success",
                "30000",
                "test-merchant-key",
                "test-merchant-salt",
            )
            .unwrap();

        // A tampered status or amount must not verify.
        assert_eq!(
            client
                .verify_callback_hash("ORDER123", "failed", "30000", &hash)
                .unwrap(),
            None
        );
        assert_eq!(
            client
                .verify_callback_hash("ORDER123", "success", "1", &hash)
                .unwrap(),
            None
        );
        assert_eq!(
            client
                .verify_callback_hash("ORDER999", "success", "30000", &hash)
                .unwrap(),
            None
        );
    }

    #[test]
    fn iframe_url_appends_token() {
        let client = PaytrClient::new(test_config());
        assert_eq!(
            client.iframe_url("tok123"),
            "https://www.paytr.com/odeme/guvenli/tok123"
        );
    }
}
