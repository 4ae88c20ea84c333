//! Alipay page-pay request signing and callback verification (RSA2).

use crate::config::AlipayConfig;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration as ChronoDuration, Utc};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use rust_decimal::Decimal;
use serde_json::json;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const PAGE_PAY_METHOD: &str = "alipay.trade.page.pay";
const PRODUCT_CODE: &str = "FAST_INSTANT_TRADE_PAY";
const SIGN_TYPE: &str = "RSA2";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum AlipayError {
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key: {0}")]
    Key(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<AlipayError> for crate::errors::ServiceError {
    fn from(err: AlipayError) -> Self {
        crate::errors::ServiceError::ExternalServiceError(err.to_string())
    }
}

/// What the customer is being asked to pay for
#[derive(Debug, Clone, PartialEq)]
pub struct PagePayOrder {
    pub out_trade_no: String,
    pub total_amount: Decimal,
    pub subject: String,
}

impl PagePayOrder {
    pub fn for_order(order_id: &str, total_amount: Decimal) -> Self {
        Self {
            out_trade_no: order_id.to_string(),
            total_amount,
            subject: format!("订单编号:{}", order_id),
        }
    }
}

/// Payment provider seam used by the payment service
pub trait PaymentProvider: Send + Sync {
    /// Fully qualified URL the browser is redirected to
    fn page_pay_url(&self, order: &PagePayOrder) -> Result<String, AlipayError>;

    /// Checks a callback signature over `params` (which must not contain `sign`)
    fn verify_callback(&self, params: &BTreeMap<String, String>, signature: &str) -> bool;
}

/// `k=v&...` over key-sorted params, skipping the signature fields
pub fn canonical_content(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, _)| k.as_str() != "sign" && k.as_str() != "sign_type")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_der(raw: &str) -> Result<Vec<u8>, AlipayError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact)
        .map_err(|e| AlipayError::Key(format!("not PEM or base64 DER: {}", e)))
}

/// Accepts PKCS#8 or PKCS#1, PEM or bare base64 DER
pub fn parse_private_key(raw: &str) -> Result<RsaPrivateKey, AlipayError> {
    let raw = raw.trim();
    if raw.starts_with("-----BEGIN") {
        RsaPrivateKey::from_pkcs8_pem(raw)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(raw))
            .map_err(|e| AlipayError::Key(format!("private key: {}", e)))
    } else {
        let der = decode_der(raw)?;
        RsaPrivateKey::from_pkcs8_der(&der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
            .map_err(|e| AlipayError::Key(format!("private key: {}", e)))
    }
}

/// Accepts SubjectPublicKeyInfo or PKCS#1, PEM or bare base64 DER
pub fn parse_public_key(raw: &str) -> Result<RsaPublicKey, AlipayError> {
    let raw = raw.trim();
    if raw.starts_with("-----BEGIN") {
        RsaPublicKey::from_public_key_pem(raw)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(raw))
            .map_err(|e| AlipayError::Key(format!("public key: {}", e)))
    } else {
        let der = decode_der(raw)?;
        RsaPublicKey::from_public_key_der(&der)
            .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
            .map_err(|e| AlipayError::Key(format!("public key: {}", e)))
    }
}

fn read_key_file(path: &Path) -> Result<String, AlipayError> {
    std::fs::read_to_string(path).map_err(|source| AlipayError::KeyFile {
        path: path.display().to_string(),
        source,
    })
}

/// Merchant-side Alipay client holding the app key pair material
#[derive(Clone)]
pub struct AlipayClient {
    app_id: String,
    gateway: String,
    return_url: Option<String>,
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
}

impl AlipayClient {
    pub fn new(
        app_id: impl Into<String>,
        gateway: impl Into<String>,
        return_url: Option<String>,
        app_private_key: RsaPrivateKey,
        alipay_public_key: RsaPublicKey,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            gateway: gateway.into(),
            return_url,
            signing_key: SigningKey::<Sha256>::new(app_private_key),
            verifying_key: VerifyingKey::<Sha256>::new(alipay_public_key),
        }
    }

    /// Builds a client from key material already in memory
    pub fn from_pem(
        config: &AlipayConfig,
        app_private_key_pem: &str,
        alipay_public_key_pem: &str,
    ) -> Result<Self, AlipayError> {
        Ok(Self::new(
            config.app_id.clone(),
            config.gateway(),
            config.return_url.clone(),
            parse_private_key(app_private_key_pem)?,
            parse_public_key(alipay_public_key_pem)?,
        ))
    }

    /// Reads both key files named in the configuration
    pub fn from_config(config: &AlipayConfig) -> Result<Self, AlipayError> {
        let private_pem = read_key_file(&config.app_private_key_path)?;
        let public_pem = read_key_file(&config.alipay_public_key_path)?;
        let client = Self::from_pem(config, &private_pem, &public_pem)?;
        debug!(app_id = %client.app_id, gateway = %client.gateway, "Alipay client ready");
        Ok(client)
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Base64 SHA256withRSA signature over `content`
    pub fn sign_content(&self, content: &str) -> Result<String, AlipayError> {
        let signature = self
            .signing_key
            .try_sign(content.as_bytes())
            .map_err(|e| AlipayError::Signing(e.to_string()))?;
        Ok(BASE64.encode(signature.to_bytes()))
    }

    fn verify_content(&self, content: &str, signature_b64: &str) -> bool {
        let Ok(raw) = BASE64.decode(signature_b64.trim()) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return false;
        };
        self.verifying_key
            .verify(content.as_bytes(), &signature)
            .is_ok()
    }

    /// Signed, form-encoded query string for `alipay.trade.page.pay`
    pub fn page_pay_query(&self, order: &PagePayOrder) -> Result<String, AlipayError> {
        let biz_content = json!({
            "out_trade_no": order.out_trade_no,
            "product_code": PRODUCT_CODE,
            "subject": order.subject,
            "total_amount": format!("{:.2}", order.total_amount.round_dp(2)),
        });

        // Alipay expects Beijing time
        let timestamp = (Utc::now() + ChronoDuration::hours(8))
            .format(TIMESTAMP_FORMAT)
            .to_string();

        let mut params = BTreeMap::new();
        params.insert("app_id".to_string(), self.app_id.clone());
        params.insert("biz_content".to_string(), biz_content.to_string());
        params.insert("charset".to_string(), "utf-8".to_string());
        params.insert("method".to_string(), PAGE_PAY_METHOD.to_string());
        params.insert("sign_type".to_string(), SIGN_TYPE.to_string());
        params.insert("timestamp".to_string(), timestamp);
        params.insert("version".to_string(), "1.0".to_string());
        if let Some(return_url) = &self.return_url {
            params.insert("return_url".to_string(), return_url.clone());
        }

        // Requests sign over sign_type too, callbacks do not
        let unsigned = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let sign = self.sign_content(&unsigned)?;

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &params {
            query.append_pair(k, v);
        }
        query.append_pair("sign", &sign);
        Ok(query.finish())
    }
}

impl PaymentProvider for AlipayClient {
    fn page_pay_url(&self, order: &PagePayOrder) -> Result<String, AlipayError> {
        let query = self.page_pay_query(order)?;
        Ok(format!("{}?{}", self.gateway, query))
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>, signature: &str) -> bool {
        let verified = self.verify_content(&canonical_content(params), signature);
        if !verified {
            warn!(
                out_trade_no = params.get("out_trade_no").map(String::as_str).unwrap_or(""),
                "Alipay callback signature did not verify"
            );
        }
        verified
    }
}
