use crate::error::CallbackError;
use crate::message::format_message;
use crate::resolver::KeyMaps;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use common::config::{GeneratedKey, GeneratedKeyAuthConfig, MessageGeneration};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use std::fmt::{Display, Formatter};

type HmacSha256 = Hmac<Sha256>;

/// How an `auth` generated key turns its inputs into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    HmacSha256,
    BasicAuth,
    Md5,
    Rest,
    Passthrough,
}

impl From<&str> for AuthStrategy {
    fn from(auth_type: &str) -> Self {
        match auth_type {
            "HMAC_SHA256" => AuthStrategy::HmacSha256,
            "BASIC_AUTH" => AuthStrategy::BasicAuth,
            "MD5" => AuthStrategy::Md5,
            "REST" => AuthStrategy::Rest,
            _ => AuthStrategy::Passthrough,
        }
    }
}

impl Display for AuthStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStrategy::HmacSha256 => write!(f, "HMAC_SHA256"),
            AuthStrategy::BasicAuth => write!(f, "BASIC_AUTH"),
            AuthStrategy::Md5 => write!(f, "MD5"),
            AuthStrategy::Rest => write!(f, "REST"),
            AuthStrategy::Passthrough => write!(f, "PASSTHROUGH"),
        }
    }
}

impl AuthStrategy {
    fn needs_message(self) -> bool {
        matches!(
            self,
            AuthStrategy::HmacSha256 | AuthStrategy::BasicAuth | AuthStrategy::Md5
        )
    }
}

/// The key's `auth_config`, checked against what its strategy needs.
pub fn auth_config_for(key: &GeneratedKey) -> Result<&GeneratedKeyAuthConfig, CallbackError> {
    let Some(config) = key.auth_config.as_ref() else {
        return Err(CallbackError::config(format!(
            "{} is an auth key without auth_config",
            key.placeholder()
        )));
    };
    let strategy = AuthStrategy::from(key.auth_type.as_str());
    if strategy.needs_message() && config.message_generation.is_none() {
        return Err(CallbackError::config(format!(
            "{} uses {strategy} but has no message_generation",
            key.placeholder()
        )));
    }
    if strategy == AuthStrategy::Rest && config.rest_config.is_none() {
        return Err(CallbackError::config(format!(
            "{} uses REST but has no rest_config",
            key.placeholder()
        )));
    }
    Ok(config)
}

fn message(generation: Option<&MessageGeneration>, maps: &KeyMaps) -> Result<String, CallbackError> {
    let generation = generation
        .ok_or_else(|| CallbackError::config("message_generation is not configured"))?;
    let params: Vec<String> = generation
        .params
        .iter()
        .map(|param| maps.resolve(param))
        .collect();
    Ok(format_message(&generation.format, &params))
}

/// Compute the value of a non-REST auth key.
///
/// The secret is resolved through `maps` first, then each message parameter,
/// so placeholders refer only to keys produced earlier in the pipeline.
pub fn sign(
    strategy: AuthStrategy,
    config: &GeneratedKeyAuthConfig,
    maps: &KeyMaps,
) -> Result<String, CallbackError> {
    let secret = maps.resolve(&config.secret);
    let generation = config.message_generation.as_ref();

    match strategy {
        AuthStrategy::HmacSha256 => {
            let digest = hmac_sha256(&secret, &message(generation, maps)?)?;
            if config.is_base64() {
                Ok(BASE64.encode(digest))
            } else {
                Ok(String::from_utf8_lossy(&digest).into_owned())
            }
        }
        AuthStrategy::BasicAuth => {
            let credentials = message(generation, maps)?;
            if config.is_base64() {
                Ok(format!("Basic {}", BASE64.encode(credentials)))
            } else {
                Ok(format!("Basic {credentials}"))
            }
        }
        AuthStrategy::Md5 => Ok(md5_hex(&message(generation, maps)?)),
        AuthStrategy::Passthrough => Ok(secret),
        AuthStrategy::Rest => Err(CallbackError::config(
            "REST auth is resolved through the REST auth client",
        )),
    }
}

pub fn hmac_sha256(secret: &str, message: &str) -> Result<Vec<u8>, CallbackError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CallbackError::config(format!("invalid HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn md5_hex(message: &str) -> String {
    hex::encode(Md5::digest(message.as_bytes()))
}
