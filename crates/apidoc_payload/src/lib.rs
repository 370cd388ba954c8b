use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Decodes `%XX` escapes left to right.
///
/// Every well-formed escape produces the character whose code point equals the
/// escaped byte (U+0000..=U+00FF). A `%` that is not followed by two hex digits
/// is kept as a literal and decoding continues with the next character, so
/// this never fails.
pub fn percent_decode(encoded: &str) -> String {
    let chars: Vec<char> = encoded.chars().collect();
    let mut decoded = String::with_capacity(encoded.len());
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '%' {
            if let Some(byte) = hex_pair(chars.get(idx + 1), chars.get(idx + 2)) {
                decoded.push(char::from(byte));
                idx += 3;
                continue;
            }
        }
        decoded.push(ch);
        idx += 1;
    }
    decoded
}

fn hex_pair(high: Option<&char>, low: Option<&char>) -> Option<u8> {
    let high = high?.to_digit(16)?;
    let low = low?.to_digit(16)?;
    u8::try_from(high * 0x10 + low).ok()
}

/// Encodes text so that it survives as HTML text content and decodes back
/// through [`percent_decode`] unchanged.
///
/// Non-ASCII characters are kept literally; the decoder copies them through.
pub fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 4);
    for ch in raw.chars() {
        if passes_literally(ch) {
            out.push(ch);
            continue;
        }
        let byte = ch as u32 as u8;
        out.push('%');
        out.push(char::from(HEX_UPPER[usize::from(byte >> 4)]));
        out.push(char::from(HEX_UPPER[usize::from(byte & 0x0f)]));
    }
    out
}

fn passes_literally(ch: char) -> bool {
    !ch.is_ascii()
        || ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '-' | '_' | '.' | '~' | ' ' | ',' | ':' | '/' | '{' | '}' | '[' | ']' | '+' | '='
        )
}

/// Decodes the payload and parses the result as JSON.
pub fn decode_json(encoded: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&percent_decode(encoded))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    MissingSeparator,
    UnknownAlgorithm(String),
    InvalidDigest(String),
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::MissingSeparator => {
                write!(f, "integrity value must look like <algorithm>-<base64 digest>")
            }
            IntegrityError::UnknownAlgorithm(name) => {
                write!(f, "unsupported integrity algorithm: {}", name)
            }
            IntegrityError::InvalidDigest(message) => {
                write!(f, "invalid integrity digest: {}", message)
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// A subresource-integrity pin: hash algorithm plus base64 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrity {
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

impl Integrity {
    /// Builds a pin from trusted parts without checking the digest.
    pub fn from_parts(algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, IntegrityError> {
        let (name, digest) = raw
            .trim()
            .split_once('-')
            .ok_or(IntegrityError::MissingSeparator)?;
        let algorithm = HashAlgorithm::from_str(name)
            .ok_or_else(|| IntegrityError::UnknownAlgorithm(name.to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(digest)
            .map_err(|err| IntegrityError::InvalidDigest(err.to_string()))?;
        if bytes.len() != algorithm.digest_len() {
            return Err(IntegrityError::InvalidDigest(format!(
                "{} expects {} bytes, got {}",
                algorithm.as_str(),
                algorithm.digest_len(),
                bytes.len()
            )));
        }
        Ok(Self {
            algorithm,
            digest: digest.to_string(),
        })
    }

    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let digest = base64::engine::general_purpose::STANDARD.encode(algorithm.digest(data));
        Self { algorithm, digest }
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(&self.digest) else {
            return false;
        };
        expected == self.algorithm.digest(data)
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm.as_str(), self.digest)
    }
}
