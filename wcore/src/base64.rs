//! Base64 in both the standard and the URL-safe alphabet.
//!
//! Decoding accepts either alphabet, padded or not. Encoding emits the
//! requested alphabet: standard output is `=` padded, URL-safe output is
//! not (which is how keys and ids travel on the blob network).
use ::base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use ::base64::{DecodeError, Engine as _};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alphabet {
    Standard,
    UrlSafe,
}

pub fn encode(data: &[u8], alphabet: Alphabet) -> String {
    match alphabet {
        Alphabet::Standard => STANDARD.encode(data),
        Alphabet::UrlSafe => URL_SAFE_NO_PAD.encode(data),
    }
}

pub fn encode_url(data: &[u8]) -> String {
    encode(data, Alphabet::UrlSafe)
}

/// Decode either alphabet. Malformed input is reported, but callers decoding
/// key material must still validate the decoded length themselves.
pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD_NO_PAD.decode(normalize(input))
}

// Fold the URL-safe alphabet into the standard one and drop the padding
fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect()
}
