//! Text encoding heuristic for attribute strings without a `.cpg` hint.
//!
//! Attribute strings read without a known encoding are decoded byte for byte
//! (each byte becomes the code point of the same value), so the original
//! bytes can be recovered and decoded again once an encoding is chosen.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use thiserror::Error;

/// Label of the legacy double-byte encoding the heuristic discriminates.
pub const LEGACY_ENCODING_LABEL: &str = "GBK";

/// Label returned when the sample looks like UTF-8.
pub const UTF8_LABEL: &str = "UTF-8";

/// Errors raised while resolving or applying an encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The label does not name an encoding the runtime can decode.
    #[error("unsupported text encoding {label:?}")]
    UnsupportedLabel {
        /// Label as supplied by the caller or sidecar file.
        label: String,
    },
}

/// Look up an encoding by its WHATWG label (`"GBK"`, `"utf-8"`, `"cp936"` ...).
///
/// # Errors
///
/// Returns [`EncodingError::UnsupportedLabel`] for unknown labels.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, EncodingError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| EncodingError::UnsupportedLabel {
        label: label.to_owned(),
    })
}

/// Decode bytes so that every byte maps to the code point of equal value.
#[must_use]
pub fn decode_byte_preserving(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Recover the bytes of a string produced by [`decode_byte_preserving`].
///
/// Characters above U+00FF cannot come from that decoding and are replaced
/// with `?`.
#[must_use]
pub fn encode_byte_preserving(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}

/// Re-decode a byte-preserved string with the given encoding.
#[must_use]
pub fn reinterpret(text: &str, encoding: &'static Encoding) -> String {
    let bytes = encode_byte_preserving(text);
    let (decoded, _) = encoding.decode_without_bom_handling(&bytes);
    decoded.into_owned()
}

/// Two-candidate encoding detector (UTF-8 against one legacy encoding).
///
/// # Examples
///
/// ```
/// use shpload_core::EncodingResolver;
/// use shpload_core::encoding::decode_byte_preserving;
///
/// # fn main() -> Result<(), shpload_core::EncodingError> {
/// let resolver = EncodingResolver::gbk();
/// // "中文" encoded as GBK.
/// let sample = decode_byte_preserving(&[0xD6, 0xD0, 0xCE, 0xC4]);
/// assert_eq!(resolver.resolve(&sample, None)?.as_deref(), Some("GBK"));
/// assert_eq!(resolver.resolve("plain ascii", None)?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EncodingResolver {
    legacy_label: &'static str,
    legacy: &'static Encoding,
}

impl EncodingResolver {
    /// Resolver discriminating UTF-8 from GBK.
    #[must_use]
    pub fn gbk() -> Self {
        Self {
            legacy_label: LEGACY_ENCODING_LABEL,
            legacy: encoding_rs::GBK,
        }
    }

    /// Resolver discriminating UTF-8 from the encoding named by `label`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnsupportedLabel`] when the runtime cannot
    /// decode `label`.
    pub fn with_legacy(label: &'static str) -> Result<Self, EncodingError> {
        Ok(Self {
            legacy_label: label,
            legacy: encoding_for_label(label)?,
        })
    }

    /// Label reported when the legacy encoding wins.
    #[must_use]
    pub const fn legacy_label(&self) -> &'static str {
        self.legacy_label
    }

    /// Decide which encoding the byte-preserved `sample` was written in.
    ///
    /// A non-empty `override_label` is returned unchanged without looking at
    /// the sample. Otherwise the sample bytes are decoded as UTF-8 and as the
    /// legacy encoding and the decoded character counts compared: equal
    /// counts yield `None` (undecidable), a longer UTF-8 decoding selects the
    /// legacy label, and a shorter one selects `"UTF-8"`.
    ///
    /// # Errors
    ///
    /// The comparison itself cannot fail; the `Result` keeps the signature
    /// aligned with label validation in [`EncodingResolver::encoding`].
    pub fn resolve(
        &self,
        sample: &str,
        override_label: Option<&str>,
    ) -> Result<Option<String>, EncodingError> {
        if let Some(label) = override_label.filter(|label| !label.trim().is_empty()) {
            return Ok(Some(label.to_owned()));
        }

        let bytes = encode_byte_preserving(sample);
        let utf8_chars = decoded_len(UTF_8.decode_without_bom_handling(&bytes).0);
        let legacy_chars = decoded_len(self.legacy.decode_without_bom_handling(&bytes).0);

        if utf8_chars == legacy_chars {
            return Ok(None);
        }
        let label = if utf8_chars > legacy_chars {
            self.legacy_label
        } else {
            UTF8_LABEL
        };
        debug!(
            "resolved attribute encoding {label} (utf-8 chars: {utf8_chars}, {} chars: {legacy_chars})",
            self.legacy_label
        );
        Ok(Some(label.to_owned()))
    }

    /// Resolve `sample` and look up the resulting encoding.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnsupportedLabel`] when an override names an
    /// unknown encoding.
    pub fn encoding(
        &self,
        sample: &str,
        override_label: Option<&str>,
    ) -> Result<Option<&'static Encoding>, EncodingError> {
        self.resolve(sample, override_label)?
            .map(|label| encoding_for_label(&label))
            .transpose()
    }
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self::gbk()
    }
}

fn decoded_len(decoded: Cow<'_, str>) -> usize {
    decoded.chars().count()
}
