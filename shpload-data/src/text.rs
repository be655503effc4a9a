//! Lazy correction of byte-preserved attribute text.
//!
//! Sources without an encoding hint hand out text decoded byte for byte.
//! The first value containing non-ASCII characters decides the encoding for
//! the rest of the dataset; values seen before that decision are ASCII and
//! need no correction.

use encoding_rs::Encoding;
use log::debug;
use shpload_core::encoding::{encoding_for_label, reinterpret};
use shpload_core::{AttributeValue, Attributes, EncodingError, EncodingResolver};

/// Encoding state for one dataset.
#[derive(Debug, Clone)]
pub struct TextCorrector {
    resolver: EncodingResolver,
    declared: Option<String>,
    detected: Option<(String, &'static Encoding)>,
}

impl TextCorrector {
    /// Corrector for a dataset with an optional declared encoding.
    ///
    /// A declared encoding means the source already decoded its text, so no
    /// correction is applied.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnsupportedLabel`] when the declared label is
    /// unknown.
    pub fn new(declared: Option<&str>) -> Result<Self, EncodingError> {
        let declared = declared
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_owned);
        if let Some(label) = declared.as_deref() {
            encoding_for_label(label)?;
        }
        Ok(Self {
            resolver: EncodingResolver::default(),
            declared,
            detected: None,
        })
    }

    /// Declared or detected label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.declared
            .as_deref()
            .or_else(|| self.detected.as_ref().map(|(label, _)| label.as_str()))
    }

    fn decide(&mut self, sample: &str) -> Result<Option<&'static Encoding>, EncodingError> {
        if let Some((_, encoding)) = self.detected {
            return Ok(Some(encoding));
        }
        if sample.is_ascii() {
            return Ok(None);
        }
        let Some(label) = self.resolver.resolve(sample, None)? else {
            return Ok(None);
        };
        let encoding = encoding_for_label(&label)?;
        debug!("detected attribute encoding {label}");
        self.detected = Some((label, encoding));
        Ok(Some(encoding))
    }

    /// Correct a single text value in place.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] when a detected label cannot be decoded.
    pub fn correct_text(&mut self, text: &mut String) -> Result<(), EncodingError> {
        if self.declared.is_some() {
            return Ok(());
        }
        if let Some(encoding) = self.decide(text)? {
            if !text.is_ascii() {
                *text = reinterpret(text, encoding);
            }
        }
        Ok(())
    }

    /// Correct every text attribute in place.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] when a detected label cannot be decoded.
    pub fn correct(&mut self, attributes: &mut Attributes) -> Result<(), EncodingError> {
        if self.declared.is_some() {
            return Ok(());
        }
        for value in attributes.values_mut() {
            if let AttributeValue::Text(text) = value {
                self.correct_text(text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use shpload_core::encoding::decode_byte_preserving;

    fn preserved(bytes: &[u8]) -> AttributeValue {
        AttributeValue::Text(decode_byte_preserving(bytes))
    }

    #[rstest]
    fn detects_once_and_reuses_decision() {
        let mut corrector = TextCorrector::new(None).expect("corrector");
        let mut first: Attributes = [("NAME", AttributeValue::from("Road"))].into_iter().collect();
        corrector.correct(&mut first).expect("ascii");
        assert_eq!(corrector.label(), None);

        // GBK "中文" decides the encoding.
        let mut second: Attributes = [("NAME", preserved(&[0xD6, 0xD0, 0xCE, 0xC4]))]
            .into_iter()
            .collect();
        corrector.correct(&mut second).expect("gbk");
        assert_eq!(corrector.label(), Some("GBK"));
        assert_eq!(second.get("NAME"), Some(&AttributeValue::Text("中文".into())));

        // Reused even for bytes that would look like UTF-8 on their own.
        let mut third: Attributes = [("NAME", preserved(&[0xD6, 0xD0]))].into_iter().collect();
        corrector.correct(&mut third).expect("cached");
        assert_eq!(third.get("NAME"), Some(&AttributeValue::Text("中".into())));
    }

    #[rstest]
    fn declared_encoding_leaves_text_alone() {
        let mut corrector = TextCorrector::new(Some("UTF-8")).expect("corrector");
        let mut attrs: Attributes = [("NAME", AttributeValue::from("Ã©"))].into_iter().collect();
        corrector.correct(&mut attrs).expect("no-op");
        assert_eq!(attrs.get("NAME"), Some(&AttributeValue::from("Ã©")));
        assert_eq!(corrector.label(), Some("UTF-8"));
    }

    #[rstest]
    fn unknown_declared_label_is_rejected() {
        let err = TextCorrector::new(Some("martian")).expect_err("unknown label");
        assert!(matches!(err, EncodingError::UnsupportedLabel { .. }));
    }
}
