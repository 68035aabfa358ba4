//! Error types for target-word localization.

/// Errors from mapping a target word to a token position.
///
/// `TargetNotFound` is the one condition the extraction loop must be able to
/// discriminate: it skips the offending example and continues, while every
/// other failure propagates.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    /// The target word does not occur in the example text.
    #[error("target word '{word}' not found in text '{text}'")]
    TargetNotFound { word: String, text: String },

    /// The tokenized text is empty, so no position can exist.
    #[error("cannot locate '{word}' in an empty token sequence")]
    EmptyTokens { word: String },
}
