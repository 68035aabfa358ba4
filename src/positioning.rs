//! Target-word token positioning via incremental decode
//!
//! Maps a target word inside raw text to the index of the last token
//! covering that word. Tokenizers split words into sub-word fragments with
//! no fixed relationship to word boundaries, so the boundary is recovered by
//! re-assembling decoded fragments: decode token by token, accumulate the
//! reconstructed text length, and stop at the first token whose cumulative
//! length reaches the end of the target word's first occurrence.
//!
//! The functions here operate on already-decoded token strings, which keeps
//! them independent of any concrete tokenizer.

use crate::error::LocateError;

/// Find the token index of the last token of `target_word` in `text`.
///
/// The match against `text` is case-insensitive and uses the first
/// occurrence. Returns the index of the first token whose cumulative decoded
/// length reaches or passes the end of that occurrence. If the decoded
/// fragments never reach it (decoder artifacts can drop bytes), the last
/// token index is returned as a fallback.
pub fn find_target_position(
    token_strs: &[String],
    text: &str,
    target_word: &str,
) -> Result<usize, LocateError> {
    if token_strs.is_empty() {
        return Err(LocateError::EmptyTokens {
            word: target_word.to_string(),
        });
    }

    let target_start = text
        .to_lowercase()
        .find(&target_word.to_lowercase())
        .ok_or_else(|| LocateError::TargetNotFound {
            word: target_word.to_string(),
            text: text.to_string(),
        })?;
    let target_end = target_start + target_word.len();

    let mut reconstructed_len = 0;
    for (i, token_str) in token_strs.iter().enumerate() {
        reconstructed_len += token_str.len();
        if reconstructed_len >= target_end {
            return Ok(i);
        }
    }

    // Reconstruction fell short of the target's end offset.
    Ok(token_strs.len() - 1)
}

/// Character end-offset of the first case-insensitive occurrence of
/// `target_word` in `text`, if any.
pub fn target_end_offset(text: &str, target_word: &str) -> Option<usize> {
    text.to_lowercase()
        .find(&target_word.to_lowercase())
        .map(|start| start + target_word.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_single_token_word() {
        // "The cat sits." -> ["The", " cat", " sits", "."]
        let tokens = toks(&["The", " cat", " sits", "."]);
        let pos = find_target_position(&tokens, "The cat sits.", "cat").unwrap();
        assert_eq!(pos, 1);
    }

    #[test]
    fn test_subword_split_returns_last_fragment() {
        // "cats" split as " ca" + "ts": the position must cover the full
        // word, not the truncated "ca" prefix.
        let tokens = toks(&["The", " ca", "ts", " sit", "."]);
        let text = "The cats sit.";
        let pos = find_target_position(&tokens, text, "cats").unwrap();
        assert_eq!(pos, 2);

        // Decoding tokens[0..=pos] must reconstruct at least through the
        // end of "cats".
        let prefix: String = tokens[..=pos].concat();
        let end = target_end_offset(text, "cats").unwrap();
        assert!(prefix.len() >= end);
        assert!(prefix.contains("cats"));
    }

    #[test]
    fn test_case_insensitive_match() {
        let tokens = toks(&["Paris", " is", " large", "."]);
        let pos = find_target_position(&tokens, "Paris is large.", "paris").unwrap();
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_target_not_found() {
        let tokens = toks(&["The", " dog", " barks", "."]);
        let err = find_target_position(&tokens, "The dog barks.", "cat").unwrap_err();
        assert!(matches!(err, LocateError::TargetNotFound { .. }));
    }

    #[test]
    fn test_empty_tokens() {
        let err = find_target_position(&[], "The dog barks.", "dog").unwrap_err();
        assert!(matches!(err, LocateError::EmptyTokens { .. }));
    }

    #[test]
    fn test_reconstruction_shortfall_falls_back_to_last() {
        // Decoder dropped a fragment: cumulative length never reaches the
        // target's end offset, so the last index is returned.
        let tokens = toks(&["The", " "]);
        let pos = find_target_position(&tokens, "The elephant walks.", "walks").unwrap();
        assert_eq!(pos, tokens.len() - 1);
    }

    #[test]
    fn test_position_in_bounds_for_varied_splits() {
        let text = "A butterfly emerges slowly.";
        for split in [
            vec!["A", " butter", "fly", " emerges", " slowly", "."],
            vec!["A", " b", "ut", "ter", "fly", " emerges", " slowly", "."],
            vec!["A butterfly emerges slowly."],
        ] {
            let tokens = toks(&split);
            let pos = find_target_position(&tokens, text, "butterfly").unwrap();
            assert!(pos < tokens.len());
            let prefix: String = tokens[..=pos].concat();
            assert!(prefix.len() >= target_end_offset(text, "butterfly").unwrap());
        }
    }
}
