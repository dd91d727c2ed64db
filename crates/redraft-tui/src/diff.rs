//! Word-level diff for highlighting edits in the output pane.
//!
//! Compares the submitted text against the model's rewrite and marks the
//! words the rewrite changed or added. Removed words are not rendered; the
//! output pane always shows the rewrite's own text.

/// How a span of the rewrite relates to the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Present in both texts.
    Unchanged,
    /// New or changed in the rewrite.
    Changed,
}

/// One word (or the whitespace after it) of the rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub text: String,
    pub kind: SpanKind,
}

/// Splits the rewrite into word spans marked against the original.
///
/// Word-level longest common subsequence; whitespace between two words of
/// the same kind inherits that kind, otherwise it stays unmarked.
pub fn word_diff(original: &str, rewrite: &str) -> Vec<DiffSpan> {
    let old_words: Vec<&str> = original.split_whitespace().collect();
    let new_words: Vec<&str> = rewrite.split_whitespace().collect();
    let common = lcs_membership(&old_words, &new_words);

    let mut spans: Vec<DiffSpan> = Vec::new();
    let mut rest = rewrite;
    let mut prev_kind = None;
    for (word, in_common) in new_words.iter().zip(common) {
        let Some(start) = rest.find(word) else { break };
        let kind = if in_common {
            SpanKind::Unchanged
        } else {
            SpanKind::Changed
        };
        // Whitespace between two words of the same kind inherits it, so a
        // run of changed words renders as one highlighted span.
        if start > 0 {
            let ws_kind = if prev_kind == Some(kind) {
                kind
            } else {
                SpanKind::Unchanged
            };
            push_span(&mut spans, &rest[..start], ws_kind);
        }
        push_span(&mut spans, word, kind);
        prev_kind = Some(kind);
        rest = &rest[start + word.len()..];
    }
    if !rest.is_empty() {
        push_span(&mut spans, rest, SpanKind::Unchanged);
    }
    spans
}

fn push_span(spans: &mut Vec<DiffSpan>, text: &str, kind: SpanKind) {
    if let Some(last) = spans.last_mut()
        && last.kind == kind
    {
        last.text.push_str(text);
        return;
    }
    spans.push(DiffSpan {
        text: text.to_string(),
        kind,
    });
}

/// For each word of `new`, whether it is part of a longest common
/// subsequence with `old`.
fn lcs_membership(old: &[&str], new: &[&str]) -> Vec<bool> {
    let mut table = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for (i, old_word) in old.iter().enumerate().rev() {
        for (j, new_word) in new.iter().enumerate().rev() {
            table[i][j] = if old_word == new_word {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut membership = vec![false; new.len()];
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            membership[j] = true;
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    membership
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(spans: &[DiffSpan]) -> Vec<&str> {
        spans
            .iter()
            .filter(|s| s.kind == SpanKind::Changed)
            .map(|s| s.text.as_str())
            .collect()
    }

    #[test]
    fn test_identical_texts_have_no_changes() {
        let spans = word_diff("the quick fox", "the quick fox");
        assert!(changed(&spans).is_empty());
        let joined: String = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, "the quick fox");
    }

    #[test]
    fn test_replaced_word_is_marked() {
        let spans = word_diff("teh quick fox", "the quick fox");
        assert_eq!(changed(&spans), ["the"]);
    }

    #[test]
    fn test_inserted_words_are_marked() {
        let spans = word_diff("fox jumps", "the fox quickly jumps");
        assert_eq!(changed(&spans), ["the", "quickly"]);
    }

    #[test]
    fn test_removed_words_do_not_appear() {
        let spans = word_diff("the very quick fox", "the quick fox");
        assert!(changed(&spans).is_empty());
        let joined: String = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, "the quick fox");
    }

    #[test]
    fn test_spans_reassemble_the_rewrite() {
        let rewrite = "The text is now correct.\nSecond line too.";
        let spans = word_diff("teh text is now correct second line to", rewrite);
        let joined: String = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, rewrite);
    }

    #[test]
    fn test_empty_original_marks_everything() {
        let spans = word_diff("", "all new text");
        assert_eq!(changed(&spans), ["all new text"]);
    }
}
