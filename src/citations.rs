//! Citation placeholder compiler.
//!
//! The model is asked to wrap cited passages in `<chunk_N>…</chunk_N>`
//! tags, where N is a 1-based index into the retrieved source chunks.
//! That output arrives in fragments whose boundaries do not respect
//! tag boundaries, and the text must pass through a Markdown parser
//! and an HTML sanitizer before display. This module rewrites the raw
//! streamed text into a form that survives both: complete tag pairs
//! become minimal placeholder spans, mid-flight tag fragments are
//! masked, and anything malformed degrades to plain text. Malformed
//! tags are never an error the user sees.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum number of decimal digits in a citation index.
const MAX_INDEX_DIGITS: usize = 3;

/// A complete open/close pair. Index equality between the two tags is
/// checked in code; the regex crate has no backreferences.
static TAG_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<chunk_(\d{1,3})>(.*?)</chunk_(\d{1,3})>").expect("tag pair pattern")
});

/// Any complete open or close tag, for stripping strays.
static TAG_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?chunk_\d{1,3}>").expect("tag pattern"));

/// Rewrite raw (possibly incomplete) streamed text into Markdown-safe
/// text with citation spans marked by placeholder elements.
///
/// With no chunk array available yet, tags are stripped outright and
/// the inner text rendered plain, so citations do not flicker from
/// "uncited" to "cited" once data arrives.
pub fn to_placeholder(text: &str, chunks: Option<&[String]>) -> String {
    let visible = mask_trailing_fragment(text);

    let chunk_count = match chunks {
        Some(chunks) if !chunks.is_empty() => chunks.len(),
        _ => return TAG_ANY.replace_all(visible, "").into_owned(),
    };

    let replaced = TAG_PAIR.replace_all(visible, |caps: &regex::Captures<'_>| {
        let open = &caps[1];
        let close = &caps[3];
        if open != close {
            // Mismatched pair; leave it for the stray-tag sweep below.
            return caps[0].to_string();
        }
        let inner = &caps[2];
        let index: usize = open.parse().unwrap_or(0);
        if (1..=chunk_count).contains(&index) {
            format!(
                "<span data-chunk-index=\"{index}\">{}</span>",
                escape_html(inner)
            )
        } else {
            // Out-of-range index is not a citation.
            escape_html(inner)
        }
    });

    TAG_ANY.replace_all(&replaced, "").into_owned()
}

/// Drop a trailing partial tag fragment (a strict prefix of an opening
/// or closing tag ending at end-of-string) so a half-arrived tag never
/// flashes a literal angle bracket for one frame.
fn mask_trailing_fragment(text: &str) -> &str {
    let Some(pos) = text.rfind('<') else {
        return text;
    };
    if is_partial_tag(&text[pos..]) {
        &text[..pos]
    } else {
        text
    }
}

/// True when `tail` (which starts at '<' and runs to end-of-string) is
/// a non-empty strict prefix of `<chunk_N>` or `</chunk_N>`.
fn is_partial_tag(tail: &str) -> bool {
    let Some(rest) = tail.strip_prefix('<') else {
        return false;
    };
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    const NAME: &str = "chunk_";
    if rest.len() <= NAME.len() {
        return NAME.starts_with(rest);
    }
    let Some(digits) = rest.strip_prefix(NAME) else {
        return false;
    };
    // A complete tag ends in '>', so digits-only means still partial.
    digits.len() <= MAX_INDEX_DIGITS && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Escape text for literal inclusion in inline HTML, so the Markdown
/// parser treats the placeholder contents as opaque.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("source {i}")).collect()
    }

    #[test]
    fn complete_pair_becomes_placeholder_span() {
        let chunks = vec!["adenosine triphosphate".to_string()];
        let out = to_placeholder("<chunk_1>ATP</chunk_1>", Some(&chunks));
        assert_eq!(out, "<span data-chunk-index=\"1\">ATP</span>");
    }

    #[test]
    fn without_chunks_tags_are_stripped_to_plain_text() {
        let out = to_placeholder("<chunk_1>ATP</chunk_1>", None);
        assert_eq!(out, "ATP");
        let out = to_placeholder("<chunk_1>ATP</chunk_1>", Some(&[]));
        assert_eq!(out, "ATP");
    }

    #[test]
    fn out_of_range_index_renders_plain() {
        let one = vec!["only one chunk".to_string()];
        let out = to_placeholder("<chunk_9>X</chunk_9>", Some(&one));
        assert_eq!(out, "X");
    }

    #[test]
    fn index_zero_is_never_valid() {
        let out = to_placeholder("<chunk_0>X</chunk_0>", Some(&chunks(3)));
        assert_eq!(out, "X");
    }

    #[test]
    fn trailing_partial_open_tag_is_masked() {
        for partial in ["<", "<c", "<chunk", "<chunk_", "<chunk_1", "<chunk_12"] {
            let text = format!("see {partial}");
            assert_eq!(to_placeholder(&text, Some(&chunks(2))), "see ");
        }
    }

    #[test]
    fn trailing_partial_close_tag_is_masked() {
        let out = to_placeholder("<chunk_1>ATP</chunk_", Some(&chunks(1)));
        assert_eq!(out, "ATP");

        let out = to_placeholder("<chunk_1>ATP</", Some(&chunks(1)));
        assert_eq!(out, "ATP");
    }

    #[test]
    fn plain_angle_bracket_is_not_masked() {
        let out = to_placeholder("3 < 5", Some(&chunks(1)));
        assert_eq!(out, "3 < 5");
        let out = to_placeholder("a <b>bold", Some(&chunks(1)));
        assert_eq!(out, "a <b>bold");
    }

    #[test]
    fn four_digit_index_is_not_a_tag() {
        let out = to_placeholder("x <chunk_1234", Some(&chunks(1)));
        assert_eq!(out, "x <chunk_1234");
    }

    #[test]
    fn mismatched_pair_degrades_to_plain_text() {
        let out = to_placeholder("<chunk_1>mito</chunk_2>", Some(&chunks(3)));
        assert_eq!(out, "mito");
    }

    #[test]
    fn orphaned_tag_is_stripped_preserving_text() {
        let out = to_placeholder("lonely </chunk_2> tail", Some(&chunks(3)));
        assert_eq!(out, "lonely  tail");
    }

    #[test]
    fn inner_text_is_entity_escaped() {
        let out = to_placeholder("<chunk_1>a & \"b\" <i></chunk_1>", Some(&chunks(1)));
        assert_eq!(
            out,
            "<span data-chunk-index=\"1\">a &amp; &quot;b&quot; &lt;i&gt;</span>"
        );
    }

    #[test]
    fn multiple_citations_in_one_fragment() {
        let out = to_placeholder(
            "<chunk_1>a</chunk_1> and <chunk_2>b</chunk_2>",
            Some(&chunks(2)),
        );
        assert_eq!(
            out,
            "<span data-chunk-index=\"1\">a</span> and <span data-chunk-index=\"2\">b</span>"
        );
    }

    #[test]
    fn multi_digit_index_round_trips() {
        let out = to_placeholder("<chunk_12>x</chunk_12>", Some(&chunks(20)));
        assert_eq!(out, "<span data-chunk-index=\"12\">x</span>");
    }

    #[test]
    fn surrounding_text_is_untouched() {
        let out = to_placeholder("Cells make <chunk_1>ATP</chunk_1>.", Some(&chunks(1)));
        assert_eq!(out, "Cells make <span data-chunk-index=\"1\">ATP</span>.");
    }
}
