//! Markdown render pipeline for assistant answers.
//!
//! Placeholder-compiled text goes through fence balancing, a GFM
//! parse, HTML sanitization, citation decoration, and code-block
//! augmentation. The pipeline re-runs on every aggregator flush, so
//! every step is deterministic and side-effect-free for a given input.

use comrak::{ComrakOptions, markdown_to_html};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::citations::{self, escape_html};

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.autolink = true;
    // Streamed answers treat soft line breaks as hard breaks.
    options.render.hardbreaks = true;
    // Raw HTML passes through the parser; the sanitizer below is the
    // safety boundary.
    options.render.unsafe_ = true;
    options
});

/// Sanitizer allow-list. The placeholder shape from the citation
/// compiler (`span` with `data-chunk-index`) must survive; everything
/// script-capable is stripped.
static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(|| {
    let mut builder = ammonia::Builder::default();
    builder.add_tags(["span"]);
    builder.add_tag_attributes("span", ["data-chunk-index"]);
    builder.add_tag_attributes("code", ["class"]);
    builder
});

/// A sanitized placeholder span, ready to be upgraded to the final
/// citation widget.
static PLACEHOLDER_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span data-chunk-index="(\d{1,3})">(.*?)</span>"#)
        .expect("placeholder pattern")
});

/// A fully rendered assistant message.
///
/// `html` is safe to hand to the display layer verbatim. `code_blocks`
/// holds the literal text of each fenced code block, in document
/// order, so the view can attach per-block copy controls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderedMessage {
    pub html: String,
    pub code_blocks: Vec<String>,
}

/// Run the full pipeline: raw streamed text plus the optional chunk
/// array in, sanitized and decorated HTML out.
pub fn render_message(text: &str, chunks: Option<&[String]>) -> RenderedMessage {
    let compiled = citations::to_placeholder(text, chunks);
    let balanced = balance_fences(&compiled);
    let html = markdown_to_html(&balanced, &MARKDOWN_OPTIONS);

    // The renderer cannot throw, but an input it reduces to nothing is
    // still recovered verbatim rather than dropped.
    let html = if html.trim().is_empty() && !text.trim().is_empty() {
        format!("<pre>{}</pre>\n", escape_html(text))
    } else {
        html
    };

    let clean = SANITIZER.clean(&html).to_string();
    let decorated = decorate_citations(&clean, chunks.unwrap_or(&[]));
    let (html, code_blocks) = augment_code_blocks(&decorated);
    RenderedMessage { html, code_blocks }
}

/// Append a synthetic closing delimiter for any fence family with an
/// odd count, so an in-progress code fence does not swallow the rest
/// of the streamed Markdown into one unterminated block.
pub fn balance_fences(text: &str) -> String {
    let mut backticks = 0usize;
    let mut tildes = 0usize;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            backticks += 1;
        } else if trimmed.starts_with("~~~") {
            tildes += 1;
        }
    }

    let mut out = text.to_string();
    if backticks % 2 == 1 {
        out.push_str("\n```");
    }
    if tildes % 2 == 1 {
        out.push_str("\n~~~");
    }
    out
}

/// Upgrade each in-range placeholder span to the final widget: the
/// cited text, a numeric badge, and a hidden tooltip carrying the full
/// source chunk as text (not markup, so it is never re-parsed).
///
/// Out-of-range indices fall back to the bare inner text; the compiler
/// already range-checks, but the decorator does not assume that held.
fn decorate_citations(html: &str, chunks: &[String]) -> String {
    PLACEHOLDER_SPAN
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let inner = &caps[2];
            let index: usize = caps[1].parse().unwrap_or(0);
            match index.checked_sub(1).and_then(|i| chunks.get(i)) {
                Some(chunk) => format!(
                    "<span class=\"citation\">{inner}<sup class=\"citation-badge\">{index}</sup>\
                     <span class=\"citation-tooltip\">{}</span></span>",
                    escape_html(chunk)
                ),
                None => inner.to_string(),
            }
        })
        .into_owned()
}

/// Wrap every rendered code block in a container the view can overlay
/// a copy control onto, and collect each block's literal text.
fn augment_code_blocks(html: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(html.len());
    let mut blocks = Vec::new();
    let mut rest = html;

    while let Some(start) = rest.find("<pre>") {
        let Some(end) = rest[start..].find("</pre>") else {
            break;
        };
        let end = start + end + "</pre>".len();
        out.push_str(&rest[..start]);
        let pre = &rest[start..end];
        blocks.push(code_block_text(pre));
        out.push_str("<div class=\"code-block\">");
        out.push_str(pre);
        out.push_str("</div>");
        rest = &rest[end..];
    }
    out.push_str(rest);
    (out, blocks)
}

/// Recover the literal text of a `<pre>…</pre>` block: drop the inner
/// `<code>` tags and undo entity escaping so the clipboard receives
/// exactly what the model wrote.
fn code_block_text(pre: &str) -> String {
    let inner = pre
        .trim_start_matches("<pre>")
        .trim_end_matches("</pre>");
    let inner = match inner.strip_prefix("<code") {
        Some(rest) => rest
            .split_once('>')
            .map(|(_, body)| body)
            .unwrap_or(rest),
        None => inner,
    };
    let inner = inner.strip_suffix("</code>").unwrap_or(inner);
    unescape_html(inner)
}

// Must invert exactly the entity set `citations::escape_html` (and
// comrak's code-block output) produces; extend both together.
fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let rendered = render_message("**bold** text", None);
        assert!(rendered.html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn soft_breaks_become_hard_breaks() {
        let rendered = render_message("line one\nline two", None);
        assert!(rendered.html.contains("<br"));
    }

    #[test]
    fn unterminated_fence_is_closed() {
        let balanced = balance_fences("```js\nconst x = 1;");
        assert!(balanced.ends_with("\n```"));

        let rendered = render_message("```js\nconst x = 1;", None);
        assert_eq!(rendered.html.matches("<pre").count(), 1);
        assert!(rendered.html.contains("const x = 1;"));
        // The block really closed: following text would not be inside it.
        let rendered = render_message("```js\nconst x = 1;\n```\nafter", None);
        assert!(rendered.html.contains("after"));
    }

    #[test]
    fn balanced_fences_are_left_alone() {
        let text = "```\ncode\n```\n";
        assert_eq!(balance_fences(text), text);
    }

    #[test]
    fn tilde_fences_are_balanced_independently() {
        let balanced = balance_fences("~~~\ncode");
        assert!(balanced.ends_with("\n~~~"));
    }

    #[test]
    fn script_tags_are_sanitized_away() {
        let rendered = render_message("hello <script>alert(1)</script>", None);
        assert!(!rendered.html.contains("<script"));
        assert!(rendered.html.contains("hello"));
    }

    #[test]
    fn event_handler_attributes_are_stripped() {
        let rendered = render_message("<img src=\"x\" onerror=\"alert(1)\">", None);
        assert!(!rendered.html.contains("onerror"));
    }

    #[test]
    fn citation_survives_parse_and_sanitize() {
        let chunks = vec!["adenosine triphosphate".to_string()];
        let rendered = render_message("Cells make <chunk_1>ATP</chunk_1>.", Some(&chunks));
        assert!(rendered.html.contains("<span class=\"citation\">ATP"));
        assert!(
            rendered
                .html
                .contains("<sup class=\"citation-badge\">1</sup>")
        );
        assert!(rendered.html.contains("adenosine triphosphate"));
        // The intermediate placeholder attribute is gone.
        assert!(!rendered.html.contains("data-chunk-index"));
    }

    #[test]
    fn out_of_range_placeholder_decorates_to_plain_text() {
        // Bypass the compiler's own range check to exercise the
        // decorator's defensive path.
        let decorated = decorate_citations(
            "<span data-chunk-index=\"7\">X</span>",
            &["only one".to_string()],
        );
        assert_eq!(decorated, "X");
    }

    #[test]
    fn tooltip_text_is_escaped() {
        let chunks = vec!["a <b> & c".to_string()];
        let rendered = render_message("<chunk_1>x</chunk_1>", Some(&chunks));
        assert!(rendered.html.contains("a &lt;b&gt; &amp; c"));
    }

    #[test]
    fn code_blocks_are_wrapped_and_collected() {
        let rendered = render_message("```rust\nlet x = \"<y>\";\n```", None);
        assert!(rendered.html.contains("<div class=\"code-block\"><pre>"));
        assert_eq!(rendered.code_blocks.len(), 1);
        assert_eq!(rendered.code_blocks[0], "let x = \"<y>\";\n");
    }

    #[test]
    fn multiple_code_blocks_collect_in_document_order() {
        let rendered = render_message("```\nfirst\n```\ntext\n```\nsecond\n```", None);
        assert_eq!(rendered.code_blocks, vec!["first\n", "second\n"]);
        assert_eq!(rendered.html.matches("code-block").count(), 2);
    }

    #[test]
    fn without_chunks_citation_tags_render_plain() {
        let rendered = render_message("make <chunk_1>ATP</chunk_1> now", None);
        assert!(!rendered.html.contains("citation"));
        assert!(rendered.html.contains("ATP"));
    }

    #[test]
    fn rerender_is_deterministic() {
        let chunks = vec!["c".to_string()];
        let text = "a <chunk_1>b</chunk_1>\n```\ncode\n```";
        assert_eq!(
            render_message(text, Some(&chunks)),
            render_message(text, Some(&chunks))
        );
    }
}
