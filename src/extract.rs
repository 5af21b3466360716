use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

/// Format-specific converter from raw file content to normalized
/// searchable text.
///
/// Markup and macro syntax is noise for substring search: stripping it
/// before matching avoids false negatives from tags interrupting a phrase
/// and keeps snippets readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Html,
    Tex,
    PlainText,
}

impl Extractor {
    /// Select the extractor for a normalized (lower-cased, dot-prefixed)
    /// extension. Extensions without a dedicated parser are treated as
    /// plain text.
    pub fn for_extension(ext: &str) -> Self {
        match ext {
            ".html" | ".htm" => Extractor::Html,
            ".tex" => Extractor::Tex,
            _ => Extractor::PlainText,
        }
    }

    pub fn extract(&self, content: &str) -> String {
        match self {
            Extractor::Html => extract_html(content),
            Extractor::Tex => extract_tex(content),
            Extractor::PlainText => content.to_string(),
        }
    }
}

/// Extract the visible text of an HTML document.
///
/// Script and style subtrees are dropped entirely so their content is
/// never searchable. Text comes from the body element, or from the whole
/// document when no body exists, with whitespace runs collapsed.
fn extract_html(content: &str) -> String {
    let document = Html::parse_document(content);

    let mut text = String::new();
    match document.select(&BODY_SELECTOR).next() {
        Some(body) => element_text(body, &mut text),
        None => element_text(document.root_element(), &mut text),
    }

    collapse_whitespace(&text)
}

static BODY_SELECTOR: LazyLock<scraper::Selector> =
    LazyLock::new(|| scraper::Selector::parse("body").unwrap());

fn element_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if name.eq_ignore_ascii_case("script")
                || name.eq_ignore_ascii_case("style")
            {
                continue;
            }
            element_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

// Environment bodies are removed before command stripping: the command
// pattern would otherwise consume the \begin{...}/\end{...} markers and
// leave the body behind.
// A comment starts at a `%` that is not escaped; `\%` is a literal
// percent sign and must not swallow the rest of the line.
static TEX_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[^\\])%.*$").unwrap());
static TEX_DISPLAY_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$\$.*?\$\$").unwrap());
static TEX_BRACKET_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[.*?\\\]").unwrap());
static TEX_INLINE_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[^$]*\$").unwrap());
static TEX_ENVIRONMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\begin\{[a-zA-Z*]+\}.*?\\end\{[a-zA-Z*]+\}").unwrap()
});
static TEX_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[a-zA-Z]+(\s*\{[^}]*\})?(\s*\[[^\]]*\])?").unwrap()
});

/// Strip LaTeX markup down to its searchable prose.
///
/// Comments, math mode, environment bodies, and commands (with at most
/// one brace argument and one bracket argument) are removed in that
/// order, then whitespace is collapsed.
fn extract_tex(content: &str) -> String {
    let text = TEX_COMMENT.replace_all(content, "$1");
    let text = text.replace(r"\%", "%");
    let text = TEX_DISPLAY_MATH.replace_all(&text, "");
    let text = TEX_BRACKET_MATH.replace_all(&text, "");
    let text = TEX_INLINE_MATH.replace_all(&text, "");
    let text = TEX_ENVIRONMENT.replace_all(&text, "");
    let text = TEX_COMMAND.replace_all(&text, "");
    collapse_whitespace(&text)
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = true; // Leading whitespace is dropped.
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
                in_whitespace = true;
            }
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_by_extension() {
        assert_eq!(Extractor::for_extension(".html"), Extractor::Html);
        assert_eq!(Extractor::for_extension(".htm"), Extractor::Html);
        assert_eq!(Extractor::for_extension(".tex"), Extractor::Tex);
        assert_eq!(Extractor::for_extension(".inp"), Extractor::PlainText);
        assert_eq!(Extractor::for_extension(".op"), Extractor::PlainText);
        assert_eq!(Extractor::for_extension(".log"), Extractor::PlainText);
    }

    #[test]
    fn html_body_text() {
        let html = "<html><body><p>Hello WORLD</p></body></html>";
        assert_eq!(Extractor::Html.extract(html), "Hello WORLD");
    }

    #[test]
    fn html_drops_script_and_style() {
        let html = "<html><body>\
            <script>var secret = 'findme';</script>\
            <style>.findme { color: red; }</style>\
            <p>visible</p></body></html>";
        let text = Extractor::Html.extract(html);
        assert_eq!(text, "visible");
        assert!(!text.contains("findme"));
    }

    #[test]
    fn html_drops_nested_script() {
        let html =
            "<body><div>outer<div><script>hidden()</script>inner</div></div></body>";
        let text = Extractor::Html.extract(html);
        assert!(text.contains("outer"));
        assert!(text.contains("inner"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn html_without_body_falls_back_to_document() {
        // A bare fragment still gets a synthetic body from the parser, so
        // exercise the fallback through the root element path as well.
        let text = Extractor::Html.extract("just some text");
        assert_eq!(text, "just some text");
    }

    #[test]
    fn html_collapses_whitespace() {
        let html = "<body><p>  spaced\n\n   out\ttext </p></body>";
        assert_eq!(Extractor::Html.extract(html), "spaced out text");
    }

    #[test]
    fn tex_strips_comments() {
        let tex = "% a comment line\nreal text % trailing comment\n";
        assert_eq!(Extractor::Tex.extract(tex), "real text");
    }

    #[test]
    fn tex_keeps_text_after_escaped_percent() {
        let tex = "50\\% of runs succeed % but this goes\n";
        assert_eq!(Extractor::Tex.extract(tex), "50% of runs succeed");
    }

    #[test]
    fn tex_strips_command_with_argument() {
        // The brace argument goes with the command, so its content is not
        // searchable afterwards.
        let tex = "% comment\nThis is \\textbf{bold} text.";
        let text = Extractor::Tex.extract(tex);
        assert_eq!(text, "This is text.");
        assert!(!text.contains("bold"));
    }

    #[test]
    fn tex_strips_command_with_optional_argument() {
        let tex = "\\item[first] point";
        assert_eq!(Extractor::Tex.extract(tex), "point");
    }

    #[test]
    fn tex_strips_environment_body() {
        let tex = "before \\begin{equation}E = mc^2\\end{equation} after";
        let text = Extractor::Tex.extract(tex);
        assert_eq!(text, "before after");
        assert!(!text.contains("mc^2"));
    }

    #[test]
    fn tex_environment_is_non_greedy() {
        let tex = "\\begin{a}one\\end{a} keep \\begin{b}two\\end{b}";
        assert_eq!(Extractor::Tex.extract(tex), "keep");
    }

    #[test]
    fn tex_strips_inline_math() {
        let tex = "energy $E=mc^2$ formula";
        assert_eq!(Extractor::Tex.extract(tex), "energy formula");
    }

    #[test]
    fn tex_strips_display_math() {
        let tex = "see $$x + y$$ and \\[a - b\\] here";
        assert_eq!(Extractor::Tex.extract(tex), "see and here");
    }

    #[test]
    fn plain_text_is_unmodified() {
        let raw = "RUN-SECTION\n  tfinal = 50.0\nend-run-section\n";
        assert_eq!(Extractor::PlainText.extract(raw), raw);
    }

    #[test]
    fn collapse_whitespace_trims() {
        assert_eq!(collapse_whitespace("  a  b\n\tc  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }
}
