//! Markdown formatting for `markdown`-typed events.
//!
//! The widget treats formatting as an external capability behind
//! [`MarkdownFormatter`]; the output flavour (HTML for a DOM-like view, ANSI
//! for a terminal) is whatever the paired view renders.

use colored::*;
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

pub trait MarkdownFormatter {
    fn format(&self, markdown: &str) -> String;
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// GitHub-flavoured markdown to HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMarkdown;

impl MarkdownFormatter for HtmlMarkdown {
    fn format(&self, markdown: &str) -> String {
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options()));
        out
    }
}

/// Markdown to ANSI-styled terminal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiMarkdown;

#[derive(Default)]
struct AnsiState {
    out: String,
    bold: usize,
    italic: usize,
    strike: usize,
    in_code_block: bool,
    /// One entry per open list; `Some(n)` is the next ordered number.
    lists: Vec<Option<u64>>,
    link_targets: Vec<String>,
}

impl AnsiState {
    fn ensure_line_start(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn blank_line(&mut self) {
        self.ensure_line_start();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn styled(&self, text: &str) -> String {
        let mut s = text.normal();
        if self.bold > 0 {
            s = s.bold();
        }
        if self.italic > 0 {
            s = s.italic();
        }
        if self.strike > 0 {
            s = s.strikethrough();
        }
        s.to_string()
    }

    fn push_text(&mut self, text: &str) {
        if self.in_code_block {
            for line in text.split_inclusive('\n') {
                self.out.push_str("    ");
                self.out.push_str(&line.cyan().to_string());
            }
        } else {
            let styled = self.styled(text);
            self.out.push_str(&styled);
        }
    }
}

impl MarkdownFormatter for AnsiMarkdown {
    fn format(&self, markdown: &str) -> String {
        let mut st = AnsiState::default();

        for event in Parser::new_ext(markdown, options()) {
            match event {
                Event::Start(tag) => match tag {
                    Tag::Paragraph => st.ensure_line_start(),
                    Tag::Heading { .. } => {
                        st.blank_line();
                        st.bold += 1;
                    }
                    Tag::CodeBlock(kind) => {
                        st.blank_line();
                        if let CodeBlockKind::Fenced(lang) = kind {
                            if !lang.is_empty() {
                                st.out.push_str(&format!("    {}\n", lang.dimmed()));
                            }
                        }
                        st.in_code_block = true;
                    }
                    Tag::List(start) => {
                        st.ensure_line_start();
                        st.lists.push(start);
                    }
                    Tag::Item => {
                        st.ensure_line_start();
                        let depth = st.lists.len().saturating_sub(1);
                        st.out.push_str(&"  ".repeat(depth));
                        match st.lists.last_mut() {
                            Some(Some(n)) => {
                                st.out.push_str(&format!("{}. ", n));
                                *n += 1;
                            }
                            _ => st.out.push_str("• "),
                        }
                    }
                    Tag::Emphasis => st.italic += 1,
                    Tag::Strong => st.bold += 1,
                    Tag::Strikethrough => st.strike += 1,
                    Tag::Link { dest_url, .. } => st.link_targets.push(dest_url.to_string()),
                    _ => {}
                },
                Event::End(tag) => match tag {
                    TagEnd::Paragraph => st.blank_line(),
                    TagEnd::Heading(_) => {
                        st.bold = st.bold.saturating_sub(1);
                        st.blank_line();
                    }
                    TagEnd::CodeBlock => {
                        st.in_code_block = false;
                        st.blank_line();
                    }
                    TagEnd::List(_) => {
                        st.lists.pop();
                        if st.lists.is_empty() {
                            st.blank_line();
                        }
                    }
                    TagEnd::Item => st.ensure_line_start(),
                    TagEnd::Emphasis => st.italic = st.italic.saturating_sub(1),
                    TagEnd::Strong => st.bold = st.bold.saturating_sub(1),
                    TagEnd::Strikethrough => st.strike = st.strike.saturating_sub(1),
                    TagEnd::Link => {
                        if let Some(url) = st.link_targets.pop() {
                            st.out.push_str(&format!(" ({})", url.underline()));
                        }
                    }
                    _ => {}
                },
                Event::Text(text) => st.push_text(&text),
                Event::Code(code) => st.out.push_str(&code.cyan().to_string()),
                Event::SoftBreak => st.out.push(' '),
                Event::HardBreak => st.out.push('\n'),
                Event::Rule => {
                    st.ensure_line_start();
                    st.out.push_str(&"─".repeat(40).dimmed().to_string());
                    st.blank_line();
                }
                Event::TaskListMarker(done) => st.out.push_str(if done { "[x] " } else { "[ ] " }),
                Event::Html(raw) | Event::InlineHtml(raw) => st.out.push_str(&raw),
                _ => {}
            }
        }

        st.out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> String {
        // Strip ANSI escape sequences so assertions don't depend on tty detection.
        let mut out = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\u{1b}' {
                for n in chars.by_ref() {
                    if n == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn test_html_heading_and_emphasis() {
        let html = HtmlMarkdown.format("# Title\n\nsome *text*");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_html_code_block() {
        let html = HtmlMarkdown.format("```rust\nfn main() {}\n```");
        assert!(html.contains("<pre><code class=\"language-rust\">"));
        assert!(html.contains("fn main() {}"));
    }

    #[test]
    fn test_html_escapes_text() {
        let html = HtmlMarkdown.format("a < b");
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn test_html_table_enabled() {
        let html = HtmlMarkdown.format("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_ansi_plain_paragraph() {
        assert_eq!(plain(&AnsiMarkdown.format("hello world")), "hello world");
    }

    #[test]
    fn test_ansi_bullets_and_numbers() {
        let out = plain(&AnsiMarkdown.format("- one\n- two\n\n3. three\n4. four"));
        assert!(out.contains("• one"));
        assert!(out.contains("• two"));
        assert!(out.contains("3. three"));
        assert!(out.contains("4. four"));
    }

    #[test]
    fn test_ansi_code_block_indented() {
        let out = plain(&AnsiMarkdown.format("```\nlet x = 1;\n```"));
        assert!(out.contains("    let x = 1;"));
    }

    #[test]
    fn test_ansi_link_shows_target() {
        let out = plain(&AnsiMarkdown.format("[docs](https://example.org)"));
        assert_eq!(out, "docs (https://example.org)");
    }

    #[test]
    fn test_ansi_inline_code_kept() {
        let out = plain(&AnsiMarkdown.format("run `cargo fmt` first"));
        assert_eq!(out, "run cargo fmt first");
    }

    #[test]
    fn test_ansi_empty_input() {
        assert_eq!(AnsiMarkdown.format(""), "");
    }
}
