//! Markdown conversion stage.
//!
//! Thin wrapper around `pulldown-cmark`. The pipeline only needs two things
//! from it: HTML with link destinations passed through a rewrite hook, and the
//! text of the first level-1 heading for title derivation.

use pulldown_cmark::{CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd, html};

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Convert markdown to HTML.
///
/// `rewrite` sees every link and image destination (autolinks excluded) and
/// returns a replacement, or `None` to keep it as authored.
pub fn to_html(markdown: &str, mut rewrite: impl FnMut(&str) -> Option<String>) -> String {
    let parser = Parser::new_ext(markdown, options()).map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_autolink(link_type) => Event::Start(Tag::Link {
            link_type,
            dest_url: rewrite(&dest_url).map(CowStr::from).unwrap_or(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: rewrite(&dest_url).map(CowStr::from).unwrap_or(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn is_autolink(link_type: LinkType) -> bool {
    matches!(link_type, LinkType::Autolink | LinkType::Email)
}

/// Plain text of the first level-1 heading (ATX or setext), if any.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut in_h1 = false;
    let mut text = String::new();
    for event in Parser::new_ext(markdown, options()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_h1 = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_h1 => {
                let title = text.trim();
                if !title.is_empty() {
                    return Some(title.to_string());
                }
                in_h1 = false;
                text.clear();
            }
            Event::Text(t) | Event::Code(t) if in_h1 => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_h1 => text.push(' '),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let html = to_html("# Title\n\nSome *text*.", |_| None);
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn rewrites_link_destinations() {
        let html = to_html("[next](b.md) and ![img](pic.png)", |dest| {
            Some(format!("/x/{dest}"))
        });
        assert!(html.contains(r#"href="/x/b.md""#));
        assert!(html.contains(r#"src="/x/pic.png""#));
    }

    #[test]
    fn keeps_link_when_rewrite_declines() {
        let html = to_html("[a](a.md)", |_| None);
        assert!(html.contains(r#"href="a.md""#));
    }

    #[test]
    fn autolinks_not_rewritten() {
        let mut seen = Vec::new();
        to_html("<https://example.com>", |dest| {
            seen.push(dest.to_string());
            None
        });
        assert!(seen.is_empty());
    }

    #[test]
    fn first_heading_atx() {
        assert_eq!(
            first_heading("intro\n\n# Hello World\n\n# Second"),
            Some("Hello World".to_string())
        );
    }

    #[test]
    fn first_heading_setext_with_code() {
        assert_eq!(
            first_heading("Using `mkblog`\n============\n"),
            Some("Using mkblog".to_string())
        );
    }

    #[test]
    fn first_heading_ignores_h2() {
        assert_eq!(first_heading("## Not it\n\ntext"), None);
    }
}
