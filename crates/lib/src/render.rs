//! Markdown to plain text for the terminal and desktop transcript views.

use crate::model::Role;
use crate::transcript::{Entry, EntryBody};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};

pub const THINKING_TEXT: &str = "Thinking...";

/// Render markdown as readable plain text: emphasis markers dropped, lists bulleted,
/// code blocks indented, blocks separated by blank lines.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    // One entry per open list: Some(next number) for ordered lists.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut in_code_block = false;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Paragraph) | Event::Start(Tag::Heading { .. }) => {
                if lists.is_empty() {
                    blank_line(&mut out);
                }
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) => {
                if lists.is_empty() {
                    out.push('\n');
                }
            }
            Event::Start(Tag::List(start)) => {
                if lists.is_empty() {
                    blank_line(&mut out);
                } else if !out.ends_with('\n') {
                    out.push('\n');
                }
                lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                let depth = lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{}. ", n));
                        *n += 1;
                    }
                    _ => out.push_str("- "),
                }
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                blank_line(&mut out);
                in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
            }
            Event::Text(text) => {
                if in_code_block {
                    for line in text.lines() {
                        out.push_str("    ");
                        out.push_str(line);
                        out.push('\n');
                    }
                } else {
                    out.push_str(&text);
                }
            }
            Event::Code(code) => out.push_str(&code),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Rule => {
                blank_line(&mut out);
                out.push_str("----\n");
            }
            Event::Html(html) | Event::InlineHtml(html) => out.push_str(&html),
            _ => {}
        }
    }
    // Leading spaces belong to an opening code block.
    out.trim_end().trim_start_matches('\n').to_string()
}

fn blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}

/// Body text of a transcript entry. What the user typed is shown as typed.
pub fn entry_text(entry: &Entry) -> String {
    match &entry.body {
        EntryBody::Markdown(md) if entry.role == Role::User => md.clone(),
        EntryBody::Markdown(md) => markdown_to_text(md),
        EntryBody::Thinking => THINKING_TEXT.to_string(),
        EntryBody::Error(text) => text.clone(),
    }
}

/// Source badges line, e.g. `Sources: [a.pdf] [b.txt]`. None when there are no sources.
pub fn sources_line(sources: &[String]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }
    let badges: Vec<String> = sources.iter().map(|s| format!("[{}]", s)).collect();
    Some(format!("Sources: {}", badges.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;

    #[test]
    fn strips_emphasis() {
        assert_eq!(
            markdown_to_text("**report.pdf** added to the knowledge base."),
            "report.pdf added to the knowledge base."
        );
    }

    #[test]
    fn lists_and_paragraphs() {
        let md = "Key facts:\n\n- Revenue: **$4.2M**\n- Growth: `12%`\n\n1. first\n2. second";
        assert_eq!(
            markdown_to_text(md),
            "Key facts:\n\n- Revenue: $4.2M\n- Growth: 12%\n\n1. first\n2. second"
        );
    }

    #[test]
    fn code_blocks_are_indented() {
        let md = "Run:\n\n```\nvant chat\n```";
        assert_eq!(markdown_to_text(md), "Run:\n\n    vant chat");
    }

    #[test]
    fn opening_code_block_keeps_its_indent() {
        assert_eq!(markdown_to_text("```\n  indented()\n```"), "      indented()");
    }

    #[test]
    fn user_text_is_verbatim() {
        let mut transcript = Transcript::new();
        transcript.push(Role::User, "# of pages in **final** draft_v2?");
        transcript.push(Role::Assistant, "**12** pages");
        let entries = transcript.entries();
        assert_eq!(entry_text(&entries[0]), "# of pages in **final** draft_v2?");
        assert_eq!(entry_text(&entries[1]), "12 pages");
    }

    #[test]
    fn badges_in_order() {
        assert_eq!(sources_line(&[]), None);
        assert_eq!(
            sources_line(&["b.pdf".to_string(), "a.txt".to_string()]).unwrap(),
            "Sources: [b.pdf] [a.txt]"
        );
    }
}
