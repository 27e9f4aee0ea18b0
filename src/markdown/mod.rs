use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::highlight::Highlighter;

const CODE_GUTTER: &str = "│ ";
const QUOTE_GUTTER: &str = "▎ ";
const RULE_WIDTH: usize = 40;

/// Render `markdown` into owned lines for the response pane.
///
/// Fenced code blocks go through `highlighter`.
pub fn render(markdown: &str, highlighter: &Highlighter) -> Vec<Line<'static>> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut state = RenderState::new(highlighter);
    for event in Parser::new_ext(markdown, options) {
        state.handle_event(event);
    }
    state.finish()
}

struct CodeBlock {
    tag: String,
    source: String,
}

struct ListLevel {
    next_number: Option<u64>,
}

struct RenderState<'h> {
    highlighter: &'h Highlighter,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    lists: Vec<ListLevel>,
    item_prefix: Option<String>,
    quote_depth: usize,
    code: Option<CodeBlock>,
}

fn heading_prefix(level: HeadingLevel) -> String {
    let n = match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    };
    format!("{} ", "#".repeat(n))
}

impl<'h> RenderState<'h> {
    fn new(highlighter: &'h Highlighter) -> Self {
        Self {
            highlighter,
            lines: Vec::new(),
            current: Vec::new(),
            style_stack: Vec::new(),
            lists: Vec::new(),
            item_prefix: None,
            quote_depth: 0,
            code: None,
        }
    }

    fn style(&self) -> Style {
        self.style_stack
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(code) = self.code.as_mut() {
                    code.source.push_str(&text);
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                let style = self.style().fg(Color::Yellow);
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                for (i, part) in html.split('\n').enumerate() {
                    if i > 0 {
                        self.flush_line();
                    }
                    self.push_text(part);
                }
            }
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(Color::DarkGray),
                )));
                self.blank_line();
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.style_stack.push(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                );
                self.push_text(&heading_prefix(level));
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                self.style_stack
                    .push(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                let tag = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeBlock {
                    tag,
                    source: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(ListLevel { next_number: start });
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(ListLevel {
                        next_number: Some(n),
                    }) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.item_prefix = Some(format!("{}{}", "  ".repeat(depth), marker));
            }
            Tag::Emphasis => self
                .style_stack
                .push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self
                .style_stack
                .push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self
                .style_stack
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => self.style_stack.push(
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            Tag::TableCell => self.push_text("| "),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Heading(_) => {
                self.style_stack.pop();
                self.flush_line();
                self.blank_line();
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.style_stack.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank_line();
            }
            TagEnd::CodeBlock => {
                if let Some(block) = self.code.take() {
                    self.push_code_block(block);
                }
                self.blank_line();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.style_stack.pop();
            }
            TagEnd::TableCell => self.push_text(" "),
            TagEnd::TableHead | TagEnd::TableRow => {
                self.push_text("|");
                self.flush_line();
            }
            TagEnd::Table => self.blank_line(),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let style = self.style();
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn push_code_block(&mut self, block: CodeBlock) {
        let gutter = Style::default().fg(Color::DarkGray);
        let label = if block.tag.is_empty() {
            "code".to_string()
        } else {
            block.tag.clone()
        };
        self.lines
            .push(Line::from(Span::styled(format!("┌ {label}"), gutter)));

        let mut highlighter = self.highlighter.for_tag(&block.tag);
        let source = block.source.strip_suffix('\n').unwrap_or(&block.source);
        for line in source.split('\n') {
            let mut spans = vec![Span::styled(CODE_GUTTER, gutter)];
            spans.extend(highlighter.highlight_line(line));
            self.lines.push(Line::from(spans));
        }
        self.lines.push(Line::from(Span::styled("└", gutter)));
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.current.len() + 2);
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                QUOTE_GUTTER.repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if let Some(prefix) = self.item_prefix.take() {
            spans.push(Span::styled(prefix, Style::default().fg(Color::Magenta)));
        } else if !self.lists.is_empty() {
            spans.push(Span::raw("  ".repeat(self.lists.len())));
        }
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank_line(&mut self) {
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        if let Some(block) = self.code.take() {
            self.push_code_block(block);
        }
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
