use ratatui::{
    style::{Color, Style},
    text::Span,
};
use syntect::{
    easy::HighlightLines,
    highlighting::{Color as SyntectColor, Theme, ThemeSet},
    parsing::{SyntaxReference, SyntaxSet},
};

use crate::Language;

/// Maximum line length for syntax highlighting (skip longer lines for performance).
const MAX_LINE_LENGTH: usize = 10_000;

/// Syntax highlighter for editor and fenced-code content.
///
/// Immutable and shareable. Use `for_language()` or `for_tag()` to get a
/// stateful session for one block of code.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    /// Create a new Highlighter with default syntax and theme sets.
    ///
    /// This loads all bundled syntaxes and themes, which takes ~250ms.
    /// The cost is paid once at initialization.
    pub fn new() -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get("base16-ocean.dark")
            .or_else(|| theme_set.themes.values().next())
            .cloned()
            .unwrap_or_default();

        Self { syntax_set, theme }
    }

    /// Session for code in one of the selectable languages.
    pub fn for_language(&self, language: Language) -> CodeHighlighter<'_> {
        let syntax = self
            .syntax_set
            .find_syntax_by_extension(language.syntax_hint())
            .or_else(|| self.syntax_set.find_syntax_by_name(language.label));
        CodeHighlighter::new(&self.syntax_set, &self.theme, syntax)
    }

    /// Session for a markdown fence tag such as `python` or `rs`.
    pub fn for_tag(&self, tag: &str) -> CodeHighlighter<'_> {
        if let Some(language) = Language::find(tag) {
            return self.for_language(language);
        }
        let syntax = self.syntax_set.find_syntax_by_token(tag);
        CodeHighlighter::new(&self.syntax_set, &self.theme, syntax)
    }

    /// Convert syntect Color to ratatui Color.
    fn syntect_to_ratatui(color: SyntectColor) -> Color {
        Color::Rgb(color.r, color.g, color.b)
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps `HighlightLines` parse state across the lines of one code block,
/// so multi-line strings and comments colour correctly. Feed lines in order.
pub struct CodeHighlighter<'a> {
    highlighter: Option<HighlightLines<'a>>,
    syntax_set: &'a SyntaxSet,
}

impl<'a> CodeHighlighter<'a> {
    fn new(
        syntax_set: &'a SyntaxSet,
        theme: &'a Theme,
        syntax: Option<&'a SyntaxReference>,
    ) -> Self {
        Self {
            highlighter: syntax.map(|s| HighlightLines::new(s, theme)),
            syntax_set,
        }
    }

    /// Whether a grammar was found; otherwise lines come back unstyled.
    pub fn is_highlighting(&self) -> bool {
        self.highlighter.is_some()
    }

    /// Highlight one source line (without its trailing newline).
    pub fn highlight_line(&mut self, line: &str) -> Vec<Span<'static>> {
        if line.is_empty() {
            return vec![Span::raw(String::new())];
        }

        if line.len() > MAX_LINE_LENGTH {
            return vec![Span::raw(line.to_string())];
        }

        let Some(ref mut highlighter) = self.highlighter else {
            return vec![Span::raw(line.to_string())];
        };

        // Syntect's newline syntaxes expect the terminator to close line-scoped rules.
        let with_newline = format!("{line}\n");
        match highlighter.highlight_line(&with_newline, self.syntax_set) {
            Ok(regions) => regions
                .into_iter()
                .filter_map(|(style, text)| {
                    let text = text.trim_end_matches('\n');
                    (!text.is_empty()).then(|| {
                        Span::styled(
                            text.to_string(),
                            Style::default().fg(Highlighter::syntect_to_ratatui(style.foreground)),
                        )
                    })
                })
                .collect(),
            Err(_) => vec![Span::raw(line.to_string())],
        }
    }
}
