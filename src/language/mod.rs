use std::fmt;
use std::path::Path;

/// A selectable programming language: the code embedded in prompts and
/// fence tags, plus the label shown in the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub label: &'static str,
    /// File extensions, the first one doubles as the syntect lookup key.
    pub extensions: &'static [&'static str],
}

const fn lang(
    code: &'static str,
    label: &'static str,
    extensions: &'static [&'static str],
) -> Language {
    Language {
        code,
        label,
        extensions,
    }
}

/// Every language the picker offers, in display order. The first entry is the default.
pub const LANGUAGES: [Language; 22] = [
    lang("javascript", "JavaScript", &["js", "mjs", "cjs", "jsx"]),
    lang("python", "Python", &["py", "pyw"]),
    lang("java", "Java", &["java"]),
    lang("csharp", "C#", &["cs"]),
    lang("cpp", "C++", &["cpp", "cc", "cxx", "hpp", "hh", "h"]),
    lang("php", "PHP", &["php"]),
    lang("ruby", "Ruby", &["rb"]),
    lang("go", "Go", &["go"]),
    lang("swift", "Swift", &["swift"]),
    lang("kotlin", "Kotlin", &["kt", "kts"]),
    lang("typescript", "TypeScript", &["ts", "tsx", "mts"]),
    lang("rust", "Rust", &["rs"]),
    lang("dart", "Dart", &["dart"]),
    lang("scala", "Scala", &["scala", "sc"]),
    lang("perl", "Perl", &["pl", "pm"]),
    lang("haskell", "Haskell", &["hs"]),
    lang("elixir", "Elixir", &["ex", "exs"]),
    lang("r", "R", &["r", "R"]),
    lang("matlab", "MATLAB", &["matlab"]),
    lang("bash", "Bash", &["sh", "bash", "zsh"]),
    lang("html", "HTML", &["html", "htm"]),
    lang("css", "CSS", &["css"]),
];

impl Language {
    /// Look up a language by code or label, ignoring case.
    pub fn find(name: &str) -> Option<Language> {
        let name = name.trim();
        LANGUAGES
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(name) || l.label.eq_ignore_ascii_case(name))
            .copied()
    }

    /// Guess a language from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        LANGUAGES
            .iter()
            .find(|l| l.extensions.contains(&ext))
            .or_else(|| {
                LANGUAGES
                    .iter()
                    .find(|l| l.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            })
            .copied()
    }

    /// Position of this language in [`LANGUAGES`].
    pub fn index(&self) -> usize {
        LANGUAGES
            .iter()
            .position(|l| l.code == self.code)
            .unwrap_or(0)
    }

    /// Extension handed to the syntax highlighter.
    pub fn syntax_hint(&self) -> &'static str {
        self.extensions.first().copied().unwrap_or(self.code)
    }
}

impl Default for Language {
    fn default() -> Self {
        LANGUAGES[0]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_is_first_entry() {
        assert_eq!(Language::default().code, "javascript");
        assert_eq!(Language::default().index(), 0);
    }

    #[test]
    fn codes_are_unique() {
        for (i, a) in LANGUAGES.iter().enumerate() {
            for b in &LANGUAGES[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[test]
    fn find_by_code_or_label() {
        assert_eq!(Language::find("python").unwrap().label, "Python");
        assert_eq!(Language::find("C#").unwrap().code, "csharp");
        assert_eq!(Language::find("RUST").unwrap().code, "rust");
        assert!(Language::find("cobol").is_none());
    }

    #[test]
    fn from_path_uses_extension() {
        let lang = Language::from_path(&PathBuf::from("src/main.rs")).unwrap();
        assert_eq!(lang.code, "rust");

        let lang = Language::from_path(&PathBuf::from("script.PY")).unwrap();
        assert_eq!(lang.code, "python");

        assert!(Language::from_path(&PathBuf::from("README")).is_none());
        assert!(Language::from_path(&PathBuf::from("notes.txt")).is_none());
    }

    #[test]
    fn index_round_trips() {
        for (i, l) in LANGUAGES.iter().enumerate() {
            assert_eq!(l.index(), i);
        }
    }
}
