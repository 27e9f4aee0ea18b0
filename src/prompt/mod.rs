use crate::{Action, Language};

pub const REVIEW_EMPTY_WARNING: &str = "⚠️ Please enter some code to review.";
pub const FIX_EMPTY_WARNING: &str = "⚠️ Please enter some code to fix.";
pub const REVIEW_ERROR_PREFIX: &str = "⚠️ Error: ";
pub const FIX_ERROR_PREFIX: &str = "⚠️ Error generating fixed code: ";

/// Warning stored when the code buffer is blank.
pub fn empty_warning(action: Action) -> &'static str {
    match action {
        Action::Review => REVIEW_EMPTY_WARNING,
        Action::Fix => FIX_EMPTY_WARNING,
    }
}

/// Response text for a failed generation call.
pub fn error_message(action: Action, message: &str) -> String {
    let prefix = match action {
        Action::Review => REVIEW_ERROR_PREFIX,
        Action::Fix => FIX_ERROR_PREFIX,
    };
    format!("{prefix}{message}")
}

/// Build the instruction string for `action`.
pub fn build(action: Action, language: Language, code: &str) -> String {
    match action {
        Action::Review => review_prompt(language, code),
        Action::Fix => fix_prompt(language, code),
    }
}

pub fn review_prompt(language: Language, code: &str) -> String {
    let lang = language.code;
    format!(
        "You are an expert-level software developer, skilled in writing efficient, clean, and advanced code.
I'm sharing a piece of code written in {lang}.
Your job is to deeply review this code and provide the following:

1️⃣ A quality rating: Better, Good, Normal, or Bad.
2️⃣ Detailed suggestions for improvement, including best practices and advanced alternatives.
3️⃣ A clear explanation of what the code does, step by step.
4️⃣ A list of any potential bugs or logical errors, if found.
5️⃣ Identification of syntax errors or runtime errors, if present.
6️⃣ Solutions and recommendations on how to fix each identified issue.

Analyze it like a senior developer reviewing a pull request.

Code: {code}
"
    )
}

pub fn fix_prompt(language: Language, code: &str) -> String {
    let lang = language.code;
    format!(
        "You are an expert-level software developer, skilled in writing efficient, clean, and advanced code.
I'm sharing a piece of code written in {lang} that may contain issues or can be improved.
Please fix this code by:

1️⃣ Correcting any syntax errors or bugs
2️⃣ Improving code quality and readability
3️⃣ Applying best practices for {lang}
4️⃣ Optimizing performance where possible
5️⃣ Ensuring the code follows modern standards

Return ONLY the complete fixed code without any explanations or markdown formatting.
Original Code: {code}"
    )
}

/// Wrap model output in a fenced code block tagged with the language code.
///
/// The model is asked not to emit markdown, but nothing strips it if it does.
pub fn fence(language: Language, text: &str) -> String {
    format!("```{}\n{}\n```", language.code, text)
}

/// Map a successful completion to the text stored in the response state.
pub fn success_text(action: Action, language: Language, text: String) -> String {
    match action {
        Action::Review => text,
        Action::Fix => fence(language, &text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> Language {
        Language::find("python").unwrap()
    }

    #[test]
    fn review_prompt_embeds_language_rubric_and_code() {
        let prompt = review_prompt(python(), "print('hi')");
        assert!(prompt.contains("written in python.\n"));
        assert!(prompt.contains("A quality rating: Better, Good, Normal, or Bad."));
        assert!(prompt.contains("Solutions and recommendations"));
        assert!(prompt.ends_with("Code: print('hi')\n"));
    }

    #[test]
    fn fix_prompt_asks_for_code_only() {
        let prompt = fix_prompt(python(), "x = 1");
        assert!(prompt.contains("written in python that may contain issues"));
        assert!(prompt.contains("Applying best practices for python"));
        assert!(prompt.contains("Return ONLY the complete fixed code"));
        assert!(prompt.ends_with("Original Code: x = 1"));
    }

    #[test]
    fn code_is_embedded_verbatim() {
        let code = "  fn main() {\n\t{}\n}  ";
        assert!(build(Action::Review, Language::default(), code).contains(code));
        assert!(build(Action::Fix, Language::default(), code).contains(code));
    }

    #[test]
    fn fence_tags_with_language_code() {
        assert_eq!(
            fence(python(), "print('hi')  # fixed"),
            "```python\nprint('hi')  # fixed\n```"
        );
    }

    #[test]
    fn success_text_only_fences_fixes() {
        assert_eq!(success_text(Action::Review, python(), "ok".into()), "ok");
        assert_eq!(
            success_text(Action::Fix, python(), "ok".into()),
            "```python\nok\n```"
        );
    }

    #[test]
    fn error_prefixes_differ() {
        assert_eq!(error_message(Action::Review, "boom"), "⚠️ Error: boom");
        assert_eq!(
            error_message(Action::Fix, "boom"),
            "⚠️ Error generating fixed code: boom"
        );
    }
}
