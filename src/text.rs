use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder returned by the generation layer whenever a model call fails.
pub const GENERATION_FAILURE: &str = "Error generating response.";

const TERMINALS: [char; 3] = ['.', '!', '?'];
const LONG_RESPONSE_SENTENCES: usize = 10;
const KEPT_SENTENCES: usize = 5;

// Generic role prefixes a model tends to echo back, e.g. "Judge:" or
// "Defense Lawyer (rebuttal):". Only the first line is inspected. Counsel
// names are left alone since the judge uses them as score headings.
static RE_ROLE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[^\n:]{0,80}?\b(?:Lawyer|Judge)(?:\s*\([^)\n]*\))?\s*:\s*").unwrap()
});

pub fn ends_with_terminal(text: &str) -> bool {
    text.ends_with(TERMINALS)
}

/// Normalizes raw model output into a bounded run of complete sentences.
pub fn clean_response(raw: &str) -> String {
    let stripped = RE_ROLE_PREFIX.replace(raw, "");
    let mut response = stripped.trim().to_string();

    let sentences = split_sentences(&response);
    if sentences.len() > LONG_RESPONSE_SENTENCES {
        response = sentences[..KEPT_SENTENCES].join(" ");
    }

    if !ends_with_terminal(&response) {
        if let Some(last) = response.rfind(TERMINALS) {
            response.truncate(last + 1);
        }
    }

    response.trim().to_string()
}

/// Removes a leading `speaker:` or `speaker (note):` label.
pub fn strip_speaker_label<'a>(text: &'a str, speaker: &str) -> &'a str {
    let trimmed = text.trim_start();
    let Some(rest) = trimmed.strip_prefix(speaker) else {
        return text;
    };

    let mut rest = rest.trim_start();
    if let Some(note) = rest.strip_prefix('(') {
        match note.split_once(')') {
            Some((inner, after)) if !inner.contains('\n') => rest = after.trim_start(),
            _ => return text,
        }
    }

    match rest.strip_prefix(':') {
        Some(body) => body.trim_start(),
        None => text,
    }
}

/// Appends a period when the text does not already end a sentence.
pub fn complete_sentence(mut text: String) -> String {
    if !ends_with_terminal(&text) {
        text.push('.');
    }
    text
}

/// Splits after terminal punctuation that is followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        if !TERMINALS.contains(&ch) {
            continue;
        }
        let boundary = index + ch.len_utf8();
        if !matches!(chars.peek(), Some((_, next)) if next.is_whitespace()) {
            continue;
        }

        sentences.push(&text[start..boundary]);
        while let Some((_, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            chars.next();
        }
        start = chars.peek().map(|(next, _)| *next).unwrap_or(text.len());
    }

    if start < text.len() || sentences.is_empty() {
        sentences.push(&text[start..]);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echoed_role_prefix() {
        assert_eq!(
            clean_response("Judge: Both sides argued well."),
            "Both sides argued well."
        );
        assert_eq!(
            clean_response("Defense Lawyer (rebuttal): Training is copying."),
            "Training is copying."
        );
    }

    #[test]
    fn keeps_counsel_headings() {
        let text = "Book Authors' Counsel: Legal Reasoning: 8, Evidence: 6, Persuasiveness: 9.";
        assert_eq!(clean_response(text), text);
    }

    #[test]
    fn strips_only_the_named_speaker() {
        let speaker = "Book Authors' Counsel";
        assert_eq!(
            strip_speaker_label("Book Authors' Counsel (opening): Authors deserve payment.", speaker),
            "Authors deserve payment."
        );
        assert_eq!(
            strip_speaker_label("  Book Authors' Counsel: Pay them.", speaker),
            "Pay them."
        );
        assert_eq!(
            strip_speaker_label("LLM Companies' Counsel: Fair use.", speaker),
            "LLM Companies' Counsel: Fair use."
        );
        assert_eq!(
            strip_speaker_label("Book Authors' Counsel argued well.", speaker),
            "Book Authors' Counsel argued well."
        );
    }

    #[test]
    fn keeps_score_lines_that_look_like_prefixes() {
        let text = "Legal Reasoning: 8, Evidence: 6, Persuasiveness: 9.";
        assert_eq!(clean_response(text), text);
    }

    #[test]
    fn long_responses_keep_first_five_sentences() {
        let raw = (1..=11)
            .map(|n| format!("Sentence {n}."))
            .collect::<Vec<_>>()
            .join(" ");

        let cleaned = clean_response(&raw);
        assert_eq!(
            cleaned,
            "Sentence 1. Sentence 2. Sentence 3. Sentence 4. Sentence 5."
        );
        assert_eq!(split_sentences(&cleaned).len(), 5);
    }

    #[test]
    fn ten_sentences_are_left_alone() {
        let raw = (1..=10)
            .map(|n| format!("Point {n}!"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(split_sentences(&clean_response(&raw)).len(), 10);
    }

    #[test]
    fn trailing_fragment_is_dropped() {
        assert_eq!(
            clean_response("Fair use applies. The market harm is"),
            "Fair use applies."
        );
    }

    #[test]
    fn text_without_punctuation_is_only_trimmed() {
        assert_eq!(clean_response("  no punctuation here  "), "no punctuation here");
    }

    #[test]
    fn failure_literal_survives_cleaning() {
        assert_eq!(clean_response(GENERATION_FAILURE), GENERATION_FAILURE);
    }

    #[test]
    fn splits_on_punctuation_followed_by_whitespace_only() {
        let sentences = split_sentences("Version 1.5 shipped. Really?  Yes!");
        assert_eq!(sentences, vec!["Version 1.5 shipped.", "Really?", "Yes!"]);
    }

    #[test]
    fn completes_open_sentences() {
        assert_eq!(complete_sentence("Authors deserve pay".into()), "Authors deserve pay.");
        assert_eq!(complete_sentence("Done?".into()), "Done?");
    }
}
