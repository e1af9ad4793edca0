//! Conversation title heuristics.
//!
//! Titles are derived from the first user message that is not a greeting.
//! The greeting list and topic keyword tables are plain data on [`TitleRules`]
//! so they can be swapped or extended without touching the matching logic.

pub const MAX_TITLE_LENGTH: usize = 50;

/// One topic pattern: if any keyword appears in the message, use `title`.
/// Rules are checked in order; first match wins.
#[derive(Debug, Clone)]
pub struct TopicRule {
    pub keywords: Vec<String>,
    pub title: String,
}

impl TopicRule {
    fn new(keywords: &[&str], title: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TitleRules {
    /// Conversational pleasantries excluded from title derivation.
    pub greetings: Vec<String>,
    pub topics: Vec<TopicRule>,
    pub placeholder: String,
}

impl Default for TitleRules {
    fn default() -> Self {
        let greetings = [
            "hi",
            "hello",
            "hey",
            "hiya",
            "good morning",
            "good afternoon",
            "good evening",
            "how are you",
            "thanks",
            "thank you",
            "cheers",
            "ok",
            "okay",
        ]
        .iter()
        .map(|g| g.to_string())
        .collect();

        let topics = vec![
            TopicRule::new(&["damp", "mould", "mold", "condensation"], "Damp & Mould Help"),
            TopicRule::new(
                &["repair", "broken", "leak", "boiler", "heating", "maintenance"],
                "Repairs & Maintenance",
            ),
            TopicRule::new(&["deposit"], "Deposit Questions"),
            TopicRule::new(&["rent", "payment", "arrears", "pay"], "Rent & Payments"),
            TopicRule::new(
                &["tenancy", "contract", "agreement", "lease", "notice"],
                "Tenancy Agreement",
            ),
            TopicRule::new(&["video", "upload", "recording", "camera"], "Video Uploads"),
            TopicRule::new(&["account", "login", "password", "sign in"], "Account & Login"),
            TopicRule::new(&["inspection", "viewing"], "Inspections & Viewings"),
        ];

        Self {
            greetings,
            topics,
            placeholder: crate::model::PLACEHOLDER_TITLE.to_string(),
        }
    }
}

/// Whether a message is just a pleasantry. Single-word greetings must match a
/// whole word (so "this" never matches "hi"); phrases match by containment.
pub fn is_greeting(text: &str, greetings: &[String]) -> bool {
    let lower = text.to_lowercase();
    greetings.iter().any(|g| {
        if g.contains(' ') {
            lower.contains(g.as_str())
        } else {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == g)
        }
    })
}

/// Derive a session title from the user messages, in order.
///
/// The source is the first non-greeting user message; if every user message is
/// a greeting (or there are none), the placeholder is kept.
pub fn derive_title<'a>(user_texts: impl IntoIterator<Item = &'a str>, rules: &TitleRules) -> String {
    let source = user_texts
        .into_iter()
        .find(|text| !is_greeting(text, &rules.greetings));

    let Some(source) = source else {
        return rules.placeholder.clone();
    };

    let lower = source.to_lowercase();
    for rule in &rules.topics {
        if rule.keywords.iter().any(|k| lower.contains(k.as_str())) {
            return truncate(&rule.title);
        }
    }

    truncate(&fallback_title(source))
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "i", "is", "are", "was", "do", "does", "can", "could", "how", "what",
    "when", "where", "why", "who", "my", "me", "to", "of", "in", "on", "it", "and", "or",
    "for", "with", "please", "you",
];

/// "First three meaningful words + Discussion" fallback when no topic matches.
fn fallback_title(text: &str) -> String {
    let meaningful: Vec<&str> = text
        .split_whitespace()
        .filter(|word| {
            let bare: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            !bare.is_empty() && !STOPWORDS.contains(&bare.as_str())
        })
        .take(3)
        .collect();

    if meaningful.is_empty() {
        return text.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
    }
    format!("{} Discussion", meaningful.join(" "))
}

fn truncate(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_LENGTH {
        return title.to_string();
    }
    let cut: String = title.chars().take(MAX_TITLE_LENGTH - 1).collect();
    format!("{}…", cut.trim_end())
}
