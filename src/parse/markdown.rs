//! Pattern extraction from markdown notes

use chrono::NaiveDate;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Longest context line stored on an edge
const MAX_CONTEXT_CHARS: usize = 120;

fn wiki_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid regex"))
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid regex"))
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\w+)").expect("valid regex"))
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)\*\*([^*\n]+)\*\*:[ \t]*(.+?)[ \t]*$").expect("valid regex"))
}

fn checklist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^- \[([ xX])\][ \t]+(.+?)[ \t]*$").expect("valid regex"))
}

/// A `[[Name]]` cross-reference and the line it appeared on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub name: String,
    pub context: String,
}

/// One `- [ ]` / `- [x]` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub text: String,
    pub completed: bool,
    pub owner: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Normalize a name into a slug: lowercase, punctuation dropped, runs of
/// whitespace and hyphens collapsed to a single hyphen.
pub fn slugify(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    kept.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// First level-1 heading, or a humanized file stem
pub fn extract_title(content: &str, path: &str) -> String {
    let mut in_title = false;
    let mut parts: Vec<String> = Vec::new();

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => {
                in_title = true;
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_title => {
                let title = parts.join("").trim().to_string();
                if !title.is_empty() {
                    return title;
                }
                in_title = false;
                parts.clear();
            }
            Event::Text(text) | Event::Code(text) if in_title => parts.push(text.to_string()),
            _ => {}
        }
    }

    humanize_stem(path)
}

/// `"q3-budget_review.md"` → `"Q3 Budget Review"`
pub fn humanize_stem(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    stem.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Every `[[Name]]` occurrence, in document order
pub fn extract_wiki_links(content: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    for line in content.lines() {
        for cap in wiki_link_re().captures_iter(line) {
            let name = cap[1].trim();
            if name.is_empty() {
                continue;
            }
            links.push(WikiLink {
                name: name.to_string(),
                context: truncate_chars(line.trim(), MAX_CONTEXT_CHARS),
            });
        }
    }
    links
}

/// Value of the first `**Label**: value` field with this exact label
pub fn extract_field(content: &str, label: &str) -> Option<String> {
    field_re()
        .captures_iter(content)
        .find(|cap| &cap[1] == label)
        .map(|cap| cap[2].trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Every valid `YYYY-MM-DD` date in the text
pub fn extract_dates(content: &str) -> Vec<NaiveDate> {
    iso_date_re()
        .captures_iter(content)
        .filter_map(|cap| NaiveDate::parse_from_str(&cap[1], "%Y-%m-%d").ok())
        .collect()
}

/// Checklist lines with their owner mention and first date
pub fn extract_checklist(content: &str) -> Vec<ChecklistItem> {
    checklist_re()
        .captures_iter(content)
        .map(|cap| {
            let text = cap[2].trim().to_string();
            let owner = mention_re().captures(&text).map(|m| m[1].to_string());
            let date = extract_dates(&text).into_iter().next();
            ChecklistItem {
                completed: !cap[1].trim().is_empty(),
                owner,
                date,
                text,
            }
        })
        .collect()
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
