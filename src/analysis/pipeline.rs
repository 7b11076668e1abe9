// Analysis pipeline definitions — tokenizer + filter chain as plain data.
//
// Nothing in here runs text through anything. These types are what the
// registry validates, what gets serialized into the search engine's index
// settings, and what the local analyzer compiles for the in-memory store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Languages accepted by stop-word and stemmer filters.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "english",
    "french",
    "german",
    "spanish",
    "italian",
    "portuguese",
    "dutch",
    "russian",
    "swedish",
];

/// Filter names that resolve without an explicit definition.
pub const BUILTIN_FILTERS: &[&str] = &["lowercase", "stemmer", "stop"];

fn default_language() -> String {
    "english".to_string()
}

/// Character classes an n-gram tokenizer keeps. Anything else splits runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    Letter,
    Digit,
    Whitespace,
    Punctuation,
    Symbol,
}

impl CharClass {
    pub fn matches(self, c: char) -> bool {
        match self {
            CharClass::Letter => c.is_alphabetic(),
            CharClass::Digit => c.is_numeric(),
            CharClass::Whitespace => c.is_whitespace(),
            CharClass::Punctuation => c.is_ascii_punctuation() && !is_ascii_symbol(c),
            CharClass::Symbol => {
                is_ascii_symbol(c)
                    || !(c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
            }
        }
    }
}

fn is_ascii_symbol(c: char) -> bool {
    matches!(c, '$' | '+' | '<' | '=' | '>' | '^' | '`' | '|' | '~')
}

/// How raw text is split into candidate tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerSpec {
    /// Unicode word boundaries (UAX #29).
    Standard,
    Whitespace,
    /// Character n-grams over runs of the given classes (all characters when empty).
    #[serde(rename = "ngram")]
    NGram {
        min: usize,
        max: usize,
        #[serde(default)]
        char_classes: Vec<CharClass>,
    },
}

impl TokenizerSpec {
    pub fn ngram(min: usize, max: usize, char_classes: &[CharClass]) -> Self {
        TokenizerSpec::NGram {
            min,
            max,
            char_classes: char_classes.to_vec(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            TokenizerSpec::NGram { min, max, .. } => {
                if *min == 0 {
                    return Err("ngram min must be at least 1".to_string());
                }
                if max < min {
                    return Err(format!("ngram max ({max}) must be >= min ({min})"));
                }
                Ok(())
            }
            TokenizerSpec::Standard | TokenizerSpec::Whitespace => Ok(()),
        }
    }
}

/// A token filter applied after tokenization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    Lowercase,
    /// Remove stop words. `words` replaces the language's default list.
    #[serde(rename = "stop")]
    StopWords {
        #[serde(default = "default_language")]
        language: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        words: Option<Vec<String>>,
    },
    Stemmer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// Each group is a set of interchangeable terms.
    Synonym { groups: Vec<BTreeSet<String>> },
}

impl FilterSpec {
    pub fn english_stop() -> Self {
        FilterSpec::StopWords {
            language: default_language(),
            words: None,
        }
    }

    pub fn stemmer() -> Self {
        FilterSpec::Stemmer { language: None }
    }

    /// Build a synonym filter from groups of equivalent terms.
    pub fn synonyms<G, T>(groups: G) -> Self
    where
        G: IntoIterator<Item = T>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        FilterSpec::Synonym {
            groups: groups
                .into_iter()
                .map(|group| group.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Short type tag, used to name inline filters in index settings.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterSpec::Lowercase => "lowercase",
            FilterSpec::StopWords { .. } => "stop",
            FilterSpec::Stemmer { .. } => "stemmer",
            FilterSpec::Synonym { .. } => "synonym",
        }
    }

    /// The definition a built-in filter name stands for.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "lowercase" => Some(FilterSpec::Lowercase),
            "stemmer" => Some(FilterSpec::stemmer()),
            "stop" => Some(FilterSpec::english_stop()),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            FilterSpec::Lowercase => Ok(()),
            FilterSpec::StopWords { language, .. } => check_language(language),
            FilterSpec::Stemmer { language } => match language {
                Some(language) => check_language(language),
                None => Ok(()),
            },
            FilterSpec::Synonym { groups } => {
                if groups.is_empty() {
                    return Err("synonym filter needs at least one group".to_string());
                }
                for group in groups {
                    if group.len() < 2 {
                        return Err(format!(
                            "synonym group {:?} needs at least two distinct terms",
                            group
                        ));
                    }
                    if group.iter().any(|term| term.trim().is_empty()) {
                        return Err("synonym terms must not be blank".to_string());
                    }
                }
                Ok(())
            }
        }
    }
}

fn check_language(language: &str) -> Result<(), String> {
    if SUPPORTED_LANGUAGES.contains(&language) {
        Ok(())
    } else {
        Err(format!("unsupported language '{language}'"))
    }
}

/// Entry in a filter chain: either a full definition or a registered name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterRef {
    Named(String),
    Inline(FilterSpec),
}

impl From<FilterSpec> for FilterRef {
    fn from(spec: FilterSpec) -> Self {
        FilterRef::Inline(spec)
    }
}

impl From<&str> for FilterRef {
    fn from(name: &str) -> Self {
        FilterRef::Named(name.to_string())
    }
}

/// A named tokenizer + ordered filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPipeline {
    pub name: String,
    pub tokenizer: TokenizerSpec,
    #[serde(default)]
    pub filters: Vec<FilterRef>,
}

impl AnalysisPipeline {
    pub fn new(name: impl Into<String>, tokenizer: TokenizerSpec) -> Self {
        Self {
            name: name.into(),
            tokenizer,
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<FilterRef>) -> Self {
        self.filters.push(filter.into());
        self
    }
}

/// Keyword-style pipeline: the whole input stays one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<FilterRef>,
}

/// A filter with every reference resolved, paired with the name it is
/// published under in index settings.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedFilter {
    pub name: String,
    pub spec: FilterSpec,
}

/// Pipeline with its filter chain fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPipeline {
    pub name: String,
    pub tokenizer: TokenizerSpec,
    pub filters: Vec<NamedFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNormalizer {
    pub name: String,
    pub filters: Vec<NamedFilter>,
}
