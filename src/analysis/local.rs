// In-process execution of resolved pipelines.
//
// This backs the in-memory store. Word segmentation comes from
// unicode-segmentation, stemming from rust-stemmers and non-English stop
// lists from stop-words. The English stop list is the engine's `_english_`
// set so results line up with what the real search engine returns.

use std::collections::{BTreeSet, HashMap, HashSet};

use rust_stemmers::{Algorithm, Stemmer};
use stop_words::LANGUAGE;
use unicode_segmentation::UnicodeSegmentation;

use super::pipeline::{
    CharClass, FilterSpec, NamedFilter, ResolvedNormalizer, ResolvedPipeline, TokenizerSpec,
};
use crate::error::ConfigError;
use crate::store::models::AnalyzedToken;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// A pipeline compiled for local execution.
pub struct LocalAnalyzer {
    name: String,
    tokenizer: TokenizerSpec,
    filters: Vec<CompiledFilter>,
}

enum CompiledFilter {
    Lowercase,
    Stop(HashSet<String>),
    Stem(Stemmer),
    Synonym(HashMap<String, Vec<String>>),
}

impl LocalAnalyzer {
    pub fn compile(pipeline: &ResolvedPipeline) -> Result<Self, ConfigError> {
        Ok(Self {
            name: pipeline.name.clone(),
            tokenizer: pipeline.tokenizer.clone(),
            filters: compile_chain(&pipeline.name, &pipeline.filters)?,
        })
    }

    /// Standard tokenizer + lowercase, used for fields with no mapped pipeline.
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            tokenizer: TokenizerSpec::Standard,
            filters: vec![CompiledFilter::Lowercase],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn analyze(&self, text: &str) -> Vec<AnalyzedToken> {
        let tokens = match &self.tokenizer {
            TokenizerSpec::Standard => standard_tokens(text),
            TokenizerSpec::Whitespace => whitespace_tokens(text),
            TokenizerSpec::NGram {
                min,
                max,
                char_classes,
            } => ngram_tokens(text, *min, *max, char_classes),
        };
        self.filters
            .iter()
            .fold(tokens, |tokens, filter| filter.apply(tokens))
    }
}

/// A normalizer compiled for local execution.
pub struct LocalNormalizer {
    filters: Vec<CompiledFilter>,
}

impl LocalNormalizer {
    pub fn compile(normalizer: &ResolvedNormalizer) -> Result<Self, ConfigError> {
        Ok(Self {
            filters: compile_chain(&normalizer.name, &normalizer.filters)?,
        })
    }

    /// The whole text as one token, filtered. Empty text yields no token.
    pub fn normalize(&self, text: &str) -> Vec<AnalyzedToken> {
        if text.is_empty() {
            return Vec::new();
        }
        let token = AnalyzedToken {
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.chars().count(),
            position: 0,
        };
        self.filters
            .iter()
            .fold(vec![token], |tokens, filter| filter.apply(tokens))
    }
}

fn compile_chain(owner: &str, chain: &[NamedFilter]) -> Result<Vec<CompiledFilter>, ConfigError> {
    chain
        .iter()
        .map(|filter| CompiledFilter::compile(&filter.spec))
        .collect::<Result<_, String>>()
        .map_err(|reason| ConfigError::InvalidPipeline {
            name: owner.to_string(),
            reason,
        })
}

impl CompiledFilter {
    fn compile(spec: &FilterSpec) -> Result<Self, String> {
        Ok(match spec {
            FilterSpec::Lowercase => CompiledFilter::Lowercase,
            FilterSpec::StopWords { language, words } => {
                let words: HashSet<String> = match words {
                    Some(words) => words.iter().cloned().collect(),
                    None => stop_list(language)?.into_iter().collect(),
                };
                CompiledFilter::Stop(words)
            }
            FilterSpec::Stemmer { language } => {
                let language = language.as_deref().unwrap_or("english");
                CompiledFilter::Stem(Stemmer::create(stemmer_algorithm(language)?))
            }
            FilterSpec::Synonym { groups } => {
                let mut equivalents: HashMap<String, BTreeSet<String>> = HashMap::new();
                for group in groups {
                    for term in group {
                        equivalents
                            .entry(term.clone())
                            .or_default()
                            .extend(group.iter().filter(|t| *t != term).cloned());
                    }
                }
                CompiledFilter::Synonym(
                    equivalents
                        .into_iter()
                        .map(|(term, alts)| (term, alts.into_iter().collect()))
                        .collect(),
                )
            }
        })
    }

    fn apply(&self, tokens: Vec<AnalyzedToken>) -> Vec<AnalyzedToken> {
        match self {
            CompiledFilter::Lowercase => tokens
                .into_iter()
                .map(|mut t| {
                    t.text = t.text.to_lowercase();
                    t
                })
                .collect(),
            // Removed tokens leave a gap in positions.
            CompiledFilter::Stop(words) => tokens
                .into_iter()
                .filter(|t| !words.contains(&t.text))
                .collect(),
            CompiledFilter::Stem(stemmer) => tokens
                .into_iter()
                .map(|mut t| {
                    t.text = stemmer.stem(&t.text).into_owned();
                    t
                })
                .collect(),
            CompiledFilter::Synonym(equivalents) => {
                let mut out = Vec::with_capacity(tokens.len());
                for token in tokens {
                    match equivalents.get(&token.text) {
                        Some(alts) => {
                            // Synonyms stack at the original's position.
                            let synonyms: Vec<AnalyzedToken> = alts
                                .iter()
                                .map(|alt| AnalyzedToken {
                                    text: alt.clone(),
                                    ..token.clone()
                                })
                                .collect();
                            out.push(token);
                            out.extend(synonyms);
                        }
                        None => out.push(token),
                    }
                }
                out
            }
        }
    }
}

fn stop_list(language: &str) -> Result<Vec<String>, String> {
    let lang = match language {
        "english" => return Ok(ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect()),
        "french" => LANGUAGE::French,
        "german" => LANGUAGE::German,
        "spanish" => LANGUAGE::Spanish,
        "italian" => LANGUAGE::Italian,
        "portuguese" => LANGUAGE::Portuguese,
        "dutch" => LANGUAGE::Dutch,
        "russian" => LANGUAGE::Russian,
        "swedish" => LANGUAGE::Swedish,
        other => return Err(format!("no stop list for language '{other}'")),
    };
    Ok(stop_words::get(lang))
}

fn stemmer_algorithm(language: &str) -> Result<Algorithm, String> {
    Ok(match language {
        "english" => Algorithm::English,
        "french" => Algorithm::French,
        "german" => Algorithm::German,
        "spanish" => Algorithm::Spanish,
        "italian" => Algorithm::Italian,
        "portuguese" => Algorithm::Portuguese,
        "dutch" => Algorithm::Dutch,
        "russian" => Algorithm::Russian,
        "swedish" => Algorithm::Swedish,
        other => return Err(format!("no stemmer for language '{other}'")),
    })
}

fn standard_tokens(text: &str) -> Vec<AnalyzedToken> {
    let mut tokens = Vec::new();
    let mut char_cursor = 0;
    let mut byte_cursor = 0;
    for (byte_start, word) in text.unicode_word_indices() {
        char_cursor += text[byte_cursor..byte_start].chars().count();
        let len = word.chars().count();
        tokens.push(AnalyzedToken {
            text: word.to_string(),
            start_offset: char_cursor,
            end_offset: char_cursor + len,
            position: tokens.len(),
        });
        char_cursor += len;
        byte_cursor = byte_start + word.len();
    }
    tokens
}

fn whitespace_tokens(text: &str) -> Vec<AnalyzedToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut offset = 0;
    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                push_token(&mut tokens, std::mem::take(&mut current), start, offset);
            }
        } else {
            if current.is_empty() {
                start = offset;
            }
            current.push(c);
        }
        offset += 1;
    }
    if !current.is_empty() {
        push_token(&mut tokens, current, start, offset);
    }
    tokens
}

fn push_token(tokens: &mut Vec<AnalyzedToken>, text: String, start: usize, end: usize) {
    let position = tokens.len();
    tokens.push(AnalyzedToken {
        text,
        start_offset: start,
        end_offset: end,
        position,
    });
}

fn ngram_tokens(text: &str, min: usize, max: usize, classes: &[CharClass]) -> Vec<AnalyzedToken> {
    let keep = |c: char| classes.is_empty() || classes.iter().any(|class| class.matches(c));
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut run_start = None;
    for i in 0..=chars.len() {
        let kept = i < chars.len() && keep(chars[i]);
        match (kept, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                ngrams_in_run(&chars[..i], start, min, max, &mut tokens);
                run_start = None;
            }
            _ => {}
        }
    }
    tokens
}

/// Grams ordered by start offset, then by increasing length.
fn ngrams_in_run(
    chars: &[char],
    start: usize,
    min: usize,
    max: usize,
    tokens: &mut Vec<AnalyzedToken>,
) {
    let end = chars.len();
    for from in start..end {
        for n in min..=max {
            let to = from + n;
            if to > end {
                break;
            }
            push_token(tokens, chars[from..to].iter().collect(), from, to);
        }
    }
}
