// Unit tests for local pipeline execution.
//
// Each test resolves a pipeline from a registry and runs it with the
// in-process analyzer, the same path the in-memory store takes.

use textlens::analysis::definitions::{
    AnalysisDefinitions, ENGLISH_STOP, LOWERCASE_NORMALIZER, LOWERCASE_STANDARD, SYNONYMS,
    TRIGRAM, WHITESPACE_STEMMER,
};
use textlens::analysis::local::{LocalAnalyzer, LocalNormalizer};
use textlens::analysis::pipeline::{AnalysisPipeline, CharClass, FilterSpec, TokenizerSpec};
use textlens::analysis::registry::PipelineRegistry;
use textlens::store::models::AnalyzedToken;

fn defaults() -> PipelineRegistry {
    PipelineRegistry::from_definitions(&AnalysisDefinitions::default()).unwrap()
}

fn analyzer(registry: &PipelineRegistry, name: &str) -> LocalAnalyzer {
    LocalAnalyzer::compile(&registry.resolve(name).unwrap()).unwrap()
}

fn texts(tokens: &[AnalyzedToken]) -> Vec<&str> {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

// ============================================================
// Scenarios
// ============================================================

#[test]
fn standard_lowercase_folds_case() {
    let tokens = analyzer(&defaults(), LOWERCASE_STANDARD).analyze("The QUICK Fox");
    assert_eq!(texts(&tokens), vec!["the", "quick", "fox"]);
    let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn english_stop_words_are_removed() {
    let tokens = analyzer(&defaults(), ENGLISH_STOP).analyze("the quick fox");
    assert_eq!(texts(&tokens), vec!["quick", "fox"]);
    // Removed words leave a gap in positions.
    assert_eq!(tokens[0].position, 1);
}

#[test]
fn trigram_on_short_words() {
    let registry = defaults();
    let trigram = analyzer(&registry, TRIGRAM);
    assert_eq!(texts(&trigram.analyze("cat")), vec!["cat"]);
    assert_eq!(texts(&trigram.analyze("cats")), vec!["cat", "ats"]);
    assert!(trigram.analyze("ox").is_empty());
}

#[test]
fn trigram_lowercases_and_skips_punctuation() {
    let tokens = analyzer(&defaults(), TRIGRAM).analyze("Ay, Me");
    assert!(texts(&tokens).is_empty());

    let tokens = analyzer(&defaults(), TRIGRAM).analyze("KING, now");
    assert_eq!(texts(&tokens), vec!["kin", "ing", "now"]);
    assert_eq!(tokens[2].start_offset, 6);
}

#[test]
fn synonyms_share_position_with_original() {
    let tokens = analyzer(&defaults(), SYNONYMS).analyze("They fight");
    assert_eq!(texts(&tokens), vec!["they", "fight", "quarrel"]);
    assert_eq!(tokens[1].position, tokens[2].position);
    assert_eq!(tokens[1].start_offset, tokens[2].start_offset);
    assert_eq!(tokens[1].end_offset, tokens[2].end_offset);
}

#[test]
fn whitespace_stemmer_reduces_words() {
    let tokens = analyzer(&defaults(), WHITESPACE_STEMMER).analyze("running dogs");
    assert_eq!(texts(&tokens), vec!["run", "dog"]);
}

#[test]
fn whitespace_stemmer_keeps_case_without_lowercase() {
    // No lowercase filter in this chain: "Henry" never matches "henry".
    let tokens = analyzer(&defaults(), WHITESPACE_STEMMER).analyze("Henry henry");
    assert_ne!(tokens[0].text, tokens[1].text);
}

#[test]
fn normalizer_yields_single_lowercased_token() {
    let registry = defaults();
    let normalizer =
        LocalNormalizer::compile(&registry.resolve_normalizer(LOWERCASE_NORMALIZER).unwrap())
            .unwrap();
    let tokens = normalizer.normalize("So Shaken As We Are");
    assert_eq!(texts(&tokens), vec!["so shaken as we are"]);
    assert_eq!(tokens[0].start_offset, 0);
    assert_eq!(tokens[0].end_offset, 19);
    assert!(normalizer.normalize("").is_empty());
}

// ============================================================
// Custom pipelines
// ============================================================

#[test]
fn custom_stop_list_replaces_language_default() {
    let mut registry = PipelineRegistry::new();
    registry
        .register(
            AnalysisPipeline::new("archaic", TokenizerSpec::Standard)
                .with_filter("lowercase")
                .with_filter(FilterSpec::StopWords {
                    language: "english".to_string(),
                    words: Some(vec!["thou".to_string(), "art".to_string()]),
                }),
        )
        .unwrap();
    let tokens = analyzer(&registry, "archaic").analyze("Thou art the king");
    assert_eq!(texts(&tokens), vec!["the", "king"]);
}

#[test]
fn ngram_with_digits_only() {
    let mut registry = PipelineRegistry::new();
    registry
        .register(AnalysisPipeline::new(
            "digits",
            TokenizerSpec::ngram(2, 2, &[CharClass::Digit]),
        ))
        .unwrap();
    let tokens = analyzer(&registry, "digits").analyze("act 123");
    assert_eq!(texts(&tokens), vec!["12", "23"]);
}

#[test]
fn analysis_is_deterministic() {
    let registry = defaults();
    let text = "Now is the winter of our discontent, made glorious summer";
    for name in registry.pipeline_names() {
        let analyzer = analyzer(&registry, name);
        assert_eq!(analyzer.analyze(text), analyzer.analyze(text), "{name}");
    }
}

#[test]
fn empty_text_produces_no_tokens() {
    let registry = defaults();
    for name in registry.pipeline_names() {
        assert!(analyzer(&registry, name).analyze("").is_empty(), "{name}");
    }
}
