// Request bodies for the search engine REST API.
//
// Pure functions from our types to JSON, kept apart from the HTTP client so
// they can be checked without a server.

use serde_json::{json, Map, Value};

use super::models::{Document, IndexSpec, QuerySpec};
use crate::analysis::pipeline::{FilterSpec, NamedFilter, ResolvedPipeline, TokenizerSpec};

/// Body for `PUT /{index}`.
pub fn index_body(spec: &IndexSpec) -> Value {
    let mut analyzers = Map::new();
    let mut tokenizers = Map::new();
    let mut filters = Map::new();
    let mut normalizers = Map::new();
    let mut max_ngram_diff = 0;

    for pipeline in &spec.pipelines {
        let tokenizer = match &pipeline.tokenizer {
            TokenizerSpec::Standard => "standard".to_string(),
            TokenizerSpec::Whitespace => "whitespace".to_string(),
            TokenizerSpec::NGram { min, max, .. } => {
                max_ngram_diff = max_ngram_diff.max(max - min);
                let name = format!("{}_ngram", pipeline.name);
                tokenizers.insert(name.clone(), tokenizer_definition(pipeline));
                name
            }
        };
        analyzers.insert(
            pipeline.name.clone(),
            json!({
                "type": "custom",
                "tokenizer": tokenizer,
                "filter": filter_names(&pipeline.filters, &mut filters),
            }),
        );
    }

    for normalizer in &spec.normalizers {
        normalizers.insert(
            normalizer.name.clone(),
            json!({
                "type": "custom",
                "filter": filter_names(&normalizer.filters, &mut filters),
            }),
        );
    }

    let mut analysis = Map::new();
    analysis.insert("analyzer".to_string(), Value::Object(analyzers));
    for (section, entries) in [
        ("tokenizer", tokenizers),
        ("filter", filters),
        ("normalizer", normalizers),
    ] {
        if !entries.is_empty() {
            analysis.insert(section.to_string(), Value::Object(entries));
        }
    }

    let mut settings = Map::new();
    // The engine rejects ngram ranges wider than 1 unless told otherwise.
    if max_ngram_diff > 1 {
        settings.insert("index".to_string(), json!({ "max_ngram_diff": max_ngram_diff }));
    }
    settings.insert("analysis".to_string(), Value::Object(analysis));

    let mut body = Map::new();
    body.insert("settings".to_string(), Value::Object(settings));
    if !spec.field_pipelines.is_empty() {
        let properties: Map<String, Value> = spec
            .field_pipelines
            .iter()
            .map(|(field, pipeline)| (field.clone(), json!({ "type": "text", "analyzer": pipeline })))
            .collect();
        body.insert("mappings".to_string(), json!({ "properties": properties }));
    }
    Value::Object(body)
}

fn tokenizer_definition(pipeline: &ResolvedPipeline) -> Value {
    match &pipeline.tokenizer {
        TokenizerSpec::NGram {
            min,
            max,
            char_classes,
        } => json!({
            "type": "ngram",
            "min_gram": min,
            "max_gram": max,
            "token_chars": char_classes,
        }),
        TokenizerSpec::Standard => json!({ "type": "standard" }),
        TokenizerSpec::Whitespace => json!({ "type": "whitespace" }),
    }
}

/// Names for a filter chain, defining any that are not engine built-ins.
fn filter_names(chain: &[NamedFilter], definitions: &mut Map<String, Value>) -> Vec<String> {
    chain
        .iter()
        .map(|filter| {
            if FilterSpec::builtin(&filter.name).as_ref() != Some(&filter.spec) {
                definitions.insert(filter.name.clone(), filter_definition(&filter.spec));
            }
            filter.name.clone()
        })
        .collect()
}

fn filter_definition(spec: &FilterSpec) -> Value {
    match spec {
        FilterSpec::Lowercase => json!({ "type": "lowercase" }),
        FilterSpec::StopWords { language, words } => match words {
            Some(words) => json!({ "type": "stop", "stopwords": words }),
            None => json!({ "type": "stop", "stopwords": format!("_{language}_") }),
        },
        FilterSpec::Stemmer { language } => json!({
            "type": "stemmer",
            "language": language.as_deref().unwrap_or("english"),
        }),
        FilterSpec::Synonym { groups } => {
            let rules: Vec<String> = groups
                .iter()
                .map(|group| group.iter().cloned().collect::<Vec<_>>().join(", "))
                .collect();
            json!({ "type": "synonym", "synonyms": rules })
        }
    }
}

/// Body for `POST /{index}/_search`.
pub fn search_body(query: &QuerySpec) -> Value {
    let clause = match query {
        QuerySpec::MatchAll { .. } => json!({ "match_all": {} }),
        QuerySpec::Match { field, query, .. } => json!({ "match": { field: { "query": query } } }),
        QuerySpec::MatchPhrase { field, phrase, .. } => {
            json!({ "match_phrase": { field: { "query": phrase } } })
        }
        QuerySpec::MoreLikeThis(mlt) => json!({
            "more_like_this": {
                "fields": mlt.fields,
                "like": mlt.like,
                "min_term_freq": mlt.params.min_term_frequency,
                "max_query_terms": mlt.params.max_query_terms,
                "min_doc_freq": mlt.params.min_doc_frequency,
                "minimum_should_match": format!("{}%", mlt.params.minimum_should_match),
            }
        }),
    };
    json!({ "size": query.size(), "query": clause })
}

/// NDJSON body for `POST /{index}/_bulk`: an action line and a source line
/// per document, with the trailing newline the bulk protocol requires.
pub fn bulk_body(documents: &[Document]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for document in documents {
        body.push_str(&serde_json::to_string(
            &json!({ "index": { "_id": document.id } }),
        )?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&document.fields)?);
        body.push('\n');
    }
    Ok(body)
}
