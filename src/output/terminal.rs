// Colored terminal output for analysis results, hits and ingest reports.
//
// main.rs and the walkthrough delegate all user-facing formatting here;
// logging stays in tracing.

use colored::Colorize;

use crate::analysis::pipeline::TokenizerSpec;
use crate::analysis::registry::PipelineRegistry;
use crate::similarity::SimilarityResult;
use crate::store::models::{AnalyzedToken, IngestReport, SearchHit};

/// Print a section banner.
pub fn section(title: &str) {
    println!("\n{}", format!("=== {title} ===").bold());
}

/// Print the registered pipelines and normalizers.
pub fn display_pipelines(registry: &PipelineRegistry) {
    section("Analysis pipelines");
    for name in registry.pipeline_names() {
        match registry.resolve(name) {
            Ok(resolved) => {
                let filters: Vec<&str> = resolved.filters.iter().map(|f| f.name.as_str()).collect();
                println!(
                    "  {:<22} {:<18} {}",
                    name.cyan(),
                    describe_tokenizer(&resolved.tokenizer),
                    filters.join(" -> ").dimmed()
                );
            }
            Err(e) => println!("  {:<22} {}", name.cyan(), e.to_string().red()),
        }
    }

    let normalizers: Vec<&str> = registry.normalizer_names().collect();
    if !normalizers.is_empty() {
        println!("\n  {}", "Normalizers".bold());
        for name in normalizers {
            let filters = registry
                .resolve_normalizer(name)
                .map(|n| n.filters.iter().map(|f| f.name.clone()).collect::<Vec<_>>().join(" -> "))
                .unwrap_or_default();
            println!("  {:<22} {:<18} {}", name.cyan(), "keyword", filters.dimmed());
        }
    }
}

fn describe_tokenizer(tokenizer: &TokenizerSpec) -> String {
    match tokenizer {
        TokenizerSpec::Standard => "standard".to_string(),
        TokenizerSpec::Whitespace => "whitespace".to_string(),
        TokenizerSpec::NGram { min, max, .. } if min == max => format!("ngram({min})"),
        TokenizerSpec::NGram { min, max, .. } => format!("ngram({min}..{max})"),
    }
}

/// Print the tokens of one analyze call, with positions and offsets.
pub fn display_tokens(pipeline: &str, text: &str, tokens: &[AnalyzedToken]) {
    println!(
        "  {} {}",
        format!("[{pipeline}]").cyan(),
        super::truncate_chars(text, 100).dimmed()
    );
    if tokens.is_empty() {
        println!("    {}", "(no tokens)".dimmed());
        return;
    }
    for token in tokens {
        println!(
            "    {:>3}  {:<20} {}",
            token.position,
            token.text.green(),
            format!("{}..{}", token.start_offset, token.end_offset).dimmed()
        );
    }
}

/// Print just the token texts on one line.
pub fn display_token_line(tokens: &[AnalyzedToken]) {
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    println!("  {}", super::token_list(&texts));
}

/// Print similarity results for a reference text.
pub fn display_similar(reference: &str, results: &[SimilarityResult]) {
    println!(
        "  {} {}",
        "Like:".bold(),
        super::truncate_chars(reference, 100).dimmed()
    );
    if results.is_empty() {
        println!("    {}", "No similar documents.".dimmed());
        return;
    }
    for (i, result) in results.iter().enumerate() {
        println!(
            "    {:>2}. {:<10} {:>7.3}  matched {}",
            i + 1,
            result.document_id,
            result.score,
            super::token_list(&result.matched_tokens).green()
        );
        println!(
            "        {}",
            super::truncate_chars(&super::token_list(&result.ngram_tokens), 120).dimmed()
        );
    }
}

/// Print search hits, showing `text_field` as the preview.
pub fn display_hits(hits: &[SearchHit], text_field: &str) {
    if hits.is_empty() {
        println!("  {}", "No hits.".dimmed());
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        let preview = hit
            .document
            .field(text_field)
            .map(|t| super::truncate_chars(t, 100))
            .unwrap_or_default();
        let context: Vec<String> = ["play_name", "speaker"]
            .iter()
            .filter_map(|f| hit.document.field(f))
            .map(str::to_string)
            .collect();
        println!(
            "  {:>3}. {:<10} {:>7.3}  {}  {}",
            i + 1,
            hit.document.id,
            hit.score,
            preview,
            context.join(" / ").dimmed()
        );
    }
}

/// Print the outcome of a bulk ingest run.
pub fn display_ingest_report(report: &IngestReport) {
    section("Ingest report");
    println!("  Batches:            {}", report.batches.len());
    println!(
        "  Documents indexed:  {}",
        report.total_succeeded().to_string().green()
    );

    let failures = report.document_failure_count();
    if failures > 0 {
        println!("  Document failures:  {}", failures.to_string().yellow());
        let rejected = report.batches.iter().flat_map(|b| b.document_failures.iter());
        for failure in report.malformed.iter().chain(rejected).take(10) {
            println!(
                "    {} {}",
                failure.locator.yellow(),
                super::truncate_chars(&failure.reason, 100).dimmed()
            );
        }
        if failures > 10 {
            println!("    {}", format!("... and {} more", failures - 10).dimmed());
        }
    }

    for batch in report.failed_batches() {
        let reason = batch
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        println!(
            "  {} batch {} (records {}..{}): {}",
            "!!".red().bold(),
            batch.batch_index,
            batch.records.start,
            batch.records.end,
            reason
        );
    }

    if let Some(unprocessed) = &report.unprocessed {
        println!(
            "  {} records {}..{} were never sent",
            "!!".red().bold(),
            unprocessed.start,
            unprocessed.end
        );
    }

    if report.aborted {
        println!("  {}", "Stopped early after a failed batch (--fail-fast).".red());
    } else if report.is_clean() {
        println!("  {}", "All documents indexed.".green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline::CharClass;

    #[test]
    fn test_describe_tokenizer() {
        assert_eq!(describe_tokenizer(&TokenizerSpec::Standard), "standard");
        assert_eq!(
            describe_tokenizer(&TokenizerSpec::ngram(3, 3, &[CharClass::Letter])),
            "ngram(3)"
        );
        assert_eq!(
            describe_tokenizer(&TokenizerSpec::ngram(2, 4, &[])),
            "ngram(2..4)"
        );
    }
}
