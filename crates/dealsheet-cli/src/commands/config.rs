use dealsheet_core::config::{load_options, ExtractOptions};
use dealsheet_core::error::DealsheetError;
use dealsheet_core::resolve::MatchStrategy;
use dealsheet_core::rules::builtin;
use std::path::Path;

use crate::output;

pub fn show() -> Result<(), DealsheetError> {
    let options = ExtractOptions {
        valuation: Some(builtin::default_valuation_plan().clone()),
        ..Default::default()
    };
    output::json::print(&options)
}

pub fn validate(file: &Path) -> Result<(), DealsheetError> {
    let options = load_options(file)?;
    let vocab = options.effective_vocabulary();

    println!("Options file '{}' is valid.", file.display());
    println!("  Header rows scanned: {}", options.header_rows);
    println!(
        "  Classifier: '{}' (v{}), min score {}, first {} rows",
        vocab.name, vocab.version, vocab.min_score, vocab.scan_rows
    );
    println!("  Rate warning band: 1.0 +/- {}", options.rate_band);
    let strategy = match options.resolver.strategy {
        MatchStrategy::Prefix => format!("prefix ({} chars)", options.resolver.prefix_length),
        MatchStrategy::Similarity => format!(
            "similarity (accept >= {}, review >= {})",
            options.resolver.accept_threshold, options.resolver.review_threshold
        ),
    };
    println!("  Facility matching: {strategy}");
    match &options.valuation {
        Some(plan) => {
            let methods: Vec<String> = plan.methods.iter().map(|m| m.kind().to_string()).collect();
            println!("  Valuation: {}", methods.join(", "));
        }
        None => println!("  Valuation: off"),
    }

    // Potential issues (warnings, not errors)
    let mut warnings = Vec::new();
    if options.resolver.strategy == MatchStrategy::Prefix {
        warnings.push(
            "prefix matching merges distinct facilities that share a name prefix".to_string(),
        );
    }
    if options.rate_band.is_zero() {
        warnings.push("rate_band is 0; rates near 1.0 are not flagged".to_string());
    }
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}

pub fn vocabulary() -> Result<(), DealsheetError> {
    let vocab = builtin::default_vocabulary();

    println!("{} (version {})\n", vocab.name, vocab.version);
    if let Some(ref desc) = vocab.description {
        println!("{desc}\n");
    }
    println!(
        "The first {} rows of each sheet are scored; a type needs {} distinct keyword hits.",
        vocab.scan_rows, vocab.min_score
    );
    println!("Ties go to the type listed first.\n");

    for group in &vocab.vocabularies {
        println!("  {} (weight {})", group.sheet_type, group.weight);
        println!("    {}", group.keywords.join(", "));
        println!();
    }

    Ok(())
}
