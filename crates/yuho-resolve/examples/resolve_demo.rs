//! Demonstration of company name resolution.
//!
//! Run with: cargo run --example resolve_demo

use yuho_resolve::{CandidateFiler, NameResolver, Threshold, normalize_company_name};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("yuho Name Resolution Demo\n");

    let resolver = NameResolver::new(vec![
        CandidateFiler::new("E02144", "トヨタ自動車株式会社"),
        CandidateFiler::new("E01777", "ソニーグループ株式会社"),
        CandidateFiler::new("E04425", "ソフトバンクグループ株式会社"),
        CandidateFiler::new("E05080", "Ｚホールディングス株式会社"),
        CandidateFiler::new("E00001", "Acme Data Corporation"),
    ]);
    let threshold = Threshold::new(0.6)?;

    let queries = [
        "トヨタ自動車",
        "㈱ソニーグループ",
        "ソフトバンク",
        "Zホールディングス",
        "ACME DATA CO., LTD.",
        "Nintendo",
    ];

    println!("{:<24} {:<34} {:>6}  {}", "Query", "Best candidate", "Score", "Match");
    println!("{}", "=".repeat(76));
    for query in queries {
        let result = resolver.resolve(query, threshold);
        let best = result
            .best
            .as_ref()
            .map(|scored| {
                format!(
                    "{} {}",
                    scored.candidate.filer_id, scored.candidate.registered_name
                )
            })
            .unwrap_or_default();
        println!(
            "{:<24} {:<34} {:>6.3}  {}",
            query,
            best,
            result.similarity_score,
            if result.matched { "yes" } else { "no" }
        );
    }

    println!("\nNormalized forms:");
    for query in queries {
        println!("  {} -> {}", query, normalize_company_name(query));
    }

    Ok(())
}
