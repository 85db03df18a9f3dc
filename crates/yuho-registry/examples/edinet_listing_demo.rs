//! Demo of the EDINET document listing and XBRL download.
//!
//! This example demonstrates how to:
//! - List the documents submitted on one day
//! - Pick out the annual securities reports
//! - Download one report, list its concepts and read a few facts from its XBRL
//!
//! Run with: EDINET_API_KEY=... cargo run --example edinet_listing_demo [YYYY-MM-DD]

use chrono::NaiveDate;
use yuho_registry::xbrl::concepts::jppfs;
use yuho_registry::{DateRange, EdinetClient, Registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("EDINET_API_KEY")?;
    let client = EdinetClient::new(api_key)?;

    let day = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<NaiveDate>()?,
        None => NaiveDate::from_ymd_opt(2024, 6, 21).ok_or("invalid date")?,
    };

    println!("Listing documents submitted on {}...", day);
    let documents = client.list_documents(&DateRange::new(day, day)?).await?;
    let annual: Vec<_> = documents
        .iter()
        .filter(|doc| doc.document_type.is_annual_securities_report() && doc.has_xbrl)
        .collect();
    println!(
        "{} documents, {} annual securities reports with XBRL",
        documents.len(),
        annual.len()
    );

    for doc in annual.iter().take(5) {
        println!("  {} {} {}", doc.document_id, doc.filer_id, doc.registered_name);
    }
    if annual.len() > 5 {
        println!("  ... and {} more", annual.len() - 5);
    }

    if let Some(doc) = annual.first() {
        println!("\nDownloading {}...", doc.document_id);
        let payload = client.fetch_report_payload(&doc.document_id).await?;
        println!("  Facts:    {}", payload.facts.len());
        println!("  Contexts: {}", payload.contexts.len());
        let concepts = payload.get_concepts();
        println!("  Concepts: {}", concepts.len());
        for concept in concepts.iter().take(10) {
            println!("    {}", concept);
        }
        for fact in payload.facts_for_tag(jppfs::NET_SALES).take(3) {
            println!(
                "  NetSales [{}]: {} {}",
                fact.context_ref,
                fact.value,
                fact.unit_ref.as_deref().unwrap_or("")
            );
        }
    }

    println!("\nCalls used: {}/{}", client.budget().used(), client.budget().limit());

    Ok(())
}
