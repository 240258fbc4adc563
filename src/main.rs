use std::error::Error;

use hrag::{HragConfig, HybridRag};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => HragConfig::from_file(path)?,
        None => HragConfig::stub(256),
    };
    let rag = HybridRag::init(config)?;

    let corpus = vec![
        "cats are felines".to_string(),
        "dogs are canines".to_string(),
        "the feline sat on the mat".to_string(),
    ];
    let outcome = rag.ingest(None, corpus, true).await?;
    println!("stored {} records", outcome.inserted);

    for query in ["feline", "dogs"] {
        let results = rag.search(query, None, Some(2)).await?;
        println!("{query:?} -> {results:?}");
    }

    rag.close().await?;
    Ok(())
}
