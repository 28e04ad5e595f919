use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use wordminer_dict::{Dictionary, LoadMode};
use wordminer_types::Tier;

fn main() -> Result<()> {
    let dict_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p wordminer-dict --example stats -- <path-to-dictionary-dir>")?;

    let dict = Dictionary::load_with_mode(&dict_dir, LoadMode::Mmap);
    let counts = dict.tier_counts();

    println!("Dictionary: {}", dict_dir.display());
    println!("Entries    : {}", dict.len());
    for tier in Tier::ALL {
        println!("  {:<14} {}", tier.label(), counts.get(&tier).copied().unwrap_or(0));
    }

    let translations: usize = dict.iter().map(|e| e.translations.len()).sum();
    let phrases: usize = dict.iter().map(|e| e.phrases.len()).sum();
    println!("Translations: {translations}");
    println!("Phrases     : {phrases}");

    for lemma in ["cat", "run", "serendipity"] {
        println!("Lemma '{}' tier: {}", lemma, dict.tier_of(lemma));
    }

    Ok(())
}
