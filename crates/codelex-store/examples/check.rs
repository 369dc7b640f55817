use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use codelex_split::decompose;
use codelex_store::{CorporaFile, ScopeMask};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let dict = args.next().map(PathBuf::from).context(
        "usage: cargo run -p codelex-store --example check -- <dictionary> <filename> <token>...",
    )?;
    let filename = args.next().context("missing <filename>")?;
    let tokens: Vec<String> = args.collect();

    let dicts = CorporaFile::open(&dict)?;
    println!("Dictionary: {}", dict.display());
    println!("Filetypes : {}", dicts.filetypes().collect::<Vec<_>>().join(", "));

    for token in &tokens {
        let subtokens = decompose(token);
        if subtokens.is_empty() {
            println!("{token}: no subtokens");
            continue;
        }
        let unknown: Vec<&str> = subtokens
            .iter()
            .map(String::as_str)
            .filter(|st| !dicts.matches(st, &filename, None, ScopeMask::ALL))
            .collect();
        if unknown.is_empty() {
            println!("{token}: ok");
        } else {
            println!("{token}: unknown subtokens {unknown:?}");
        }
    }

    Ok(())
}
