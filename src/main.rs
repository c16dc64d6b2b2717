use std::env;
use std::path::Path;
use std::process::exit;

use dexmerge::{CollisionPolicy, DexBuffer, DexMerger};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        print_usage();
        exit(2);
    }

    if let Err(err) = run(&args[1], &args[2], &args[3]) {
        eprintln!("merge failed: {}", err);
        exit(1);
    }
}

fn run(out_path: &str, a_path: &str, b_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dex_a = DexBuffer::from_file(Path::new(a_path))?;
    let dex_b = DexBuffer::from_file(Path::new(b_path))?;
    let merged = DexMerger::new(dex_a, dex_b, CollisionPolicy::KeepFirst).merge()?;
    std::fs::write(out_path, merged)?;
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: dexmerge <out.dex> <a.dex> <b.dex>");
    eprintln!();
    eprintln!("If both a and b define the same classes, a's copy is kept.");
}
