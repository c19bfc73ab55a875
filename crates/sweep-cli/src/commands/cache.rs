use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use sweep_cache::{CacheBackend, ResultCache, CACHE_SCHEMA};
use tracing::info;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the entry count and schema of a cache.
    Stats(CacheTarget),
    /// Remove every cached result.
    Clear(CacheTarget),
}

#[derive(Args, Debug)]
pub struct CacheTarget {
    /// Cache location: `.sqlite`/`.db` file or entry directory.
    #[arg(long)]
    pub cache: PathBuf,
}

impl CacheTarget {
    /// Opens an existing cache; a mistyped path must not create a fresh one.
    fn open(&self) -> Result<ResultCache, Box<dyn Error>> {
        if !self.cache.exists() {
            return Err(format!("no cache at {}", self.cache.display()).into());
        }
        Ok(ResultCache::open(&CacheBackend::from_path(&self.cache))?)
    }
}

pub fn run(args: &CacheArgs) -> Result<(), Box<dyn Error>> {
    match &args.action {
        CacheAction::Stats(target) => {
            let cache = target.open()?;
            println!(
                "{}: {} entries (schema {}.{}.{})",
                target.cache.display(),
                cache.len()?,
                CACHE_SCHEMA.major,
                CACHE_SCHEMA.minor,
                CACHE_SCHEMA.patch
            );
        }
        CacheAction::Clear(target) => {
            let cache = target.open()?;
            let removed = cache.clear()?;
            info!(removed, cache = %target.cache.display(), "cache cleared");
            println!("removed {removed} entries");
        }
    }
    Ok(())
}
