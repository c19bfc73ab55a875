use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use sweep_exp::{
    load_run_config, load_space, MemoryRecorder, RunConfig, SweepEngine, SweepReport,
};
use tracing::info;

use super::split_names;
use crate::surface::SurfaceProxy;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML or JSON parameter space declaration.
    #[arg(long)]
    pub space: PathBuf,
    /// Run configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output directory for the report and exported artefacts.
    #[arg(long)]
    pub out: PathBuf,
    /// Discretization level overriding the configuration.
    #[arg(long)]
    pub level: Option<u32>,
    #[arg(long)]
    pub tag: Option<String>,
    /// Evaluate every point without reading or writing the cache.
    #[arg(long)]
    pub no_cache: bool,
    /// Share cache entries across spaces by fingerprinting only tag and assignment.
    #[arg(long)]
    pub only_hash_tag: bool,
    /// Dimensions to sweep; the rest stay at their defaults.
    #[arg(long, value_name = "NAME")]
    pub inputs: Vec<String>,
    /// Result fields to request and export.
    #[arg(long, value_name = "FIELD")]
    pub fields: Vec<String>,
    /// Cache location overriding the configuration.
    #[arg(long)]
    pub cache: Option<PathBuf>,
    /// Worker threads used for evaluation.
    #[arg(long)]
    pub jobs: Option<usize>,
}

impl RunArgs {
    fn resolve_config(&self) -> Result<RunConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => load_run_config(path)?,
            None => RunConfig::default(),
        };
        if let Some(level) = self.level {
            config.level = level;
        }
        if let Some(tag) = &self.tag {
            config.tag = tag.clone();
        }
        if self.no_cache {
            config.use_sample_cache = false;
        }
        if self.only_hash_tag {
            config.only_hash_tag = true;
        }
        let inputs = split_names(&self.inputs);
        if !inputs.is_empty() {
            config.inputs = Some(inputs);
        }
        let fields = split_names(&self.fields);
        if !fields.is_empty() {
            config.result_vars = fields;
        }
        if let Some(cache) = &self.cache {
            config.cache_path = cache.clone();
        }
        if let Some(jobs) = self.jobs {
            config.parallelism = jobs;
        }
        Ok(config)
    }
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = args.resolve_config()?;
    let space = load_space(&args.space)?;
    let cache = config.open_cache();
    let recorder = MemoryRecorder::new();

    let report =
        SweepEngine::new(&cache, &recorder).run(&space, &SurfaceProxy, &config.sweep_options())?;
    persist_report(&args.out, &report)?;

    let stats = report.stats;
    info!(out = %args.out.display(), "report written");
    println!(
        "{} points: {} evaluated, {} cached, {} duplicate, {} failed",
        stats.total, stats.evaluated, stats.cache_hits, stats.duplicates, stats.failed
    );
    Ok(())
}

fn persist_report(out: &Path, report: &SweepReport) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out)?;
    report.write_json(&out.join("report.json"))?;
    report.write_csv(&out.join("report.csv"), &report.fields)?;
    let written = report.export_artifacts(&out.join("artifacts"))?;
    info!(artifacts = written.len(), "artefacts exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn flags_override_configuration() {
        let harness = Harness::parse_from([
            "sweep",
            "--space",
            "space.yaml",
            "--out",
            "out",
            "--level",
            "4",
            "--tag",
            "bunny",
            "--only-hash-tag",
            "--no-cache",
            "--inputs",
            "depth,scale",
            "--jobs",
            "2",
        ]);
        let config = harness.args.resolve_config().unwrap();
        assert_eq!(config.level, 4);
        assert_eq!(config.tag, "bunny");
        assert!(config.only_hash_tag);
        assert!(!config.use_sample_cache);
        assert_eq!(config.inputs, Some(vec!["depth".to_string(), "scale".to_string()]));
        assert_eq!(config.parallelism, 2);
    }

    #[test]
    fn sweep_writes_report_csv_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let space = dir.path().join("space.yaml");
        fs::write(
            &space,
            "dimensions:\n  - name: depth\n    kind: int\n    bounds: [7, 8]\n    default: 7\n  - name: scale\n    kind: float\n    bounds: [1.0, 1.4]\n    default: 1.1\n  - name: linear_fit\n    kind: bool\n    default: false\n",
        )
        .unwrap();
        let out = dir.path().join("out");
        let args = RunArgs {
            space,
            config: None,
            out: out.clone(),
            level: Some(2),
            tag: None,
            no_cache: false,
            only_hash_tag: false,
            inputs: vec!["depth".to_string()],
            fields: Vec::new(),
            cache: Some(dir.path().join("cache.sqlite")),
            jobs: None,
        };
        run(&args).unwrap();

        let report = SweepReport::load_json(&out.join("report.json")).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.stats.evaluated, 2);
        let csv = fs::read_to_string(out.join("report.csv")).unwrap();
        assert!(csv.starts_with("depth,scale,linear_fit,quality,recording,triangles,vertices,status"));
        assert_eq!(fs::read_dir(out.join("artifacts")).unwrap().count(), 2);

        run(&args).unwrap();
        let rerun = SweepReport::load_json(&out.join("report.json")).unwrap();
        assert_eq!(rerun.stats.cache_hits, 2);
    }
}
