mod cleaning;
mod data;
mod errors;
mod etl;

use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::cleaning::reference::ReferenceTables;
use crate::cleaning::shape::CityOrdering;
use crate::errors::Result;
use crate::etl::audit::AuditEtl;
use crate::etl::audit_postcodes::PostcodeAuditEtl;
use crate::etl::clean::{CleanEtl, LookupFailurePolicy};
use crate::etl::Etl;

/// Audits an OSM XML extract and converts its nodes and ways into JSON documents.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, default_value = "config/cairo_egypt.json")]
    config: PathBuf,

    #[command(subcommand)]
    job: Job,
}

#[derive(Debug, Subcommand)]
enum Job {
    /// Count element names, tag key types and contributors
    Audit,
    /// List city names and the postcodes used with them
    AuditPostcodes,
    /// Write one cleaned JSON document per node and way
    Clean,
}

fn default_dest_path() -> String {
    "output".to_string()
}

#[derive(Deserialize, Debug)]
pub struct UserConfig {
    pub data_path: String,
    #[serde(default = "default_dest_path")]
    pub dest_path: String,
    #[serde(default)]
    pub pretty: bool,
    #[serde(default)]
    pub show_progress: bool,
    /// Replaces the built-in Cairo city and postcode tables.
    #[serde(default)]
    pub reference_path: Option<String>,
    #[serde(default)]
    pub city_ordering: CityOrdering,
    #[serde(default)]
    pub on_lookup_failure: LookupFailurePolicy,
}

#[cfg(test)]
impl UserConfig {
    pub fn for_input(data_path: &str, dest_path: &str) -> Self {
        UserConfig {
            data_path: data_path.to_string(),
            dest_path: dest_path.to_string(),
            pretty: false,
            show_progress: false,
            reference_path: None,
            city_ordering: CityOrdering::default(),
            on_lookup_failure: LookupFailurePolicy::default(),
        }
    }
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn load_reference_tables(config: &UserConfig) -> Result<ReferenceTables> {
    match &config.reference_path {
        Some(path) => ReferenceTables::from_json_file(Path::new(path)),
        None => Ok(ReferenceTables::cairo()),
    }
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let output_dir = PathBuf::from(&config.dest_path);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging();

    let user_config = load_user_config(&args.config)?;
    let output_dir = create_output_dir(&user_config)?;

    match args.job {
        Job::Audit => AuditEtl::new(&user_config).process(&output_dir),
        Job::AuditPostcodes => PostcodeAuditEtl::new(&user_config).process(&output_dir),
        Job::Clean => {
            let tables = load_reference_tables(&user_config)?;
            CleanEtl::new(&user_config, &tables).process(&output_dir)
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_defaults() {
        let config: UserConfig = serde_json::from_str(r#"{"data_path": "cairo_egypt.osm"}"#).unwrap();
        assert_eq!(config.dest_path, "output");
        assert!(!config.pretty);
        assert!(config.reference_path.is_none());
        assert_eq!(config.city_ordering, CityOrdering::CityFirst);
        assert_eq!(config.on_lookup_failure, LookupFailurePolicy::Abort);
    }

    #[test]
    fn config_overrides() {
        let config: UserConfig = serde_json::from_str(r#"{
            "data_path": "cairo_egypt.osm.xz",
            "dest_path": "out",
            "pretty": true,
            "city_ordering": "document_order",
            "on_lookup_failure": "skip"
        }"#).unwrap();
        assert!(config.pretty);
        assert_eq!(config.city_ordering, CityOrdering::DocumentOrder);
        assert_eq!(config.on_lookup_failure, LookupFailurePolicy::Skip);
    }

    #[test]
    fn reference_tables_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, r#"{
            "expected_cities": ["Luxor"],
            "city_aliases": {},
            "postal_codes": {"Luxor": [{"first": 85951, "last": 85955}]}
        }"#).unwrap();
        let mut config = UserConfig::for_input("x.osm", "out");
        config.reference_path = Some(path.to_str().unwrap().to_string());

        let tables = load_reference_tables(&config).unwrap();
        assert!(tables.postal_code_validator().is_valid("Luxor", "85953").unwrap());
    }
}
