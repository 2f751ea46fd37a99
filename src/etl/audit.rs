use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::cleaning::keys::{classify_key, KeyType};
use crate::data::osm::RawElement;
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm_file, OsmElements};
use crate::etl::{output_path, with_progress, write_report, Etl};
use crate::UserConfig;

pub const ETL_NAME: &str = "audit";
pub const OUTPUT_SUFFIX: &str = ".audit.json";

/// Number of occurrences of every element name in the file.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagFrequency(pub BTreeMap<String, usize>);

impl TagFrequency {
    fn add(&mut self, name: &str, count: usize) {
        if count > 0 {
            *self.0.entry(name.to_string()).or_insert(0) += count;
        }
    }

    pub fn observe(&mut self, element: &RawElement) {
        self.add(element.kind.as_str(), 1);
        self.add("tag", element.tags.len());
        self.add("nd", element.node_refs.len());
        for child in &element.other_children {
            self.add(child, 1);
        }
    }

    pub fn merge(&mut self, counts: &BTreeMap<String, usize>) {
        for (name, count) in counts {
            self.add(name, *count);
        }
    }
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyTypeCounts {
    pub lower: usize,
    pub lower_colon: usize,
    pub problemchars: usize,
    pub other: usize,
}

impl KeyTypeCounts {
    pub fn observe(&mut self, element: &RawElement) {
        for tag in &element.tags {
            let slot = match classify_key(&tag.key) {
                KeyType::Lower => &mut self.lower,
                KeyType::LowerColon => &mut self.lower_colon,
                KeyType::ProblemChars => &mut self.problemchars,
                KeyType::Other => &mut self.other,
            };
            *slot += 1;
        }
    }
}

/// Unique `uid`s of everyone who touched an element.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Contributors(pub BTreeSet<String>);

impl Contributors {
    pub fn observe(&mut self, element: &RawElement) {
        if let Some(uid) = element.attribute("uid") {
            self.0.insert(uid.to_string());
        }
    }
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub unique_users: usize,
    pub top_level_tags: TagFrequency,
    pub tag_types: KeyTypeCounts,
    pub contributors: Contributors,
}

impl AuditReport {
    pub fn from_elements<R: BufRead>(elements: &mut OsmElements<R>, show_progress: bool) -> Result<Self> {
        let mut report = AuditReport::default();
        for element in with_progress(elements.by_ref(), show_progress) {
            let element = element?;
            report.top_level_tags.observe(&element);
            report.tag_types.observe(&element);
            report.contributors.observe(&element);
        }
        report.top_level_tags.merge(elements.other_elements());
        report.unique_users = report.contributors.0.len();
        Ok(report)
    }
}

/// Dataset overview used to check the cleaning rules against the data.
pub struct AuditEtl<'a> {
    config: &'a UserConfig,
}

impl AuditEtl<'_> {
    pub fn new(config: &UserConfig) -> AuditEtl {
        AuditEtl {
            config
        }
    }
}

impl Etl for AuditEtl<'_> {
    type Input = OsmElements<Box<dyn BufRead>>;
    type Output = AuditReport;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn extract(&mut self) -> Result<Self::Input> {
        open_osm_file(Path::new(&self.config.data_path))
    }

    fn transform(&mut self, mut input: Self::Input) -> Result<Self::Output> {
        AuditReport::from_elements(&mut input, self.config.show_progress)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let path = output_path(dir, Path::new(&self.config.data_path), OUTPUT_SUFFIX)?;
        write_report(&path, &output)?;
        info!(
            etl_name = ETL_NAME,
            unique_users = output.unique_users,
            lower = output.tag_types.lower,
            lower_colon = output.tag_types.lower_colon,
            problemchars = output.tag_types.problemchars,
            other = output.tag_types.other;
            "Audit report written"
        );
        Ok(())
    }
}
