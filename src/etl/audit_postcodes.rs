use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::data::osm::{ElementKind, RawElement};
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm_file, OsmElements};
use crate::etl::{output_path, with_progress, write_report, Etl};
use crate::UserConfig;

pub const ETL_NAME: &str = "audit_postcodes";
pub const OUTPUT_SUFFIX: &str = ".postcodes.json";

/// Raw city names and the postcodes seen together with them, lower-cased. This is what the
/// alias table and the postal gold list are built from.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct PostcodeAudit {
    pub postal_codes: BTreeMap<String, BTreeSet<String>>,
    pub cities: BTreeSet<String>,
}

impl PostcodeAudit {
    pub fn observe(&mut self, element: &RawElement) {
        if element.kind == ElementKind::Relation {
            return;
        }

        let mut city = None;
        let mut code = None;
        for tag in &element.tags {
            match tag.key.as_str() {
                "addr:postcode" => code = Some(tag.value.to_lowercase()),
                "addr:city" => city = Some(tag.value.to_lowercase()),
                _ => (),
            }
        }

        if let Some(city) = city {
            if let Some(code) = code {
                self.postal_codes.entry(city.clone()).or_default().insert(code);
            }
            self.cities.insert(city);
        }
    }

    pub fn from_elements<R: BufRead>(elements: &mut OsmElements<R>, show_progress: bool) -> Result<Self> {
        let mut audit = PostcodeAudit::default();
        for element in with_progress(elements.by_ref(), show_progress) {
            audit.observe(&element?);
        }
        Ok(audit)
    }
}

pub struct PostcodeAuditEtl<'a> {
    config: &'a UserConfig,
}

impl PostcodeAuditEtl<'_> {
    pub fn new(config: &UserConfig) -> PostcodeAuditEtl {
        PostcodeAuditEtl {
            config
        }
    }
}

impl Etl for PostcodeAuditEtl<'_> {
    type Input = OsmElements<Box<dyn BufRead>>;
    type Output = PostcodeAudit;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn extract(&mut self) -> Result<Self::Input> {
        open_osm_file(Path::new(&self.config.data_path))
    }

    fn transform(&mut self, mut input: Self::Input) -> Result<Self::Output> {
        PostcodeAudit::from_elements(&mut input, self.config.show_progress)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let path = output_path(dir, Path::new(&self.config.data_path), OUTPUT_SUFFIX)?;
        write_report(&path, &output)?;
        info!(
            etl_name = ETL_NAME,
            cities = output.cities.len(),
            cities_with_postcodes = output.postal_codes.len();
            "Postcode audit written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_cities_and_their_postcodes() {
        let mut audit = PostcodeAudit::default();
        audit.observe(&RawElement::new(ElementKind::Node)
            .with_tag("addr:city", "Giza")
            .with_tag("addr:postcode", "12511"));
        audit.observe(&RawElement::new(ElementKind::Way)
            .with_tag("addr:postcode", "12513")
            .with_tag("addr:city", "giza"));
        audit.observe(&RawElement::new(ElementKind::Node).with_tag("addr:city", "القاهرة"));
        audit.observe(&RawElement::new(ElementKind::Node).with_tag("addr:postcode", "11311"));

        assert_eq!(
            audit.cities,
            BTreeSet::from(["giza".to_string(), "القاهرة".to_string()])
        );
        assert_eq!(audit.postal_codes.len(), 1);
        assert_eq!(
            audit.postal_codes["giza"],
            BTreeSet::from(["12511".to_string(), "12513".to_string()])
        );
    }

    #[test]
    fn relations_are_ignored() {
        let mut audit = PostcodeAudit::default();
        audit.observe(&RawElement::new(ElementKind::Relation).with_tag("addr:city", "Cairo"));
        assert!(audit.cities.is_empty());
    }

    #[test]
    fn audit_of_sample() {
        let audit = PostcodeAudit::from_elements(
            &mut crate::etl::parse_osm::tests::sample_elements(),
            false,
        ).unwrap();
        assert_eq!(audit.cities, BTreeSet::from(["giza".to_string()]));
        assert!(audit.postal_codes["giza"].contains("12511"));
    }
}
