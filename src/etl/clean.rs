use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::cleaning::reference::ReferenceTables;
use crate::cleaning::shape::ElementShaper;
use crate::data::document::Document;
use crate::data::osm::RawElement;
use crate::errors::Result;
use crate::etl::parse_osm::open_osm_file;
use crate::etl::{output_path, with_progress, Etl};
use crate::UserConfig;

pub const ETL_NAME: &str = "clean";
pub const OUTPUT_SUFFIX: &str = ".json";

/// What to do with an element whose city has no entry in the reference tables.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    #[default]
    Abort,
    Skip,
}

type ElementStream = Box<dyn Iterator<Item = Result<RawElement>>>;

/// Documents shaped from an element stream, produced lazily.
pub struct Documents {
    elements: ElementStream,
    shaper: ElementShaper,
    on_lookup_failure: LookupFailurePolicy,
    skipped: usize,
}

impl Documents {
    pub fn new(elements: ElementStream, shaper: ElementShaper, on_lookup_failure: LookupFailurePolicy) -> Self {
        Documents {
            elements,
            shaper,
            on_lookup_failure,
            skipped: 0,
        }
    }

    /// Elements dropped so far because of a failed lookup.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for Documents {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let element = match self.elements.next()? {
                Ok(element) => element,
                Err(err) => return Some(Err(err)),
            };
            match self.shaper.shape(&element) {
                Ok(Some(doc)) => return Some(Ok(doc)),
                Ok(None) => (),
                Err(err) if err.is_key_not_found() && self.on_lookup_failure == LookupFailurePolicy::Skip => {
                    warn!(
                        etl_name = ETL_NAME,
                        element = element.kind.as_str(),
                        id = element.attribute("id").unwrap_or(""),
                        err = err.message.as_str();
                        "Skipping element"
                    );
                    self.skipped += 1;
                },
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Writes one JSON document per line, or indented documents in pretty mode.
pub fn write_documents<W: Write>(writer: &mut W, documents: &mut Documents, pretty: bool) -> Result<usize> {
    let mut written = 0;
    for doc in documents {
        let doc = doc?;
        if pretty {
            serde_json::to_writer_pretty(&mut *writer, &doc)?;
        } else {
            serde_json::to_writer(&mut *writer, &doc)?;
        }
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Converts nodes and ways of the .osm file into documents ready for bulk loading.
pub struct CleanEtl<'a> {
    config: &'a UserConfig,
    shaper: Option<ElementShaper>,
}

impl<'a> CleanEtl<'a> {
    pub fn new(config: &'a UserConfig, tables: &ReferenceTables) -> Self {
        CleanEtl {
            config,
            shaper: Some(ElementShaper::from_tables(tables, config.city_ordering)),
        }
    }
}

impl Etl for CleanEtl<'_> {
    type Input = ElementStream;
    type Output = Documents;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn extract(&mut self) -> Result<Self::Input> {
        let elements = open_osm_file(Path::new(&self.config.data_path))?;
        Ok(with_progress(elements, self.config.show_progress))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let shaper = self.shaper.take().ok_or("Clean job can only run once")?;
        Ok(Documents::new(input, shaper, self.config.on_lookup_failure))
    }

    fn load(&mut self, dir: &Path, mut output: Self::Output) -> Result<()> {
        let path = output_path(dir, Path::new(&self.config.data_path), OUTPUT_SUFFIX)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        let written = write_documents(&mut writer, &mut output, self.config.pretty)?;
        info!(
            etl_name = ETL_NAME,
            written = written,
            skipped = output.skipped();
            "Documents written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use quick_xml::reader::Reader;
    use serde_json::json;

    use crate::cleaning::shape::CityOrdering;
    use crate::errors::ErrorKind;
    use crate::etl::parse_osm::tests::{sample_elements, SAMPLE};
    use crate::etl::parse_osm::OsmElements;

    use super::*;

    fn shaper() -> ElementShaper {
        ElementShaper::from_tables(&ReferenceTables::cairo(), CityOrdering::CityFirst)
    }

    fn shape_all<R: std::io::BufRead + 'static>(
        elements: OsmElements<R>,
        on_lookup_failure: LookupFailurePolicy,
    ) -> Result<Vec<Document>> {
        Documents::new(Box::new(elements), shaper(), on_lookup_failure).collect()
    }

    const UNKNOWN_CITY: &str = r#"<osm>
  <node id="1" lat="30.0" lon="31.0"><tag k="addr:city" v="Alexandria"/></node>
  <node id="2" lat="30.1" lon="31.1"><tag k="addr:city" v="cairo"/></node>
</osm>"#;

    #[test]
    fn shapes_nodes_and_ways_but_not_relations() {
        let docs = shape_all(sample_elements(), LookupFailurePolicy::Abort).unwrap();
        assert_eq!(docs.len(), 3);
        let value = serde_json::to_value(&docs[0]).unwrap();
        assert_eq!(value["address"], json!({"city": "Giza", "postcode": "12511"}));
        assert_eq!(value["id"], "1");
        assert_eq!(docs[2].node_refs, Some(vec!["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn lookup_failure_aborts_by_default() {
        let elements = OsmElements::new(Reader::from_reader(UNKNOWN_CITY.as_bytes()));
        let err = shape_all(elements, LookupFailurePolicy::Abort).unwrap_err();
        assert_eq!(err.kind, ErrorKind::KeyNotFound);
    }

    #[test]
    fn lookup_failure_can_skip_the_element() {
        let elements = OsmElements::new(Reader::from_reader(UNKNOWN_CITY.as_bytes()));
        let mut documents = Documents::new(Box::new(elements), shaper(), LookupFailurePolicy::Skip);
        let docs: Vec<Document> = documents.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].address.get("city").map(String::as_str), Some("Cairo"));
        assert_eq!(documents.skipped(), 1);
    }

    #[test]
    fn one_document_per_line() {
        let mut documents = Documents::new(Box::new(sample_elements()), shaper(), LookupFailurePolicy::Abort);
        let mut out = Vec::new();
        let written = write_documents(&mut out, &mut documents, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(written, 3);
        assert_eq!(lines.len(), 3);
        let way: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(way["type"], "way");
        assert_eq!(way["name"], "Tom & Jerry St");
    }

    #[test]
    fn pretty_output_holds_the_same_documents() {
        let mut documents = Documents::new(Box::new(sample_elements()), shaper(), LookupFailurePolicy::Abort);
        let mut out = Vec::new();
        write_documents(&mut out, &mut documents, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let docs: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&text)
            .into_iter::<serde_json::Value>()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["pos"], json!([30.0, 31.0]));
        assert!(text.lines().count() > 3);
    }

    #[test]
    fn clean_job_writes_next_to_the_other_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sample.osm");
        fs::write(&input, SAMPLE).unwrap();
        let config = UserConfig::for_input(input.to_str().unwrap(), dir.path().to_str().unwrap());

        let mut etl = CleanEtl::new(&config, &ReferenceTables::cairo());
        etl.process(dir.path()).unwrap();
        assert!(etl.process(dir.path()).is_err());

        let written = fs::read_to_string(dir.path().join("sample.osm.json")).unwrap();
        assert_eq!(written.lines().count(), 3);
        let first: serde_json::Value = serde_json::from_str(written.lines().next().unwrap()).unwrap();
        assert_eq!(first["created"]["user"], "alice");
        assert_eq!(first["amenity"], "cafe");
    }
}
