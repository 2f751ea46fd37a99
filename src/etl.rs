pub mod audit;
pub mod audit_postcodes;
pub mod clean;
pub mod parse_osm;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Serialize;

use crate::errors::Result;


pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn extract(&mut self) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");

        info!(etl_name = self.etl_name(); "Extracting");
        let input = match self.extract() {
            Ok(input) => Ok(input),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Extraction failed with error");
                Err(err)
            },
        }?;

        info!(etl_name = self.etl_name(); "Transforming");
        let output = match self.transform(input) {
            Ok(output) => Ok(output),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Transformation failed with error");
                Err(err)
            },
        }?;

        info!(etl_name = self.etl_name(); "Loading");
        match self.load(dir, output) {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Loading failed with error");
                Err(err)
            },
        }?;

        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}

/// `<dir>/<input file name><suffix>`, e.g. `output/cairo_egypt.osm.json`.
pub fn output_path(dir: &Path, input: &Path, suffix: &str) -> Result<PathBuf> {
    let input_fname = input.file_name()
        .and_then(|name| name.to_str())
        .ok_or("Could not get input file name")?;
    Ok(dir.join(format!("{}{}", input_fname, suffix)))
}

/// Wraps the element stream in a progress bar on demand.
pub fn with_progress<'a, I>(iter: I, show: bool) -> Box<dyn Iterator<Item = I::Item> + 'a>
where
    I: Iterator + 'a,
{
    if show {
        Box::new(tqdm::tqdm(iter))
    } else {
        Box::new(iter)
    }
}

pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
