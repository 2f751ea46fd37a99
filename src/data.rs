pub mod document;
pub mod osm;
