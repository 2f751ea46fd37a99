use log::trace;
use serde::Deserialize;

use crate::data::document::Document;
use crate::data::osm::{ElementKind, RawElement};
use crate::errors::{Error, ErrorKind, Result};

use super::reference::{CityNameResolver, PostalCodeValidator, ReferenceTables};
use super::rules::{matching_rule, other_name_language, TagAction, ADDRESS_PREFIX};

const CITY_KEY: &str = "addr:city";

/// When the city a postcode is validated against becomes known.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CityOrdering {
    /// The element's `addr:city` is resolved before any tag is processed.
    #[default]
    CityFirst,
    /// The city is only known once its tag has been passed, so a postcode listed before
    /// `addr:city` is dropped.
    DocumentOrder,
}

/// Turns nodes and ways into documents.
pub struct ElementShaper {
    resolver: CityNameResolver,
    validator: PostalCodeValidator,
    ordering: CityOrdering,
}

impl ElementShaper {
    pub fn new(resolver: CityNameResolver, validator: PostalCodeValidator, ordering: CityOrdering) -> Self {
        ElementShaper {
            resolver,
            validator,
            ordering,
        }
    }

    pub fn from_tables(tables: &ReferenceTables, ordering: CityOrdering) -> Self {
        ElementShaper::new(tables.city_resolver(), tables.postal_code_validator(), ordering)
    }

    /// Returns `None` for relations.
    pub fn shape(&self, element: &RawElement) -> Result<Option<Document>> {
        if element.kind == ElementKind::Relation {
            return Ok(None);
        }

        let mut doc = Document::new(element.kind);

        for (key, value) in &element.attributes {
            if doc.created.set(key, value) {
                continue;
            }
            match key.as_str() {
                "lat" => doc.pos[0] = parse_coordinate(key, value)?,
                "lon" => doc.pos[1] = parse_coordinate(key, value)?,
                _ => doc.set_field(key, value),
            }
        }

        let mut city: Option<&str> = match self.ordering {
            CityOrdering::CityFirst => self.prescan_city(element)?,
            CityOrdering::DocumentOrder => None,
        };

        for tag in &element.tags {
            let rule = matching_rule(tag);
            match rule.action {
                TagAction::Discard => trace!(rule = rule.name, key = tag.key.as_str(); "Tag dropped"),
                TagAction::OtherName => {
                    if let Some(language) = other_name_language(&tag.key) {
                        doc.other_names.insert(language.to_string(), tag.value.clone());
                    }
                },
                TagAction::Address => {
                    let field = &tag.key[ADDRESS_PREFIX.len()..];
                    match field {
                        "city" => {
                            let resolved = self.resolver.resolve(&tag.value)?;
                            doc.address.insert(field.to_string(), resolved.to_string());
                            city = Some(resolved);
                        },
                        "postcode" => {
                            if let Some(city) = city {
                                if self.validator.is_valid(city, &tag.value)? {
                                    doc.address.insert(field.to_string(), tag.value.clone());
                                }
                            }
                        },
                        _ => {
                            doc.address.insert(field.to_string(), tag.value.clone());
                        },
                    }
                },
                TagAction::Scalar => doc.set_field(&tag.key, &tag.value),
            }
        }

        if element.kind == ElementKind::Way {
            doc.node_refs = Some(element.node_refs.clone());
        }

        Ok(Some(doc))
    }

    fn prescan_city<'a>(&'a self, element: &'a RawElement) -> Result<Option<&'a str>> {
        element.tags.iter()
            .find(|tag| tag.key == CITY_KEY && matching_rule(tag).action == TagAction::Address)
            .map(|tag| self.resolver.resolve(&tag.value))
            .transpose()
    }
}

fn parse_coordinate(key: &str, value: &str) -> Result<f64> {
    value.parse::<f64>()
        .map_err(|err| Error::new(ErrorKind::Malformed, format!("bad {} {:?}: {}", key, value, err)))
}
