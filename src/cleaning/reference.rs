use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Error, Result};

/// City names already in their canonical form.
const EXPECTED_CITIES: [&str; 4] = ["Cairo", "New Cairo", "Giza", "Orabi City"];

/// Raw `addr:city` spellings seen in the Cairo extract and their canonical English name.
const CITY_ALIASES: [(&str, &str); 24] = [
    ("مدينة 6 أكتوبر - الجيزة", "6th Of October City"),
    ("العباسية القاهرة", "Al - Abbasia"),
    ("6th of October", "6th Of October City"),
    ("قليوب المحطة", "Qaliob"),
    ("هرم", "Al - Haram"),
    ("القاهرة", "Cairo"),
    ("cairo", "Cairo"),
    ("Cairo Governorate", "Cairo"),
    ("Al Manteqah Al Oula CAIRO", "Cairo"),
    ("Maadi, Cairo", "Maadi"),
    ("مدينة 6 أكتوبر - القاهرة - مصر", "6th Of October City"),
    ("6 october", "6th Of October City"),
    ("مدينة 6 أكتوبر", "6th Of October City"),
    ("new cairo", "New Cairo"),
    ("مدينة 6 أكتوبر الحى المتميز داخل جامعة مصر للعلوم والتكنولوجيا", "6th Of October City"),
    ("قويسنا", "Quweisna"),
    ("Gizeh", "Giza"),
    ("حى النسايم", "Al - Nasaim District"),
    ("الجيزة", "Giza"),
    ("مدينة العبور", "Al - Obour City"),
    ("مدينة نصر القاهرة", "Nasr City"),
    ("giza", "Giza"),
    ("مدينة الشروق", "Al - Shrouk City"),
    ("orabi city", "Orabi City"),
];

const OCTOBER_CITY_CODES: [u32; 9] = [12573, 12563, 12564, 12566, 12568, 12575, 12582, 12585, 12586];
const GIZA_CODES: [u32; 11] = [12655, 12511, 12521, 12611, 12652, 12651, 12516, 12654, 12513, 12514, 12515];
const HARAM_CODES: [u32; 7] = [12557, 12555, 12944, 12518, 12561, 12556, 12111];

/// Gold list entry: one postal code or an inclusive range of them.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CodeSpan {
    Code(u32),
    Range { first: u32, last: u32 },
}

impl CodeSpan {
    fn codes(&self) -> impl Iterator<Item = u32> {
        match *self {
            CodeSpan::Code(code) => code..=code,
            CodeSpan::Range { first, last } => first..=last,
        }
    }
}

/// Reference data for city name and postal code cleaning.
#[derive(Deserialize, Debug, Clone)]
pub struct ReferenceTables {
    pub expected_cities: Vec<String>,
    pub city_aliases: HashMap<String, String>,
    pub postal_codes: HashMap<String, Vec<CodeSpan>>,
}

impl ReferenceTables {
    /// Tables collected for the Cairo, Egypt extract.
    pub fn cairo() -> Self {
        let postal_codes = HashMap::from([
            ("Cairo".to_string(), vec![CodeSpan::Range { first: 11311, last: 11688 }]),
            ("Al - Abbasia".to_string(), vec![CodeSpan::Code(11381)]),
            ("6th Of October City".to_string(), OCTOBER_CITY_CODES.iter().map(|c| CodeSpan::Code(*c)).collect()),
            ("Giza".to_string(), GIZA_CODES.iter().map(|c| CodeSpan::Code(*c)).collect()),
            ("Al - Haram".to_string(), HARAM_CODES.iter().map(|c| CodeSpan::Code(*c)).collect()),
        ]);

        ReferenceTables {
            expected_cities: EXPECTED_CITIES.iter().map(|c| c.to_string()).collect(),
            city_aliases: CITY_ALIASES.iter()
                .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
                .collect(),
            postal_codes,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn city_resolver(&self) -> CityNameResolver {
        CityNameResolver::new(
            self.expected_cities.iter().cloned().collect(),
            self.city_aliases.clone(),
        )
    }

    pub fn postal_code_validator(&self) -> PostalCodeValidator {
        PostalCodeValidator::new(
            self.postal_codes.iter()
                .map(|(city, spans)| (city.clone(), spans.iter().flat_map(CodeSpan::codes).collect()))
                .collect()
        )
    }
}

/// Maps raw city names onto canonical English city names.
#[derive(Debug, Clone)]
pub struct CityNameResolver {
    expected: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl CityNameResolver {
    pub fn new(expected: HashSet<String>, aliases: HashMap<String, String>) -> Self {
        CityNameResolver { expected, aliases }
    }

    /// Matching is exact; no case folding or trimming happens here.
    pub fn resolve<'a>(&'a self, raw: &'a str) -> Result<&'a str> {
        if self.expected.contains(raw) {
            return Ok(raw);
        }
        self.aliases.get(raw)
            .map(|canonical| canonical.as_str())
            .ok_or_else(|| Error::key_not_found("city alias table", raw))
    }
}

/// Checks postal codes against the gold list of a canonical city.
#[derive(Debug, Clone)]
pub struct PostalCodeValidator {
    gold: HashMap<String, BTreeSet<u32>>,
}

impl PostalCodeValidator {
    pub const CODE_LENGTH: usize = 5;

    pub fn new(gold: HashMap<String, BTreeSet<u32>>) -> Self {
        PostalCodeValidator { gold }
    }

    pub fn is_valid(&self, city: &str, code: &str) -> Result<bool> {
        if code.chars().count() != Self::CODE_LENGTH {
            return Ok(false);
        }
        let codes = self.gold.get(city)
            .ok_or_else(|| Error::key_not_found("postal gold list", city))?;
        Ok(decimal_value(code).map_or(false, |value| codes.contains(&value)))
    }
}

/// Numeric value of a string of ASCII, Arabic-Indic or Extended Arabic-Indic digits.
fn decimal_value(code: &str) -> Option<u32> {
    code.chars().try_fold(0u32, |acc, c| {
        let digit = match c {
            '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
            '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
            _ => c.to_digit(10)?,
        };
        acc.checked_mul(10)?.checked_add(digit)
    })
}
