//! Reading and writing cost tables.
//!
//! Two formats are supported. The XML form declares the table mode on its
//! root and lists one element per rule:
//!
//! ```xml
//! <WeightSet type="directed">
//!   <Replacement from="v" to="u" cost="0.2"/>
//!   <Insertion of="e" cost="0.5"/>
//!   <Deletion of="h" cost="0.4"/>
//! </WeightSet>
//! ```
//!
//! The tabbed form is one `source<TAB>target<TAB>cost` rule per line.
//! Identity rules are never written.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::cost_table::{CostMode, CostTable};
use crate::error::{Result, WeightsError};
use crate::types::EPSILON;

const ROOT_TAG: &str = "WeightSet";
const REPLACEMENT_TAG: &str = "Replacement";
const INSERTION_TAG: &str = "Insertion";
const DELETION_TAG: &str = "Deletion";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WeightFormat {
    #[default]
    Xml,
    Tabbed,
}

impl fmt::Display for WeightFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightFormat::Xml => f.write_str("xml"),
            WeightFormat::Tabbed => f.write_str("tabbed"),
        }
    }
}

impl FromStr for WeightFormat {
    type Err = WeightsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xml" => Ok(WeightFormat::Xml),
            "tabbed" => Ok(WeightFormat::Tabbed),
            other => Err(WeightsError::UnrecognizedFormat(other.to_string())),
        }
    }
}

fn parse_cost(value: &str) -> Result<f64> {
    let cost: f64 = value
        .trim()
        .parse()
        .map_err(|source| WeightsError::InvalidCost {
            value: value.to_string(),
            source,
        })?;
    if !cost.is_finite() {
        return Err(WeightsError::NonFiniteCost(cost));
    }
    if cost < 0.0 {
        return Err(WeightsError::NegativeCost(cost));
    }
    Ok(cost)
}

fn tag_name(element: &BytesStart<'_>) -> String {
    let name = element.name();
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

fn required_attribute(element: &BytesStart<'_>, attribute: &str) -> Result<String> {
    let attr = element
        .try_get_attribute(attribute)
        .map_err(quick_xml::Error::from)?
        .ok_or_else(|| WeightsError::MissingAttribute {
            tag: tag_name(element),
            attribute: attribute.to_string(),
        })?;
    let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
    Ok(value.into_owned())
}

fn element_with(tag: &'static str, attributes: &[(&str, &str)]) -> BytesStart<'static> {
    let mut element = BytesStart::new(tag);
    for &attribute in attributes {
        element.push_attribute(attribute);
    }
    element
}

/// Reads one rule element into `(source, target, cost)`.
fn parse_rule(element: &BytesStart<'_>) -> Result<(String, String, f64)> {
    let (source, target) = match tag_name(element).as_str() {
        REPLACEMENT_TAG => (
            required_attribute(element, "from")?,
            required_attribute(element, "to")?,
        ),
        INSERTION_TAG => (EPSILON.to_string(), required_attribute(element, "of")?),
        DELETION_TAG => (required_attribute(element, "of")?, EPSILON.to_string()),
        other => {
            return Err(WeightsError::UnexpectedTag {
                found: other.to_string(),
                expected: [REPLACEMENT_TAG, INSERTION_TAG, DELETION_TAG].join(" or "),
            });
        }
    };
    let cost = parse_cost(&required_attribute(element, "cost")?)?;
    Ok((source, target, cost))
}

impl CostTable {
    /// Parses an XML weight set. The mode is taken from the root's `type`.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut table: Option<CostTable> = None;
        let mut depth = 0usize;
        loop {
            match reader.read_event()? {
                Event::Start(element) => {
                    match table.as_mut() {
                        None => table = Some(parse_root(&element)?),
                        Some(table) if depth == 1 => insert_rule(table, &element)?,
                        Some(_) => {}
                    }
                    depth += 1;
                }
                Event::Empty(element) => match table.as_mut() {
                    None => table = Some(parse_root(&element)?),
                    Some(table) if depth == 1 => insert_rule(table, &element)?,
                    Some(_) => {}
                },
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => {}
            }
        }

        table.ok_or_else(|| WeightsError::MissingTag {
            tag: ROOT_TAG.to_string(),
        })
    }

    /// Parses a tabbed weight list into a table of the given mode.
    pub fn from_tabbed_str(text: &str, mode: CostMode) -> Result<Self> {
        let mut table = CostTable::new(mode);
        table.extend_from_tabbed(text)?;
        Ok(table)
    }

    /// Adds the rules of a tabbed weight list to this table.
    pub fn extend_from_tabbed(&mut self, text: &str) -> Result<()> {
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [source, target, cost] = fields[..] else {
                return Err(WeightsError::MalformedLine {
                    line_number: index + 1,
                    line: line.to_string(),
                });
            };
            self.set(source, target, parse_cost(cost)?);
        }
        Ok(())
    }

    /// Serializes the stored non-identity entries as an XML weight set.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let root = element_with(ROOT_TAG, &[("type", self.mode().as_str())]);
        writer.write_event(Event::Start(root))?;

        for ((source, target), cost) in self.stored_entries() {
            if source == target {
                continue;
            }
            let cost = cost.to_string();
            let rule = if source == EPSILON {
                element_with(INSERTION_TAG, &[("of", target), ("cost", cost.as_str())])
            } else if target == EPSILON {
                element_with(DELETION_TAG, &[("of", source), ("cost", cost.as_str())])
            } else {
                let attributes = [("from", source), ("to", target), ("cost", cost.as_str())];
                element_with(REPLACEMENT_TAG, &attributes)
            };
            writer.write_event(Event::Empty(rule))?;
        }

        writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;
        let bytes = writer.into_inner();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Serializes the stored non-identity entries one per line.
    pub fn to_tabbed(&self) -> String {
        let mut out = String::new();
        for ((source, target), cost) in self.stored_entries() {
            if source == target {
                continue;
            }
            out.push_str(&format!("{source}\t{target}\t{cost}\n"));
        }
        out
    }

    pub fn serialize(&self, format: WeightFormat) -> Result<String> {
        match format {
            WeightFormat::Xml => self.to_xml(),
            WeightFormat::Tabbed => Ok(self.to_tabbed()),
        }
    }

    /// Loads a table from disk. Tabbed files carry no mode and load as directed.
    pub fn load_from_file<P: AsRef<Path>>(path: P, format: WeightFormat) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let table = match format {
            WeightFormat::Xml => CostTable::from_xml_str(&text)?,
            WeightFormat::Tabbed => CostTable::from_tabbed_str(&text, CostMode::Directed)?,
        };
        debug!(
            "Loaded {} weights ({}, {}) from {}",
            table.len(),
            format,
            table.mode(),
            path.display()
        );
        Ok(table)
    }

    /// Writes the table to disk and returns the bytes written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: WeightFormat) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let bytes = self.serialize(format)?.into_bytes();
        fs::write(path, &bytes)?;
        debug!(
            "Saved {} weights ({}) to {}",
            self.len(),
            format,
            path.display()
        );
        Ok(bytes)
    }
}

fn parse_root(element: &BytesStart<'_>) -> Result<CostTable> {
    let name = tag_name(element);
    if name != ROOT_TAG {
        return Err(WeightsError::UnexpectedTag {
            found: name,
            expected: ROOT_TAG.to_string(),
        });
    }
    let mode: CostMode = required_attribute(element, "type")?.parse()?;
    Ok(CostTable::new(mode))
}

fn insert_rule(table: &mut CostTable, element: &BytesStart<'_>) -> Result<()> {
    let (source, target, cost) = parse_rule(element)?;
    table.set(&source, &target, cost);
    Ok(())
}
