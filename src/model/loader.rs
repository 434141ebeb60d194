//! Indicator metadata loader.
//!
//! Reads the indicator XML document into an [`IndicatorIndex`]. The expected
//! shape, per indicator:
//!
//! ```xml
//! <Indicator code="101" type="CALCULATED">
//!     <IndicatorCalculationParameter expressionSource="i10 + i11" />
//! </Indicator>
//! <Indicator code="10" type="PROGRESSIVE" />
//! ```
//!
//! A malformed document is fatal: there is no safe partial index, so the
//! loader aborts before any query unit is processed.

use std::fs;
use std::path::Path;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::{Indicator, IndicatorIndex, IndicatorKind};

/// Errors that can occur while loading indicator metadata.
#[derive(Debug, Error)]
pub enum LoadError {
    /// IO error reading the metadata file
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// XML syntax error
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        source: quick_xml::Error,
    },

    /// Malformed attribute list
    #[error("malformed attribute in <{element}> at byte {position}: {source}")]
    Attr {
        element: String,
        position: u64,
        source: AttrError,
    },

    /// Required attribute missing
    #[error("<{element}> at byte {position} is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: String,
        position: u64,
    },

    /// Unrecognized indicator type string
    #[error("indicator '{code}' has unknown type '{value}'")]
    UnknownKind { code: String, value: String },

    /// A non-calculated indicator carries a formula
    #[error("indicator '{code}' is not CALCULATED but has an expression")]
    StrayExpression { code: String },

    /// An expression element appeared outside an <Indicator>
    #[error("<IndicatorCalculationParameter> outside of <Indicator> at byte {position}")]
    OrphanExpression { position: u64 },
}

/// Result type for metadata loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Load the indicator index from an XML metadata file.
pub fn load_indicators(path: &Path) -> LoadResult<IndicatorIndex> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_indicators(&text)
}

/// Parse indicator metadata from an XML string.
pub fn parse_indicators(xml: &str) -> LoadResult<IndicatorIndex> {
    let mut reader = Reader::from_str(xml);
    let mut index = IndicatorIndex::new();

    // The indicator currently open between <Indicator> and </Indicator>.
    let mut current: Option<Indicator> = None;

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Indicator" => {
                if let Some(done) = current.take() {
                    // Unclosed <Indicator> followed by a new one; keep the
                    // finished definition rather than dropping it.
                    index.insert(done);
                }
                current = Some(indicator_from_attrs(&e, position)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Indicator" => {
                index.insert(indicator_from_attrs(&e, position)?);
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref() == b"IndicatorCalculationParameter" =>
            {
                let expr = attr_value(&e, "expressionSource", position)?;
                match current.as_mut() {
                    Some(ind) => {
                        if let Some(expr) = expr {
                            if ind.kind != IndicatorKind::Calculated {
                                return Err(LoadError::StrayExpression {
                                    code: ind.code.clone(),
                                });
                            }
                            ind.expression = Some(expr);
                        }
                    }
                    None => return Err(LoadError::OrphanExpression { position }),
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Indicator" => {
                if let Some(done) = current.take() {
                    index.insert(done);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => return Err(LoadError::Xml { position, source }),
        }
    }

    if let Some(done) = current.take() {
        index.insert(done);
    }

    Ok(index)
}

/// Build an [`Indicator`] from the attributes of an `<Indicator>` element.
fn indicator_from_attrs(e: &BytesStart, position: u64) -> LoadResult<Indicator> {
    let code = attr_value(e, "code", position)?.ok_or_else(|| LoadError::MissingAttribute {
        element: "Indicator".to_string(),
        attribute: "code".to_string(),
        position,
    })?;
    let kind_raw = attr_value(e, "type", position)?.ok_or_else(|| LoadError::MissingAttribute {
        element: "Indicator".to_string(),
        attribute: "type".to_string(),
        position,
    })?;
    let kind = IndicatorKind::parse(&kind_raw).ok_or_else(|| LoadError::UnknownKind {
        code: code.clone(),
        value: kind_raw,
    })?;

    Ok(Indicator {
        code,
        kind,
        expression: None,
    })
}

/// Fetch one attribute's unescaped value, if present.
fn attr_value(e: &BytesStart, name: &str, position: u64) -> LoadResult<Option<String>> {
    let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    for attr in e.attributes() {
        let attr = attr.map_err(|source| LoadError::Attr {
            element: element.clone(),
            position,
            source,
        })?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|source| LoadError::Xml { position, source })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
