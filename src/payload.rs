//! Structural extraction from raw update-XML payloads.
//!
//! An update payload is a small XML document (typically rooted at
//! `<record_update>`) whose first child element names the target table;
//! script fields live one level below that. Extraction never fails for a
//! missing element; only ill-formed XML is an error, surfaced to the
//! caller as [`PayloadError::Malformed`].

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Payload-level extraction error. A missing element is `Ok(None)`, not an
/// error; this only fires when the document itself cannot be parsed.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not well-formed XML: {0}")]
    Malformed(#[from] quick_xml::Error),
}

/// Target table and record id derived from a payload without prior
/// knowledge of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRef {
    pub table: Option<String>,
    pub sys_id: Option<String>,
}

/// Return the text content (including CDATA) of the element at
/// `root → <target_table> → <field_name>`, or `None` if the path does not
/// resolve.
pub fn extract_field(
    target_table: &str,
    field_name: &str,
    raw_xml: &str,
) -> Result<Option<String>, PayloadError> {
    if raw_xml.trim().is_empty() {
        return Ok(None);
    }

    let mut reader = Reader::from_str(raw_xml);
    let mut depth = 0usize;
    let mut in_table = false;
    let mut in_field = false;
    let mut found = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && e.local_name().as_ref() == target_table.as_bytes() {
                    in_table = true;
                } else if depth == 3 && in_table && e.local_name().as_ref() == field_name.as_bytes()
                {
                    in_field = true;
                    found = true;
                }
            }
            Event::Empty(e) => {
                // Self-closing field element: present, but empty.
                if depth == 2 && in_table && e.local_name().as_ref() == field_name.as_bytes() {
                    return Ok(Some(String::new()));
                }
            }
            Event::End(_) => {
                if in_field && depth == 3 {
                    in_field = false;
                }
                if in_table && depth == 2 {
                    in_table = false;
                }
                depth = depth.saturating_sub(1);
                if found && !in_field {
                    break;
                }
            }
            Event::Text(t) if in_field => {
                text.push_str(&t.unescape().map_err(quick_xml::Error::from)?);
            }
            Event::CData(c) if in_field => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found.then_some(text))
}

/// Derive the target table/id from a payload: the first child element of
/// the document root is the table, and that element's `<sys_id>` child is
/// the record id. Either may be absent.
///
/// Parsing stops as soon as both are known, so garbage in a trailing part
/// of the payload surfaces later, during field extraction.
pub fn extract_target(raw_xml: &str) -> Result<TargetRef, PayloadError> {
    if raw_xml.trim().is_empty() {
        return Ok(TargetRef::default());
    }

    let mut reader = Reader::from_str(raw_xml);
    let mut depth = 0usize;
    let mut top_children = 0usize;
    let mut in_sys_id = false;
    let mut sys_id_text = String::new();
    let mut target = TargetRef::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    top_children += 1;
                    if top_children == 1 {
                        target.table =
                            Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                    }
                } else if depth == 3
                    && top_children == 1
                    && target.sys_id.is_none()
                    && e.local_name().as_ref() == b"sys_id"
                {
                    in_sys_id = true;
                }
            }
            Event::Empty(e) => {
                if depth == 1 {
                    top_children += 1;
                    if top_children == 1 {
                        target.table =
                            Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                    }
                }
            }
            Event::Text(t) if in_sys_id => {
                sys_id_text.push_str(&t.unescape().map_err(quick_xml::Error::from)?);
            }
            Event::CData(c) if in_sys_id => {
                sys_id_text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                if in_sys_id && depth == 3 {
                    in_sys_id = false;
                    target.sys_id = Some(std::mem::take(&mut sys_id_text));
                }
                depth = depth.saturating_sub(1);
                if target.sys_id.is_some() {
                    break;
                }
                if depth == 1 && top_children >= 1 {
                    // Left the first child element without finding a sys_id.
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(target)
}
