//! nginx-rtmp `stat` document parsing
//!
//! Only `rtmp/server/application/{name, live/nclients}` is of interest. The
//! per-stream `nclients` nested below `live/stream` is ignored.

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use tracing::warn;

use crate::errors::{StatError, StatResult};

const APPLICATION_PATH: [&str; 3] = ["rtmp", "server", "application"];
const NAME_PATH: [&str; 4] = ["rtmp", "server", "application", "name"];
const NCLIENTS_PATH: [&str; 5] = ["rtmp", "server", "application", "live", "nclients"];

#[derive(Debug, Default)]
struct ApplicationStat {
    name: Option<String>,
    nclients: Option<String>,
}

fn at(stack: &[String], path: &[&str]) -> bool {
    stack.len() == path.len() && stack.iter().zip(path).all(|(a, b)| a == b)
}

/// Live client count of the first application named `application`.
///
/// An application whose `nclients` is missing or not an integer is skipped in
/// favour of a later one with the same name.
pub fn parse_nclients(xml: &str, application: &str) -> StatResult<u64> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<ApplicationStat> = None;
    // Text of the innermost open element, pieced together from text, CDATA
    // and entity reference events
    let mut text = String::new();
    let mut last_error: Option<StatError> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                stack.push(name);
                text.clear();
                if at(&stack, &APPLICATION_PATH) {
                    current = Some(ApplicationStat::default());
                }
            }
            Event::Text(e) => text.push_str(&e.decode().map_err(quick_xml::Error::from)?),
            Event::CData(e) => text.push_str(&e.decode().map_err(quick_xml::Error::from)?),
            Event::GeneralRef(e) => {
                if let Some(ch) = e.resolve_char_ref()? {
                    text.push(ch);
                } else {
                    let entity = e.decode().map_err(quick_xml::Error::from)?;
                    match resolve_predefined_entity(&entity) {
                        Some(resolved) => text.push_str(resolved),
                        None => {
                            text.push('&');
                            text.push_str(&entity);
                            text.push(';');
                        }
                    }
                }
            }
            Event::End(_) => {
                if let Some(stat) = current.as_mut() {
                    if at(&stack, &NAME_PATH) {
                        stat.name = Some(text.trim().to_string());
                    } else if at(&stack, &NCLIENTS_PATH) {
                        stat.nclients = Some(text.trim().to_string());
                    }
                }
                if at(&stack, &APPLICATION_PATH) {
                    if let Some(stat) = current.take() {
                        if stat.name.as_deref() == Some(application) {
                            match check_application(stat, application) {
                                Ok(nclients) => return Ok(nclients),
                                Err(e) => {
                                    warn!("Skipping application {}: {}", application, e);
                                    last_error = Some(e);
                                }
                            }
                        }
                    }
                }
                stack.pop();
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(last_error.unwrap_or_else(|| StatError::application_not_found(application)))
}

fn check_application(stat: ApplicationStat, application: &str) -> StatResult<u64> {
    let value = stat.nclients.unwrap_or_default();
    value
        .trim()
        .parse()
        .map_err(|_| StatError::InvalidClientCount {
            application: application.to_string(),
            value,
        })
}
