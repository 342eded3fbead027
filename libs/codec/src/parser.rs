//! Line parser.
//!
//! One call per newline-terminated frame. Field-level problems surface as
//! diagnostics on the [`ParseOutcome`]; only a line with no salvageable
//! content returns an error.
//!
//! With the schema catalog out of the core's scope, a wire key may carry a
//! shape hint suffix (`key:sample`, `key:message`, `key:dataset`,
//! `key:table`, `key:timeseries`, `key:event`). Unhinted keys parse as
//! scalar events, except that a first value token naming a condition level
//! (`NORMAL`/`WARNING`/`FAULT`/`UNAVAILABLE`) makes the line a condition
//! update. The hint is wire syntax only and is stripped from the stored
//! key.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use types::{Condition, ConditionLevel, ObservationKind, VALUE_KEY};

use crate::error::{ProtocolError, ProtocolResult};
use crate::escape::split_fields;
use crate::frame::{
    AssetBody, AssetCommand, ControlFrame, DataFrame, DeviceWire, ParseDiagnostic, ParseOutcome,
    ParsedFrame, WireObservation,
};

/// Shape hint carried on a wire key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeHint {
    None,
    Event,
    Sample,
    Message,
    DataSet,
    Table,
    TimeSeries,
}

/// Parse one line (without its trailing newline, though `\r`/`\n` are
/// tolerated and stripped).
pub fn parse_line(line: &str) -> ProtocolResult<ParseOutcome> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(ParseOutcome::empty());
    }
    if let Some(rest) = line.strip_prefix('*') {
        return parse_control(rest.trim());
    }

    let fields = split_fields(line);
    if fields.len() < 2 {
        return Err(ProtocolError::malformed(
            "data",
            "expected a timestamp and at least one field",
            line,
        ));
    }

    let mut diagnostics = Vec::new();
    let timestamp = parse_timestamp(&fields[0], &mut diagnostics);

    let command = fields[1].as_str();
    if command.len() > 2 && command.starts_with('@') && command.ends_with('@') {
        return match command {
            "@ASSET@" => parse_asset_upsert(line, timestamp, &fields, diagnostics),
            "@REMOVE_ASSET@" => parse_asset_remove(line, timestamp, &fields, diagnostics),
            "@REMOVE_ALL_ASSETS@" => parse_asset_remove_all(timestamp, &fields, diagnostics),
            "@DEVICE@" => parse_device(line, timestamp, &fields, diagnostics),
            _ => Err(ProtocolError::UnknownCommand {
                command: command.to_string(),
            }),
        };
    }

    parse_data(timestamp, &fields, diagnostics)
}

fn parse_control(rest: &str) -> ProtocolResult<ParseOutcome> {
    let mut tokens = rest.split_whitespace();
    match tokens.next() {
        Some(verb) if verb.eq_ignore_ascii_case("PING") => {
            Ok(ParseOutcome::clean(ParsedFrame::Control(ControlFrame::Ping)))
        }
        Some(verb) if verb.eq_ignore_ascii_case("PONG") => {
            let arg = tokens.next().ok_or_else(|| ProtocolError::MalformedControl {
                reason: "PONG is missing its timeout argument".to_string(),
            })?;
            let timeout_ms = arg.parse().map_err(|_| ProtocolError::MalformedControl {
                reason: format!("PONG timeout {arg:?} is not an integer"),
            })?;
            Ok(ParseOutcome::clean(ParsedFrame::Control(
                ControlFrame::Pong { timeout_ms },
            )))
        }
        Some(verb) => Err(ProtocolError::UnknownControlVerb {
            verb: verb.to_string(),
        }),
        None => Err(ProtocolError::MalformedControl {
            reason: "control frame with no verb".to_string(),
        }),
    }
}

fn parse_timestamp(
    token: &str,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Option<DateTime<Utc>> {
    if token.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&Utc));
    }
    // Adapters frequently omit the zone; treat naive timestamps as UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    diagnostics.push(ParseDiagnostic::new(
        0,
        format!("unparseable timestamp {token:?}, agent time will be used"),
    ));
    None
}

fn split_hint(raw: &str) -> (&str, ShapeHint) {
    if let Some((head, tail)) = raw.rsplit_once(':') {
        if head.is_empty() {
            return (raw, ShapeHint::None);
        }
        let hint = match tail.to_ascii_lowercase().as_str() {
            "event" => ShapeHint::Event,
            "sample" => ShapeHint::Sample,
            "message" => ShapeHint::Message,
            "dataset" => ShapeHint::DataSet,
            "table" => ShapeHint::Table,
            "timeseries" => ShapeHint::TimeSeries,
            _ => return (raw, ShapeHint::None),
        };
        return (head, hint);
    }
    (raw, ShapeHint::None)
}

fn parse_data(
    timestamp: Option<DateTime<Utc>>,
    fields: &[String],
    mut diagnostics: Vec<ParseDiagnostic>,
) -> ProtocolResult<ParseOutcome> {
    // Condition fast path: an unhinted key whose first value token is a
    // condition level makes the whole line one condition update.
    if fields.len() >= 3 {
        let (key, hint) = split_hint(&fields[1]);
        if hint == ShapeHint::None && !key.is_empty() {
            if let Some(level) = ConditionLevel::parse(&fields[2]) {
                if fields.len() > 7 {
                    diagnostics.push(ParseDiagnostic::new(
                        7,
                        "condition line has trailing fields, dropped",
                    ));
                }
                let field_or_empty = |i: usize| fields.get(i).cloned().unwrap_or_default();
                let condition = Condition {
                    level,
                    native_code: field_or_empty(3),
                    native_severity: field_or_empty(4),
                    qualifier: field_or_empty(5),
                    message: field_or_empty(6),
                };
                let item = WireObservation {
                    key: key.to_string(),
                    kind: ObservationKind::Condition(condition),
                    values: Vec::new(),
                };
                return Ok(ParseOutcome::new(
                    ParsedFrame::Data(DataFrame {
                        timestamp,
                        items: vec![item],
                    }),
                    diagnostics,
                ));
            }
        }
    }

    let mut items = Vec::new();
    let mut i = 1;
    while i < fields.len() {
        let raw_key = fields[i].as_str();
        if raw_key.is_empty() {
            diagnostics.push(ParseDiagnostic::new(i, "empty data item key, pair dropped"));
            i += 2;
            continue;
        }
        let (key, hint) = split_hint(raw_key);
        let key = key.to_string();
        match hint {
            ShapeHint::None | ShapeHint::Event | ShapeHint::Sample => {
                let Some(value) = fields.get(i + 1) else {
                    diagnostics.push(ParseDiagnostic::new(
                        i,
                        format!("key {key:?} has no value field, dropped"),
                    ));
                    break;
                };
                let kind = if hint == ShapeHint::Sample {
                    ObservationKind::Sample
                } else {
                    ObservationKind::Event
                };
                items.push(WireObservation {
                    key,
                    kind,
                    values: vec![(VALUE_KEY.to_string(), value.clone())],
                });
                i += 2;
            }
            ShapeHint::Message => {
                let (Some(native_code), Some(text)) = (fields.get(i + 1), fields.get(i + 2))
                else {
                    diagnostics.push(ParseDiagnostic::new(
                        i,
                        format!("message {key:?} needs a native code and a text field, dropped"),
                    ));
                    break;
                };
                items.push(WireObservation {
                    key,
                    kind: ObservationKind::Message {
                        native_code: native_code.clone(),
                    },
                    values: vec![(VALUE_KEY.to_string(), text.clone())],
                });
                i += 3;
            }
            ShapeHint::DataSet => {
                let Some(value) = fields.get(i + 1) else {
                    diagnostics.push(ParseDiagnostic::new(
                        i,
                        format!("data set {key:?} has no entry field, dropped"),
                    ));
                    break;
                };
                items.push(WireObservation {
                    key,
                    kind: ObservationKind::DataSet,
                    values: parse_set_entries(value),
                });
                i += 2;
            }
            ShapeHint::Table => {
                let Some(value) = fields.get(i + 1) else {
                    diagnostics.push(ParseDiagnostic::new(
                        i,
                        format!("table {key:?} has no row field, dropped"),
                    ));
                    break;
                };
                items.push(WireObservation {
                    key,
                    kind: ObservationKind::Table,
                    values: parse_table_rows(value),
                });
                i += 2;
            }
            ShapeHint::TimeSeries => {
                let (Some(count_token), Some(frequency_token), Some(samples)) = (
                    fields.get(i + 1),
                    fields.get(i + 2),
                    fields.get(i + 3),
                ) else {
                    diagnostics.push(ParseDiagnostic::new(
                        i,
                        format!("time series {key:?} needs count, frequency and samples, dropped"),
                    ));
                    break;
                };
                let actual = samples.split_whitespace().count() as u32;
                let count = match count_token.parse::<u32>() {
                    Ok(declared) if declared == actual => declared,
                    Ok(declared) => {
                        diagnostics.push(ParseDiagnostic::new(
                            i + 1,
                            format!(
                                "time series {key:?} declares {declared} samples but carries {actual}"
                            ),
                        ));
                        actual
                    }
                    Err(_) => {
                        diagnostics.push(ParseDiagnostic::new(
                            i + 1,
                            format!("time series {key:?} count {count_token:?} is not an integer"),
                        ));
                        actual
                    }
                };
                let frequency = if frequency_token.is_empty() {
                    None
                } else {
                    match frequency_token.parse::<f64>() {
                        Ok(f) => Some(f),
                        Err(_) => {
                            diagnostics.push(ParseDiagnostic::new(
                                i + 2,
                                format!(
                                    "time series {key:?} frequency {frequency_token:?} is not a number"
                                ),
                            ));
                            None
                        }
                    }
                };
                items.push(WireObservation {
                    key,
                    kind: ObservationKind::TimeSeries { count, frequency },
                    values: vec![(VALUE_KEY.to_string(), samples.clone())],
                });
                i += 4;
            }
        }
    }

    if items.is_empty() {
        return Ok(ParseOutcome::new(ParsedFrame::Empty, diagnostics));
    }
    Ok(ParseOutcome::new(
        ParsedFrame::Data(DataFrame { timestamp, items }),
        diagnostics,
    ))
}

/// `a=1 b=2 c` → `[(a,1), (b,2), (c,"")]`. Entry values cannot contain
/// spaces in this grammar; senders needing structure use tables.
fn parse_set_entries(value: &str) -> Vec<(String, String)> {
    value
        .split_whitespace()
        .map(|token| match token.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

/// `r1={a=1 b=2} r2={c=3}` → `[(r1, "a=1 b=2"), (r2, "c=3")]`. Cell
/// decoding beyond the row split belongs to the rendering collaborator.
fn parse_table_rows(value: &str) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    let mut rest = value.trim_start();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            // Row without cells, e.g. a bare trailing name.
            rows.push((rest.trim().to_string(), String::new()));
            break;
        };
        let row = rest[..eq].trim().to_string();
        let after = &rest[eq + 1..];
        if let Some(stripped) = after.strip_prefix('{') {
            match stripped.find('}') {
                Some(end) => {
                    rows.push((row, stripped[..end].to_string()));
                    rest = stripped[end + 1..].trim_start();
                }
                None => {
                    // Unterminated braces: take the remainder as the cell.
                    rows.push((row, stripped.to_string()));
                    break;
                }
            }
        } else {
            let end = after.find(char::is_whitespace).unwrap_or(after.len());
            rows.push((row, after[..end].to_string()));
            rest = after[end..].trim_start();
        }
    }
    rows
}

fn parse_asset_upsert(
    line: &str,
    timestamp: Option<DateTime<Utc>>,
    fields: &[String],
    diagnostics: Vec<ParseDiagnostic>,
) -> ProtocolResult<ParseOutcome> {
    let asset_id = fields
        .get(2)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProtocolError::malformed("asset", "missing asset id", line))?
        .clone();
    let asset_type = fields
        .get(3)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProtocolError::malformed("asset", "missing asset type", line))?
        .clone();
    if fields.len() < 5 {
        return Err(ProtocolError::malformed("asset", "missing payload", line));
    }

    let body = if fields.len() == 5 && !fields[4].is_empty() && fields[4].bytes().all(|b| b.is_ascii_digit())
    {
        // Length-prefixed: the payload follows on the stream, raw bytes.
        AssetBody::Pending(fields[4].parse().map_err(|_| {
            ProtocolError::malformed("asset", format!("payload length {:?} overflows", fields[4]), line)
        })?)
    } else {
        AssetBody::Inline(fields[4..].join("|"))
    };

    Ok(ParseOutcome::new(
        ParsedFrame::Asset {
            timestamp,
            command: AssetCommand::Upsert {
                asset_id,
                asset_type,
                body,
            },
        },
        diagnostics,
    ))
}

fn parse_asset_remove(
    line: &str,
    timestamp: Option<DateTime<Utc>>,
    fields: &[String],
    mut diagnostics: Vec<ParseDiagnostic>,
) -> ProtocolResult<ParseOutcome> {
    let asset_id = fields
        .get(2)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProtocolError::malformed("asset removal", "missing asset id", line))?
        .clone();
    if fields.len() > 3 {
        diagnostics.push(ParseDiagnostic::new(3, "trailing fields dropped"));
    }
    Ok(ParseOutcome::new(
        ParsedFrame::Asset {
            timestamp,
            command: AssetCommand::Remove { asset_id },
        },
        diagnostics,
    ))
}

fn parse_asset_remove_all(
    timestamp: Option<DateTime<Utc>>,
    fields: &[String],
    mut diagnostics: Vec<ParseDiagnostic>,
) -> ProtocolResult<ParseOutcome> {
    let asset_type = fields.get(2).filter(|t| !t.is_empty()).cloned();
    if fields.len() > 3 {
        diagnostics.push(ParseDiagnostic::new(3, "trailing fields dropped"));
    }
    Ok(ParseOutcome::new(
        ParsedFrame::Asset {
            timestamp,
            command: AssetCommand::RemoveAll { asset_type },
        },
        diagnostics,
    ))
}

fn parse_device(
    line: &str,
    timestamp: Option<DateTime<Utc>>,
    fields: &[String],
    mut diagnostics: Vec<ParseDiagnostic>,
) -> ProtocolResult<ParseOutcome> {
    let device_uuid = fields
        .get(2)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ProtocolError::malformed("device", "missing device uuid", line))?
        .clone();
    let mut entries = Vec::new();
    let mut i = 3;
    while i < fields.len() {
        if fields[i].is_empty() {
            diagnostics.push(ParseDiagnostic::new(i, "empty metadata key, pair dropped"));
            i += 2;
            continue;
        }
        let Some(value) = fields.get(i + 1) else {
            diagnostics.push(ParseDiagnostic::new(
                i,
                format!("metadata key {:?} has no value field, dropped", fields[i]),
            ));
            break;
        };
        entries.push((fields[i].clone(), value.clone()));
        i += 2;
    }
    Ok(ParseOutcome::new(
        ParsedFrame::Device {
            timestamp,
            device: DeviceWire {
                device_uuid,
                entries,
            },
        },
        diagnostics,
    ))
}
