//! Frame serialization — the exact inverse of [`crate::parser`].
//!
//! Used by the adapter-side test harness and by anything that needs to
//! re-emit frames on the wire. `parse_line(serialize_frame(f)) == f` holds
//! for every frame this module accepts; frames the line grammar cannot
//! carry (a condition sharing a line with other items, data-set entries
//! with embedded whitespace) are rejected with
//! [`ProtocolError::Unrepresentable`].

use chrono::{DateTime, SecondsFormat, Utc};
use types::{ConditionLevel, ObservationKind};

use crate::error::{ProtocolError, ProtocolResult};
use crate::escape::join_fields;
use crate::frame::{
    AssetBody, AssetCommand, ControlFrame, DataFrame, DeviceWire, ParsedFrame, WireObservation,
};

/// Serialize a frame to its wire line (no trailing newline). An asset
/// upsert with an inline body serializes to its length-prefixed form:
/// header line, newline, then the raw payload bytes.
pub fn serialize_frame(frame: &ParsedFrame) -> ProtocolResult<String> {
    match frame {
        ParsedFrame::Control(ControlFrame::Ping) => Ok("* PING".to_string()),
        ParsedFrame::Control(ControlFrame::Pong { timeout_ms }) => {
            Ok(format!("* PONG {timeout_ms}"))
        }
        ParsedFrame::Empty => Ok(String::new()),
        ParsedFrame::Data(data) => serialize_data(data),
        ParsedFrame::Asset { timestamp, command } => serialize_asset(timestamp, command),
        ParsedFrame::Device { timestamp, device } => serialize_device(timestamp, device),
    }
}

fn format_timestamp(timestamp: &Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn scalar_value(item: &WireObservation) -> &str {
    item.values
        .iter()
        .find(|(k, _)| k == types::VALUE_KEY)
        .map(|(_, v)| v.as_str())
        .unwrap_or_default()
}

/// An unhinted event key would be misread on re-parse if its value names a
/// condition level, or if the key itself ends in something that looks like
/// a shape hint.
fn needs_event_hint(item: &WireObservation) -> bool {
    if ConditionLevel::parse(scalar_value(item)).is_some() {
        return true;
    }
    item.key
        .rsplit_once(':')
        .is_some_and(|(head, tail)| {
            !head.is_empty()
                && matches!(
                    tail.to_ascii_lowercase().as_str(),
                    "event" | "sample" | "message" | "dataset" | "table" | "timeseries"
                )
        })
}

fn check_key(key: &str) -> ProtocolResult<()> {
    if key.is_empty() {
        return Err(ProtocolError::Unrepresentable {
            reason: "empty data item key".to_string(),
        });
    }
    Ok(())
}

fn encode_set_entries(item: &WireObservation) -> ProtocolResult<String> {
    let mut entries = Vec::with_capacity(item.values.len());
    for (k, v) in &item.values {
        if k.is_empty() || k.contains(char::is_whitespace) || k.contains('=') {
            return Err(ProtocolError::Unrepresentable {
                reason: format!("data set entry key {k:?} cannot be encoded"),
            });
        }
        if v.contains(char::is_whitespace) {
            return Err(ProtocolError::Unrepresentable {
                reason: format!("data set entry value {v:?} contains whitespace"),
            });
        }
        if v.is_empty() {
            entries.push(k.clone());
        } else {
            entries.push(format!("{k}={v}"));
        }
    }
    Ok(entries.join(" "))
}

fn encode_table_rows(item: &WireObservation) -> ProtocolResult<String> {
    let mut rows = Vec::with_capacity(item.values.len());
    for (row, cells) in &item.values {
        if row.is_empty() || row.contains(char::is_whitespace) || row.contains('=') {
            return Err(ProtocolError::Unrepresentable {
                reason: format!("table row key {row:?} cannot be encoded"),
            });
        }
        if cells.contains('}') {
            return Err(ProtocolError::Unrepresentable {
                reason: format!("table row {row:?} cells contain a closing brace"),
            });
        }
        rows.push(format!("{row}={{{cells}}}"));
    }
    Ok(rows.join(" "))
}

fn serialize_data(data: &DataFrame) -> ProtocolResult<String> {
    if data.items.is_empty() {
        return Err(ProtocolError::Unrepresentable {
            reason: "data frame with no items".to_string(),
        });
    }

    if data.items.iter().any(|i| i.kind.is_condition()) {
        if data.items.len() != 1 {
            return Err(ProtocolError::Unrepresentable {
                reason: "a condition must be alone on its line".to_string(),
            });
        }
        let item = &data.items[0];
        check_key(&item.key)?;
        let ObservationKind::Condition(condition) = &item.kind else {
            unreachable!("guarded by is_condition above");
        };
        return Ok(join_fields([
            format_timestamp(&data.timestamp).as_str(),
            item.key.as_str(),
            condition.level.as_str(),
            condition.native_code.as_str(),
            condition.native_severity.as_str(),
            condition.qualifier.as_str(),
            condition.message.as_str(),
        ]));
    }

    let mut fields = vec![format_timestamp(&data.timestamp)];
    for item in &data.items {
        check_key(&item.key)?;
        match &item.kind {
            ObservationKind::Sample => {
                fields.push(format!("{}:sample", item.key));
                fields.push(scalar_value(item).to_string());
            }
            ObservationKind::Event => {
                if needs_event_hint(item) {
                    fields.push(format!("{}:event", item.key));
                } else {
                    fields.push(item.key.clone());
                }
                fields.push(scalar_value(item).to_string());
            }
            ObservationKind::Message { native_code } => {
                fields.push(format!("{}:message", item.key));
                fields.push(native_code.clone());
                fields.push(scalar_value(item).to_string());
            }
            ObservationKind::DataSet => {
                fields.push(format!("{}:dataset", item.key));
                fields.push(encode_set_entries(item)?);
            }
            ObservationKind::Table => {
                fields.push(format!("{}:table", item.key));
                fields.push(encode_table_rows(item)?);
            }
            ObservationKind::TimeSeries { count, frequency } => {
                fields.push(format!("{}:timeseries", item.key));
                fields.push(count.to_string());
                fields.push(frequency.map(|f| f.to_string()).unwrap_or_default());
                fields.push(scalar_value(item).to_string());
            }
            ObservationKind::Condition(_) => {
                unreachable!("condition frames handled above");
            }
        }
    }
    Ok(join_fields(fields))
}

fn serialize_asset(
    timestamp: &Option<DateTime<Utc>>,
    command: &AssetCommand,
) -> ProtocolResult<String> {
    let ts = format_timestamp(timestamp);
    match command {
        AssetCommand::Upsert {
            asset_id,
            asset_type,
            body,
        } => match body {
            AssetBody::Inline(payload) => {
                let header = join_fields([
                    ts.as_str(),
                    "@ASSET@",
                    asset_id.as_str(),
                    asset_type.as_str(),
                    payload.len().to_string().as_str(),
                ]);
                Ok(format!("{header}\n{payload}"))
            }
            AssetBody::Pending(len) => Ok(join_fields([
                ts.as_str(),
                "@ASSET@",
                asset_id.as_str(),
                asset_type.as_str(),
                len.to_string().as_str(),
            ])),
        },
        AssetCommand::Remove { asset_id } => Ok(join_fields([
            ts.as_str(),
            "@REMOVE_ASSET@",
            asset_id.as_str(),
        ])),
        AssetCommand::RemoveAll { asset_type } => {
            let mut fields = vec![ts, "@REMOVE_ALL_ASSETS@".to_string()];
            if let Some(asset_type) = asset_type {
                fields.push(asset_type.clone());
            }
            Ok(join_fields(fields))
        }
    }
}

fn serialize_device(
    timestamp: &Option<DateTime<Utc>>,
    device: &DeviceWire,
) -> ProtocolResult<String> {
    let mut fields = vec![
        format_timestamp(timestamp),
        "@DEVICE@".to_string(),
        device.device_uuid.clone(),
    ];
    for (k, v) in &device.entries {
        fields.push(k.clone());
        fields.push(v.clone());
    }
    Ok(join_fields(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use chrono::TimeZone;

    fn round_trip(frame: ParsedFrame) {
        let line = serialize_frame(&frame).expect("serializable");
        let reparsed = parse_line(&line).expect("parseable");
        assert!(reparsed.diagnostics.is_empty(), "{:?}", reparsed.diagnostics);
        assert_eq!(reparsed.frame, frame);
    }

    fn ts() -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn round_trips_scalars_with_escapes() {
        round_trip(ParsedFrame::Data(DataFrame {
            timestamp: ts(),
            items: vec![
                WireObservation {
                    key: "program".to_string(),
                    kind: ObservationKind::Event,
                    values: vec![("VALUE".to_string(), "O1234|main".to_string())],
                },
                WireObservation {
                    key: "temp".to_string(),
                    kind: ObservationKind::Sample,
                    values: vec![("VALUE".to_string(), "21.5".to_string())],
                },
            ],
        }));
    }

    #[test]
    fn round_trips_event_whose_value_is_a_level() {
        round_trip(ParsedFrame::Data(DataFrame {
            timestamp: ts(),
            items: vec![WireObservation {
                key: "alarm_state".to_string(),
                kind: ObservationKind::Event,
                values: vec![("VALUE".to_string(), "FAULT".to_string())],
            }],
        }));
    }

    #[test]
    fn round_trips_condition() {
        round_trip(ParsedFrame::Data(DataFrame {
            timestamp: ts(),
            items: vec![WireObservation {
                key: "system".to_string(),
                kind: ObservationKind::Condition(
                    types::Condition::new(ConditionLevel::Fault)
                        .with_native_code("A17")
                        .with_message("coolant pressure"),
                ),
                values: vec![],
            }],
        }));
    }

    #[test]
    fn round_trips_collections() {
        round_trip(ParsedFrame::Data(DataFrame {
            timestamp: None,
            items: vec![
                WireObservation {
                    key: "vars".to_string(),
                    kind: ObservationKind::DataSet,
                    values: vec![
                        ("a".to_string(), "1".to_string()),
                        ("flag".to_string(), String::new()),
                    ],
                },
                WireObservation {
                    key: "offsets".to_string(),
                    kind: ObservationKind::Table,
                    values: vec![("t1".to_string(), "x=1 y=2".to_string())],
                },
                WireObservation {
                    key: "load".to_string(),
                    kind: ObservationKind::TimeSeries {
                        count: 3,
                        frequency: Some(100.0),
                    },
                    values: vec![("VALUE".to_string(), "1 2 3".to_string())],
                },
            ],
        }));
    }

    #[test]
    fn round_trips_asset_upsert_via_length_prefix() {
        let frame = ParsedFrame::Asset {
            timestamp: ts(),
            command: AssetCommand::Upsert {
                asset_id: "T1".to_string(),
                asset_type: "CuttingTool".to_string(),
                body: AssetBody::Inline("<tool>\n7mm|x</tool>".to_string()),
            },
        };
        let wire = serialize_frame(&frame).unwrap();
        let (header, payload) = wire.split_once('\n').unwrap();
        let outcome = parse_line(header).unwrap();
        match outcome.frame {
            ParsedFrame::Asset { timestamp, command } => {
                match &command {
                    AssetCommand::Upsert { body, .. } => {
                        assert_eq!(*body, AssetBody::Pending(payload.len()));
                    }
                    other => panic!("expected upsert, got {other:?}"),
                }
                let completed = ParsedFrame::Asset {
                    timestamp,
                    command: command.with_inline_body(payload.to_string()),
                };
                assert_eq!(completed, frame);
            }
            other => panic!("expected asset frame, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_control_and_device() {
        round_trip(ParsedFrame::Control(ControlFrame::Ping));
        round_trip(ParsedFrame::Control(ControlFrame::Pong { timeout_ms: 10000 }));
        round_trip(ParsedFrame::Device {
            timestamp: ts(),
            device: DeviceWire {
                device_uuid: "dev-1".to_string(),
                entries: vec![("name".to_string(), "Mill-3".to_string())],
            },
        });
        round_trip(ParsedFrame::Asset {
            timestamp: None,
            command: AssetCommand::RemoveAll { asset_type: None },
        });
    }

    #[test]
    fn rejects_mixed_condition_lines() {
        let frame = ParsedFrame::Data(DataFrame {
            timestamp: None,
            items: vec![
                WireObservation {
                    key: "system".to_string(),
                    kind: ObservationKind::Condition(types::Condition::new(
                        ConditionLevel::Normal,
                    )),
                    values: vec![],
                },
                WireObservation {
                    key: "mode".to_string(),
                    kind: ObservationKind::Event,
                    values: vec![("VALUE".to_string(), "AUTO".to_string())],
                },
            ],
        });
        assert!(matches!(
            serialize_frame(&frame),
            Err(ProtocolError::Unrepresentable { .. })
        ));
    }
}
