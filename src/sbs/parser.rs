//! Parser for SBS-1 BaseStation CSV lines (the dump1090 port 30003 feed).
//!
//! Every valid line carries exactly 22 comma-separated fields. Field 0 is
//! the literal `MSG` tag, field 1 the transmission type, field 4 the 24-bit
//! ICAO address in hex. Only transmission types 1 (callsign) and 3
//! (airborne position) carry data we use; types 2 and 4 through 8 are valid
//! but content-free for our purposes.
//!
//! SBS format: MSG,<tt>,<session>,<aircraft>,<icao>,<flight>,<date_gen>,
//!             <time_gen>,<date_log>,<time_log>,<callsign>,<altitude>,
//!             <ground_speed>,<track>,<latitude>,<longitude>,<vertical_rate>,
//!             <squawk>,<alert>,<emergency>,<spi>,<on_ground>

use thiserror::Error;

/// Number of fields in a well-formed BaseStation line.
pub const SBS_FIELD_COUNT: usize = 22;

/// One parsed BaseStation message, reduced to what the tracker consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum SbsEvent {
    /// MSG,1: identification. The callsign may be empty on some feeds.
    Callsign { icao: u32, callsign: String },
    /// MSG,3: airborne position.
    Position {
        icao: u32,
        latitude: f64,
        longitude: f64,
        altitude_ft: i32,
    },
    /// MSG,{2,4,5,6,7,8}: valid message without position or identification
    /// content. Still refreshes the track's last-seen timestamp.
    Other { icao: u32 },
}

impl SbsEvent {
    pub fn icao(&self) -> u32 {
        match *self {
            SbsEvent::Callsign { icao, .. }
            | SbsEvent::Position { icao, .. }
            | SbsEvent::Other { icao } => icao,
        }
    }
}

/// Parse failure, one variant per counted error category.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SbsError {
    #[error("expected {SBS_FIELD_COUNT} fields, got {got}")]
    FieldCount { got: usize },
    #[error("unexpected message type '{got}'")]
    MessageType { got: String },
    #[error("unexpected transmission type '{got}'")]
    TransmissionType { got: String },
    /// ICAO address `000000`: the decode was likely incomplete, and the
    /// message carries nothing attributable to a real aircraft.
    #[error("all-zero ICAO address")]
    ZeroIcao,
    #[error("invalid {field} field '{value}'")]
    InvalidField {
        field: &'static str,
        value: String,
    },
}

/// Parse one BaseStation line into an event.
///
/// Validation order: field count, message type tag, transmission type, ICAO
/// address, then the type-specific payload fields. No track state is touched
/// here; the caller counts the outcome and dispatches.
pub fn parse_line(line: &str) -> Result<SbsEvent, SbsError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != SBS_FIELD_COUNT {
        return Err(SbsError::FieldCount { got: fields.len() });
    }

    if fields[0] != "MSG" {
        return Err(SbsError::MessageType {
            got: fields[0].to_string(),
        });
    }

    let transmission_type: u8 = fields[1].parse().map_err(|_| SbsError::TransmissionType {
        got: fields[1].to_string(),
    })?;
    if !(1..=8).contains(&transmission_type) {
        return Err(SbsError::TransmissionType {
            got: fields[1].to_string(),
        });
    }

    let icao = parse_icao(fields[4])?;

    match transmission_type {
        1 => Ok(SbsEvent::Callsign {
            icao,
            callsign: fields[10].trim().to_string(),
        }),
        3 => Ok(SbsEvent::Position {
            icao,
            latitude: parse_field(fields[14], "latitude")?,
            longitude: parse_field(fields[15], "longitude")?,
            altitude_ft: parse_field(fields[11], "altitude")?,
        }),
        _ => Ok(SbsEvent::Other { icao }),
    }
}

fn parse_icao(field: &str) -> Result<u32, SbsError> {
    let value = u32::from_str_radix(field, 16).map_err(|_| SbsError::InvalidField {
        field: "icao",
        value: field.to_string(),
    })?;
    if value > 0xFF_FFFF {
        return Err(SbsError::InvalidField {
            field: "icao",
            value: field.to_string(),
        });
    }
    if value == 0 {
        return Err(SbsError::ZeroIcao);
    }
    Ok(value)
}

fn parse_field<T: std::str::FromStr>(raw: &str, field: &'static str) -> Result<T, SbsError> {
    raw.parse().map_err(|_| SbsError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_msg_1_callsign() {
        let line = "MSG,1,1,1,738065,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,RYR1427 ,,,,,,,,0,0,0,0";
        let event = parse_line(line).unwrap();
        assert_eq!(
            event,
            SbsEvent::Callsign {
                icao: 0x738065,
                callsign: "RYR1427".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_msg_3_position() {
        let line = "MSG,3,1,1,738065,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,51.45735,1.02826,,,0,0,0,0";
        match parse_line(line).unwrap() {
            SbsEvent::Position {
                icao,
                latitude,
                longitude,
                altitude_ft,
            } => {
                assert_eq!(icao, 0x738065);
                assert!((latitude - 51.45735).abs() < 1e-9);
                assert!((longitude - 1.02826).abs() < 1e-9);
                assert_eq!(altitude_ft, 36000);
            }
            other => panic!("expected position event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_msg_4_is_other() {
        let line = "MSG,4,1,1,AB1234,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,,420,179,,,64,,0,0,0,0";
        assert_eq!(parse_line(line).unwrap(), SbsEvent::Other { icao: 0xAB1234 });
    }

    #[test]
    fn test_field_count_mismatch() {
        let line = "MSG,3,1,1,738065,1";
        assert_eq!(parse_line(line), Err(SbsError::FieldCount { got: 6 }));
    }

    #[test]
    fn test_unexpected_message_type() {
        let line = "STA,3,1,1,738065,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,51.45735,1.02826,,,0,0,0,0";
        assert_eq!(
            parse_line(line),
            Err(SbsError::MessageType {
                got: "STA".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_transmission_type() {
        let line = "MSG,9,1,1,738065,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,51.45735,1.02826,,,0,0,0,0";
        assert_eq!(
            parse_line(line),
            Err(SbsError::TransmissionType {
                got: "9".to_string()
            })
        );
    }

    #[test]
    fn test_non_numeric_transmission_type() {
        let line = "MSG,x,1,1,738065,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,51.45735,1.02826,,,0,0,0,0";
        assert!(matches!(
            parse_line(line),
            Err(SbsError::TransmissionType { .. })
        ));
    }

    #[test]
    fn test_zero_icao_is_its_own_category() {
        let line = "MSG,3,1,1,000000,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,51.45735,1.02826,,,0,0,0,0";
        assert_eq!(parse_line(line), Err(SbsError::ZeroIcao));
    }

    #[test]
    fn test_invalid_icao() {
        let line = "MSG,3,1,1,XYZ123,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,51.45735,1.02826,,,0,0,0,0";
        assert!(matches!(
            parse_line(line),
            Err(SbsError::InvalidField { field: "icao", .. })
        ));
    }

    #[test]
    fn test_position_with_missing_coordinates() {
        let line = "MSG,3,1,1,738065,1,2019/06/28,23:48:18.611,2019/06/28,23:53:19.161,,36000,,,,,,,0,0,0,0";
        assert!(matches!(
            parse_line(line),
            Err(SbsError::InvalidField {
                field: "latitude",
                ..
            })
        ));
    }
}
