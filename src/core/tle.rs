use std::fs;
use std::ops::Range;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::elements::ElementRecord;

const LINE_LEN: usize = 69;
const CHECKSUM_COLUMN: usize = 68;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected} columns, found {found}")]
    Length { expected: usize, found: usize },
    #[error("line contains non-ASCII characters")]
    NonAscii,
    #[error("expected line number {expected}")]
    LineNumber { expected: char },
    #[error("checksum mismatch: line says {expected}, computed {computed}")]
    Checksum { expected: u8, computed: u8 },
    #[error("invalid {field}: {value:?}")]
    Field { field: &'static str, value: String },
    #[error("catalog number differs between lines ({line1} vs {line2})")]
    CatalogMismatch { line1: u32, line2: u32 },
    #[error("line 1 is not followed by a line 2")]
    MissingLine2,
    #[error("line 2 has no preceding line 1")]
    OrphanLine2,
}

/// A rejected element set. `line` is the 1-based line number in the parsed text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    /// Catalog number read from the failing line, when it could be read at all.
    pub catalog_id: Option<u32>,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum TleFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone)]
pub struct ParsedBatch {
    pub records: Vec<ElementRecord>,
    pub errors: Vec<ParseError>,
}

impl ParsedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.errors.is_empty()
    }
}

/// Modulo-10 checksum over the first 68 columns: digits count their value, `-` counts one.
pub fn checksum(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .take(CHECKSUM_COLUMN)
        .map(|b| match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Parses a single element set. Line numbers in errors are 1 and 2.
pub fn parse_element_set(
    name: Option<&str>,
    line1: &str,
    line2: &str,
) -> Result<ElementRecord, ParseError> {
    parse_lines(name, (1, line1), (2, line2))
}

/// Parses every element set in `text`. A malformed set is reported in `errors`
/// and never prevents the rest of the batch from parsing.
pub fn parse_batch(text: &str) -> ParsedBatch {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let mut batch = ParsedBatch::default();
    let mut name: Option<&str> = None;
    let mut i = 0usize;
    while i < lines.len() {
        let (number, line) = lines[i];
        if is_data_line(line, b'1') {
            match lines.get(i + 1) {
                Some(&(next_number, next)) if is_data_line(next, b'2') => {
                    debug!("Parsing element set at lines {}, {}", number, next_number);
                    match parse_lines(name.take(), (number, line), (next_number, next)) {
                        Ok(record) => batch.records.push(record),
                        Err(e) => {
                            warn!(line = e.line, error = %e, "Skipping malformed element set");
                            batch.errors.push(e);
                        }
                    }
                    i += 2;
                }
                _ => {
                    let e = ParseError {
                        line: number,
                        catalog_id: catalog_hint(line),
                        kind: ParseErrorKind::MissingLine2,
                    };
                    warn!(line = number, "Skipping element set: missing line 2");
                    batch.errors.push(e);
                    name = None;
                    i += 1;
                }
            }
        } else if is_data_line(line, b'2') {
            warn!(line = number, "Skipping orphaned line 2");
            batch.errors.push(ParseError {
                line: number,
                catalog_id: catalog_hint(line),
                kind: ParseErrorKind::OrphanLine2,
            });
            name = None;
            i += 1;
        } else {
            name = Some(line);
            i += 1;
        }
    }

    info!(records = batch.records.len(), errors = batch.errors.len(), "Parsed element sets");
    batch
}

/// Reads a TLE file (2-line or 3-line groups) and parses it as one batch.
pub fn parse_tle_file(path: &Path) -> Result<ParsedBatch, TleFileError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_batch(&content))
}

fn is_data_line(line: &str, number: u8) -> bool {
    let bytes = line.as_bytes();
    bytes.first() == Some(&number) && bytes.get(1) == Some(&b' ')
}

fn catalog_hint(line: &str) -> Option<u32> {
    line.get(2..7).and_then(parse_catalog_number)
}

/// Accepts plain five-digit numbers and the Alpha-5 form (`A0001` = 100001).
fn parse_catalog_number(field: &str) -> Option<u32> {
    let trimmed = field.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if first.is_ascii_digit() {
        return trimmed.parse::<u32>().ok();
    }
    if trimmed.len() != 5 || !first.is_ascii_uppercase() || first == 'I' || first == 'O' {
        return None;
    }
    let mut prefix = u32::from(first as u8 - b'A') + 10;
    if first > 'I' {
        prefix -= 1;
    }
    if first > 'O' {
        prefix -= 1;
    }
    let rest: u32 = chars.as_str().parse().ok()?;
    Some(prefix * 10_000 + rest)
}

struct Line<'a> {
    text: &'a str,
    number: usize,
    catalog_id: Option<u32>,
}

impl<'a> Line<'a> {
    fn checked(text: &'a str, number: usize, expected: u8) -> Result<Self, ParseError> {
        let mut line = Line { text, number, catalog_id: None };
        if !text.is_ascii() {
            return Err(line.error(ParseErrorKind::NonAscii));
        }
        if text.len() != LINE_LEN {
            let kind = ParseErrorKind::Length { expected: LINE_LEN, found: text.len() };
            return Err(line.error(kind));
        }
        line.catalog_id = catalog_hint(text);
        if !is_data_line(text, expected) {
            return Err(line.error(ParseErrorKind::LineNumber { expected: expected as char }));
        }
        let digit = text.as_bytes()[CHECKSUM_COLUMN];
        if !digit.is_ascii_digit() {
            return Err(line.field_error("checksum", CHECKSUM_COLUMN..LINE_LEN));
        }
        let computed = checksum(text);
        if computed != digit - b'0' {
            return Err(line.error(ParseErrorKind::Checksum { expected: digit - b'0', computed }));
        }
        Ok(line)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError { line: self.number, catalog_id: self.catalog_id, kind }
    }

    fn field_error(&self, field: &'static str, range: Range<usize>) -> ParseError {
        self.error(ParseErrorKind::Field { field, value: self.text[range].to_string() })
    }

    fn raw(&self, range: Range<usize>) -> &'a str {
        &self.text[range]
    }

    fn catalog_number(&self) -> Result<u32, ParseError> {
        parse_catalog_number(self.raw(2..7)).ok_or_else(|| self.field_error("catalog number", 2..7))
    }

    fn float(&self, field: &'static str, range: Range<usize>) -> Result<f64, ParseError> {
        self.raw(range.clone())
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.field_error(field, range))
    }

    fn angle(&self, field: &'static str, range: Range<usize>, max: f64) -> Result<f64, ParseError> {
        let value = self.float(field, range.clone())?;
        if !(0.0..=max).contains(&value) {
            return Err(self.field_error(field, range));
        }
        Ok(value)
    }

    fn integer(&self, field: &'static str, range: Range<usize>) -> Result<u32, ParseError> {
        let raw = self.raw(range.clone()).trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.field_error(field, range));
        }
        raw.parse::<u32>().map_err(|_| self.field_error(field, range))
    }

    /// Fields such as ` 12345-6` meaning `0.12345e-6`.
    fn exponent(&self, field: &'static str, range: Range<usize>) -> Result<f64, ParseError> {
        let raw = self.raw(range.clone()).trim();
        let err = || self.field_error(field, range.clone());
        let (sign, digits) = match raw.as_bytes().first() {
            Some(b'-') => (-1.0, &raw[1..]),
            Some(b'+') => (1.0, &raw[1..]),
            _ => (1.0, raw),
        };
        if digits.len() < 3 {
            return Err(err());
        }
        let (mantissa, exponent) = digits.split_at(digits.len() - 2);
        if mantissa.is_empty() || !mantissa.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let exponent_bytes = exponent.as_bytes();
        if !matches!(exponent_bytes[0], b'+' | b'-') || !exponent_bytes[1].is_ascii_digit() {
            return Err(err());
        }
        let exponent: i32 = exponent.parse().map_err(|_| err())?;
        let mantissa: f64 = format!("0.{mantissa}").parse().map_err(|_| err())?;
        Ok(sign * mantissa * 10f64.powi(exponent))
    }

    fn epoch(&self) -> Result<DateTime<Utc>, ParseError> {
        let yy = self.integer("epoch year", 18..20)?;
        let year = (if yy < 57 { 2000 + yy } else { 1900 + yy }) as i32;
        let day = self.float("epoch day", 20..32)?;
        if !(1.0..367.0).contains(&day) {
            return Err(self.field_error("epoch day", 20..32));
        }
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| self.field_error("epoch year", 18..20))?;
        let nanos = ((day - 1.0) * 86_400e9).round() as i64;
        Ok(start + Duration::nanoseconds(nanos))
    }
}

fn parse_lines(
    name: Option<&str>,
    (number1, text1): (usize, &str),
    (number2, text2): (usize, &str),
) -> Result<ElementRecord, ParseError> {
    let l1 = Line::checked(text1, number1, b'1')?;
    let l2 = Line::checked(text2, number2, b'2')?;

    let norad_id = l1.catalog_number()?;
    let norad_id_2 = l2.catalog_number()?;
    if norad_id != norad_id_2 {
        let kind = ParseErrorKind::CatalogMismatch { line1: norad_id, line2: norad_id_2 };
        return Err(l2.error(kind));
    }

    let classification = l1.raw(7..8).chars().next().unwrap_or(' ');
    if !classification.is_ascii_alphabetic() {
        return Err(l1.field_error("classification", 7..8));
    }
    let international_designator = l1.raw(9..17).trim().to_string();
    let epoch = l1.epoch()?;
    let mean_motion_dot = l1.float("mean motion derivative", 33..43)?;
    let mean_motion_ddot = l1.exponent("mean motion second derivative", 44..52)?;
    let drag_term = l1.exponent("drag term", 53..61)?;
    let ephemeris_type = match l1.raw(62..63) {
        " " => 0,
        s => s.parse::<u8>().map_err(|_| l1.field_error("ephemeris type", 62..63))?,
    };
    let element_set_number = l1.integer("element set number", 64..68)?;

    let inclination = l2.angle("inclination", 8..16, 180.0)?;
    let right_ascension = l2.angle("right ascension", 17..25, 360.0)?;
    let eccentricity_raw = l2.raw(26..33);
    if !eccentricity_raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(l2.field_error("eccentricity", 26..33));
    }
    let eccentricity: f64 = format!("0.{eccentricity_raw}")
        .parse()
        .map_err(|_| l2.field_error("eccentricity", 26..33))?;
    let argument_of_perigee = l2.angle("argument of perigee", 34..42, 360.0)?;
    let mean_anomaly = l2.angle("mean anomaly", 43..51, 360.0)?;
    let mean_motion = l2.float("mean motion", 52..63)?;
    let revolution_number = l2.integer("revolution number", 63..68)?;

    let name = name
        .map(|n| n.strip_prefix("0 ").unwrap_or(n).trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("NORAD {norad_id}"));

    Ok(ElementRecord {
        norad_id,
        name,
        classification,
        international_designator,
        epoch,
        mean_motion_dot,
        mean_motion_ddot,
        drag_term,
        ephemeris_type,
        element_set_number,
        inclination,
        right_ascension,
        eccentricity,
        argument_of_perigee,
        mean_anomaly,
        mean_motion,
        revolution_number,
        orbit_class: ElementRecord::classify(mean_motion, eccentricity, inclination),
        line1: text1.to_string(),
        line2: text2.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::elements::OrbitClass;
    use chrono::{Datelike, Timelike};
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) const ISS_L1: &str =
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    pub(crate) const ISS_L2: &str =
        "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";
    pub(crate) const VANGUARD_L1: &str =
        "1 00005U 58002B   00179.78495062  .00000023  00000-0  28098-4 0  4753";
    pub(crate) const VANGUARD_L2: &str =
        "2 00005  34.2682 348.7242 1859667 331.7664  19.3264 10.82419157413667";
    pub(crate) const MOLNIYA_L1: &str =
        "1 08195U 75081A   06176.33215444  .00000099  00000-0  11873-3 0   813";
    pub(crate) const MOLNIYA_L2: &str =
        "2 08195  64.1586 279.0717 6877146 264.7651  20.2257  2.00491383225656";

    /// Rewrites the checksum column of a hand-edited line.
    pub(crate) fn with_checksum(line: &str) -> String {
        let body = &line[..CHECKSUM_COLUMN];
        format!("{body}{}", checksum(body))
    }

    #[test]
    fn parse_simple_tle() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ISS (ZARYA)").unwrap();
        writeln!(file, "{ISS_L1}").unwrap();
        writeln!(file, "{ISS_L2}").unwrap();

        let batch = parse_tle_file(file.path()).unwrap();
        assert!(batch.errors.is_empty());
        assert_eq!(batch.records.len(), 1);
        let iss = &batch.records[0];
        assert_eq!(iss.norad_id, 25544);
        assert_eq!(iss.name, "ISS (ZARYA)");
        assert_eq!(iss.classification, 'U');
        assert_eq!(iss.international_designator, "98067A");
        assert_eq!(iss.epoch.year(), 2008);
        assert_eq!(iss.epoch.ordinal(), 264);
        assert_eq!(iss.epoch.hour(), 12);
        assert!((iss.mean_motion_dot + 0.00002182).abs() < 1e-12);
        assert!((iss.drag_term + 0.11606e-4).abs() < 1e-12);
        assert_eq!(iss.mean_motion_ddot, 0.0);
        assert_eq!(iss.element_set_number, 292);
        assert!((iss.inclination - 51.6416).abs() < 1e-12);
        assert!((iss.eccentricity - 0.0006703).abs() < 1e-12);
        assert!((iss.mean_motion - 15.72125391).abs() < 1e-12);
        assert_eq!(iss.revolution_number, 56353);
        assert_eq!(iss.orbit_class, OrbitClass::NearEarth);
    }

    #[test]
    fn checksum_matches_published_digits() {
        for line in [ISS_L1, ISS_L2, VANGUARD_L1, VANGUARD_L2, MOLNIYA_L1, MOLNIYA_L2] {
            assert_eq!(checksum(line), line.as_bytes()[68] - b'0', "{line}");
        }
    }

    #[test]
    fn batch_checksums_round_trip() {
        let text = format!(
            "{ISS_L1}\n{ISS_L2}\nVANGUARD 1\n{VANGUARD_L1}\n{VANGUARD_L2}\n\
             {MOLNIYA_L1}\n{MOLNIYA_L2}\n"
        );
        let batch = parse_batch(&text);
        assert_eq!(batch.records.len(), 3);
        for record in &batch.records {
            assert_eq!(checksum(&record.line1), record.line1.as_bytes()[68] - b'0');
            assert_eq!(checksum(&record.line2), record.line2.as_bytes()[68] - b'0');
        }
        assert_eq!(batch.records[0].name, "NORAD 25544");
        assert_eq!(batch.records[1].name, "VANGUARD 1");
        assert_eq!(batch.records[2].orbit_class, OrbitClass::DeepSpace);
    }

    #[test]
    fn bad_checksum_rejects_only_that_record() {
        let corrupted = format!("{}0", &VANGUARD_L2[..68]);
        let text = format!(
            "ISS\n{ISS_L1}\n{ISS_L2}\nVANGUARD 1\n{VANGUARD_L1}\n{corrupted}\n\
             MOLNIYA\n{MOLNIYA_L1}\n{MOLNIYA_L2}\n"
        );
        let batch = parse_batch(&text);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.errors.len(), 1);
        let err = &batch.errors[0];
        assert_eq!(err.line, 6);
        assert_eq!(err.catalog_id, Some(5));
        assert_eq!(err.kind, ParseErrorKind::Checksum { expected: 0, computed: 7 });
        assert_eq!(batch.records[1].name, "MOLNIYA");
    }

    #[test]
    fn field_errors_name_the_field() {
        let bad_incl = with_checksum(&format!(
            "{}{}",
            &ISS_L2[..8],
            "  5x.641 247.4627 0006703 130.5360 325.0288 15.72125391563537"
        ));
        let err = parse_element_set(None, ISS_L1, &bad_incl).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ParseErrorKind::Field { field: "inclination", .. }), "{err}");

        let short = &ISS_L1[..60];
        let err = parse_element_set(None, short, ISS_L2).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Length { expected: 69, found: 60 });

        let err = parse_element_set(None, ISS_L2, ISS_L1).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LineNumber { expected: '1' });

        let other = with_checksum(&ISS_L2.replacen("25544", "25545", 1));
        let err = parse_element_set(None, ISS_L1, &other).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::CatalogMismatch { line1: 25544, line2: 25545 });

        let bad_bstar = with_checksum(&ISS_L1.replacen("-11606-4", "-11606x4", 1));
        let err = parse_element_set(None, &bad_bstar, ISS_L2).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Field { field: "drag term", .. }), "{err}");
    }

    #[test]
    fn orphan_and_truncated_groups_are_reported() {
        let text = format!("{ISS_L2}\nLONELY\n{VANGUARD_L1}\n\n{MOLNIYA_L1}\n{MOLNIYA_L2}\n");
        let batch = parse_batch(&text);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.errors.len(), 2);
        assert_eq!(batch.errors[0].kind, ParseErrorKind::OrphanLine2);
        assert_eq!(batch.errors[0].line, 1);
        assert_eq!(batch.errors[1].kind, ParseErrorKind::MissingLine2);
        assert_eq!(batch.errors[1].line, 3);
        assert_eq!(batch.records[0].norad_id, 8195);
        assert_eq!(batch.records[0].name, "NORAD 8195");
    }

    #[test]
    fn three_line_prefix_and_alpha5() {
        let l1 = with_checksum(&ISS_L1.replacen("25544", "A0001", 1));
        let l2 = with_checksum(&ISS_L2.replacen("25544", "A0001", 1));
        let record = parse_element_set(Some("0 TEST OBJECT"), &l1, &l2).unwrap();
        assert_eq!(record.norad_id, 100_001);
        assert_eq!(record.name, "TEST OBJECT");
        assert_eq!(parse_catalog_number("J0002"), Some(180_002));
        assert_eq!(parse_catalog_number("P1234"), Some(231_234));
        assert_eq!(parse_catalog_number("I0001"), None);
    }

    #[test]
    fn exponent_fields() {
        let record = parse_element_set(None, VANGUARD_L1, VANGUARD_L2).unwrap();
        assert!((record.drag_term - 0.28098e-4).abs() < 1e-15);
        let record = parse_element_set(None, MOLNIYA_L1, MOLNIYA_L2).unwrap();
        assert!((record.drag_term - 0.11873e-3).abs() < 1e-15);
        assert!((record.eccentricity - 0.6877146).abs() < 1e-12);
        assert_eq!(record.epoch.year(), 2006);
    }
}
