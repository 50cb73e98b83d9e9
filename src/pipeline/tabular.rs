//! Tabular serialisation: [`ExtractedDataset`] → CSV text.
//!
//! Records share no enforced schema, so the first record is taken as the
//! authority on columns:
//!
//! * header = first record's keys, in insertion order
//! * each row = the header keys looked up in that record; a missing key is
//!   an empty cell and keys absent from the header are dropped
//!
//! A cell is quoted exactly when it contains `,`, `"` or `\n`, with inner
//! quotes doubled. Rows are joined with `\n`; there is no BOM and no trailing
//! newline.

use crate::error::ExtractError;
use crate::output::{ExtractedDataset, ExtractionRecord, Scalar};
use std::borrow::Cow;

/// Serialise a dataset as CSV.
///
/// Returns `None` for an empty dataset: there is nothing to serialise, which
/// is not an error at this level.
pub fn to_csv(dataset: &ExtractedDataset) -> Option<String> {
    let first = dataset.first()?;
    let headers: Vec<&str> = first.keys().collect();

    let mut lines = Vec::with_capacity(dataset.len() + 1);
    lines.push(join_row(headers.iter().map(|h| escape_cell(*h))));

    for record in dataset {
        lines.push(join_row(headers.iter().map(|h| render_cell(record.get(h)))));
    }

    Some(lines.join("\n"))
}

/// Quote a cell iff it contains a comma, a double quote or a newline.
pub fn escape_cell(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

fn render_cell(value: Option<&Scalar>) -> Cow<'static, str> {
    match value {
        None | Some(Scalar::Null) => Cow::Borrowed(""),
        Some(v) => Cow::Owned(escape_cell(&v.to_string()).into_owned()),
    }
}

fn join_row<'a>(cells: impl Iterator<Item = Cow<'a, str>>) -> String {
    cells.collect::<Vec<_>>().join(",")
}

/// Read CSV text back into a dataset.
///
/// Expects the shape [`to_csv`] writes: rows separated by `\n` only, no
/// trailing newline. An unquoted `\r` is cell content, and an empty line is
/// a row of empty cells (a one-column dataset with an empty value writes
/// exactly that). The first row is the header; every value comes back as a
/// string scalar. Short rows are padded with empty strings, so the output is
/// always key-homogeneous.
pub fn parse_csv(text: &str) -> Result<ExtractedDataset, ExtractError> {
    let mut rows = split_rows(text).into_iter();
    let headers = match rows.next() {
        Some(line) => read_row(line)?,
        None => Vec::new(),
    };
    if headers.is_empty() {
        return Ok(ExtractedDataset::default());
    }

    rows.map(|line| -> Result<ExtractionRecord, ExtractError> {
        let cells = read_row(line)?;
        Ok(headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), cells.get(i).map(String::as_str).unwrap_or("")))
            .collect::<ExtractionRecord>())
    })
    .collect()
}

/// Split on `\n` outside quoted cells. Doubled quotes toggle twice, so they
/// leave the quoting state unchanged.
fn split_rows(text: &str) -> Vec<&str> {
    let mut rows = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                rows.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    rows.push(&text[start..]);
    rows
}

/// Parse one logical row. The `csv` reader skips blank lines, so a line is
/// handed over on its own and an empty one yields no cells.
fn read_row(line: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_reader(line.as_bytes());

    match reader.records().next() {
        None => Ok(Vec::new()),
        Some(record) => record
            .map(|r| r.iter().map(str::to_string).collect())
            .map_err(|e| ExtractError::InvalidInput {
                input: "csv".into(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validate::parse_response;

    fn dataset(json: &str) -> ExtractedDataset {
        parse_response(json).expect("valid test json")
    }

    #[test]
    fn comma_cell_is_quoted() {
        let csv = to_csv(&dataset(r#"[{"a":"1,2","b":"x"}]"#)).unwrap();
        assert_eq!(csv, "a,b\n\"1,2\",x");
    }

    #[test]
    fn quotes_are_doubled_and_newlines_quoted() {
        let csv = to_csv(&dataset(r#"[{"q":"say \"hi\"","n":"two\nlines","plain":"ok"}]"#))
            .unwrap();
        assert_eq!(csv, "q,n,plain\n\"say \"\"hi\"\"\",\"two\nlines\",ok");
    }

    #[test]
    fn first_record_defines_columns() {
        let csv = to_csv(&dataset(
            r#"[{"name":"A","total":1},{"total":2,"extra":"dropped"},{"name":"C"}]"#,
        ))
        .unwrap();
        assert_eq!(csv, "name,total\nA,1\n,2\nC,");
    }

    #[test]
    fn null_renders_empty() {
        let csv = to_csv(&dataset(r#"[{"a":null,"b":true,"c":2.5}]"#)).unwrap();
        assert_eq!(csv, "a,b,c\n,true,2.5");
    }

    #[test]
    fn header_cells_are_escaped() {
        let csv = to_csv(&dataset(r#"[{"last, first":"Doe, J"}]"#)).unwrap();
        assert_eq!(csv, "\"last, first\"\n\"Doe, J\"");
    }

    #[test]
    fn empty_dataset_is_none() {
        assert_eq!(to_csv(&ExtractedDataset::default()), None);
    }

    #[test]
    fn no_trailing_newline() {
        let csv = to_csv(&dataset(r#"[{"a":1},{"a":2}]"#)).unwrap();
        assert!(!csv.ends_with('\n'));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn round_trip_is_stable_for_homogeneous_keys() {
        let ds = dataset(
            r#"[
                {"vendor":"Acme, Inc.","amount":12.5,"note":"said \"paid\""},
                {"vendor":"Beta","amount":3,"note":"multi\nline"},
                {"vendor":"Gamma","amount":null,"note":"plain"}
            ]"#,
        );
        let once = to_csv(&ds).unwrap();
        let twice = to_csv(&parse_csv(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    fn assert_round_trip(json: &str) {
        let once = to_csv(&dataset(json));
        let twice = once.as_deref().map(|csv| to_csv(&parse_csv(csv).unwrap()));
        assert_eq!(Some(once.clone()), twice, "round trip changed {json}");
    }

    #[test]
    fn round_trip_keeps_trailing_empty_single_column_row() {
        assert_eq!(to_csv(&dataset(r#"[{"a":"x"},{"a":""}]"#)).unwrap(), "a\nx\n");
        assert_round_trip(r#"[{"a":"x"},{"a":""}]"#);
        assert_round_trip(r#"[{"a":"x"},{"a":null}]"#);
        assert_round_trip(r#"[{"a":""},{"a":"y"},{"a":""}]"#);
    }

    #[test]
    fn round_trip_keeps_bare_carriage_return_in_cell() {
        assert_eq!(
            to_csv(&dataset(r#"[{"a":"x\ry","b":"z"}]"#)).unwrap(),
            "a,b\nx\ry,z"
        );
        assert_round_trip(r#"[{"a":"x\ry","b":"z"}]"#);
        assert_round_trip(r#"[{"a":"x\r"}]"#);
    }

    #[test]
    fn round_trip_single_null_record() {
        assert_round_trip(r#"[{"a":null}]"#);
        let ds = parse_csv("a\n").unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records()[0].get("a"), Some(&Scalar::from("")));
    }

    #[test]
    fn quoted_newline_does_not_split_rows() {
        let rows = split_rows("a,b\n\"x\ny\",z\n\"q\"\"\n\",w");
        assert_eq!(rows, vec!["a,b", "\"x\ny\",z", "\"q\"\"\n\",w"]);
    }

    #[test]
    fn empty_text_is_empty_dataset() {
        assert!(parse_csv("").unwrap().is_empty());
    }

    #[test]
    fn parse_csv_pads_short_rows() {
        let ds = parse_csv("a,b\n1\n2,3").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records()[0].get("b"), Some(&Scalar::from("")));
        assert_eq!(ds.records()[1].get("b"), Some(&Scalar::from("3")));
    }

    #[test]
    fn escape_borrows_when_clean() {
        assert!(matches!(escape_cell("clean"), Cow::Borrowed("clean")));
        assert_eq!(escape_cell("a\"b"), "\"a\"\"b\"");
    }
}
