//! Reading one column out of delimited text and filling in missing cells.

use std::io::BufRead;

use rand::Rng;

use dpcreator_core::{DpError, MissingValuesHandling, Result};

/// Physical layout of a delimited data file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    /// Field separator.
    pub separator: char,
    /// Column names in file order.
    pub column_names: Vec<String>,
    /// Whether the first line is a header row.
    pub has_header: bool,
}

impl DataLayout {
    /// Layout with a header row.
    pub fn new(separator: char, column_names: Vec<String>) -> Self {
        Self {
            separator,
            column_names,
            has_header: true,
        }
    }

    /// Set whether the first line is a header.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

/// Extract the cells of column `col_index`; empty cells become `None`.
///
/// `variable` must sit at `col_index` in the layout. Every row must have
/// exactly as many fields as the layout has columns.
pub fn read_column<R: BufRead>(
    reader: R,
    layout: &DataLayout,
    col_index: usize,
    variable: &str,
) -> Result<Vec<Option<String>>> {
    match layout.column_names.get(col_index) {
        Some(name) if name == variable => {}
        Some(name) => {
            return Err(DpError::data(format!(
                "Column {col_index} is \"{name}\", expected \"{variable}\"."
            )))
        }
        None => {
            return Err(DpError::data(format!(
                "Column index {col_index} is outside the {} columns of the data file.",
                layout.column_names.len()
            )))
        }
    }

    let width = layout.column_names.len();
    let mut cells = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DpError::data(format!("Failed to read the data file: {e}")))?;
        if line_no == 0 && layout.has_header {
            continue;
        }
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line, layout.separator);
        if fields.len() != width {
            return Err(DpError::data(format!(
                "Row {} has {} columns, expected {width}.",
                line_no + 1,
                fields.len()
            )));
        }
        let cell = fields[col_index].trim();
        cells.push(if cell.is_empty() {
            None
        } else {
            Some(cell.to_string())
        });
    }
    Ok(cells)
}

/// Split one row on `separator`, honouring double-quoted fields.
///
/// Quotes are removed; `""` inside a quoted field is a literal quote.
pub fn split_fields(line: &str, separator: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == separator && !quoted => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Parse cells as floats, treating unparsable cells as missing.
pub fn parse_floats(cells: &[Option<String>]) -> Vec<Option<f64>> {
    cells
        .iter()
        .map(|c| {
            c.as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|x| x.is_finite())
        })
        .collect()
}

/// Parse cells as integers, accepting integral floats such as `3.0`.
pub fn parse_integers(cells: &[Option<String>]) -> Vec<Option<i64>> {
    cells
        .iter()
        .map(|c| {
            let s = c.as_deref()?;
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite() && x.fract() == 0.0)
                    .map(|x| x as i64)
            })
        })
        .collect()
}

/// Apply the missing value policy to numeric data and clamp to `[min, max]`.
pub fn impute_numeric<R: Rng + ?Sized>(
    values: Vec<Option<f64>>,
    handling: MissingValuesHandling,
    fixed: Option<f64>,
    (min, max): (f64, f64),
    integer: bool,
    rng: &mut R,
) -> Vec<f64> {
    values
        .into_iter()
        .filter_map(|v| match (v, handling) {
            (Some(x), _) => Some(x),
            (None, MissingValuesHandling::InsertFixed) => fixed,
            (None, MissingValuesHandling::InsertRandom) => {
                let (lo, hi) = if integer {
                    (min.ceil(), max.floor())
                } else {
                    (min, max)
                };
                Some(if lo >= hi {
                    lo
                } else if integer {
                    rng.gen_range(lo as i64..=hi as i64) as f64
                } else {
                    rng.gen_range(lo..=hi)
                })
            }
            (None, _) => None,
        })
        .map(|x| x.clamp(min, max))
        .collect()
}

/// Truncate or pad `values` to exactly `n` entries.
pub fn resize(mut values: Vec<f64>, n: usize, pad: f64) -> Vec<f64> {
    values.resize(n, pad);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Cursor;

    fn layout() -> DataLayout {
        DataLayout::new(',', vec!["id".into(), "age".into()])
    }

    #[test]
    fn reads_selected_column_and_skips_header() {
        let data = "id,age\n1,30\n2,\n3,\"41\"\n\n";
        let cells = read_column(Cursor::new(data), &layout(), 1, "age").expect("cells");
        assert_eq!(
            cells,
            vec![Some("30".to_string()), None, Some("41".to_string())]
        );
    }

    #[test]
    fn wrong_column_count_is_a_data_error() {
        let data = "id,age\n1,30,extra\n";
        let err = read_column(Cursor::new(data), &layout(), 1, "age").unwrap_err();
        assert!(err.to_string().contains("Row 2 has 3 columns"));
    }

    #[test]
    fn quoted_cells_may_contain_the_separator() {
        let layout = DataLayout::new(',', vec!["id".into(), "city".into()]);
        let data = "id,city\n1,\"Boston, MA\"\n2,Denver\n3,\"say \"\"hi\"\"\"\n";
        let cells = read_column(Cursor::new(data), &layout, 1, "city").expect("cells");
        assert_eq!(
            cells,
            vec![
                Some("Boston, MA".to_string()),
                Some("Denver".to_string()),
                Some("say \"hi\"".to_string())
            ]
        );
        assert_eq!(split_fields("a\t\"b\tc\"", '\t'), vec!["a", "b\tc"]);
    }

    #[test]
    fn column_ordering_must_match_variable() {
        let err = read_column(Cursor::new("1,2\n"), &layout(), 0, "age").unwrap_err();
        assert!(matches!(err, DpError::Data { .. }));
        let err = read_column(Cursor::new("1,2\n"), &layout(), 5, "age").unwrap_err();
        assert!(matches!(err, DpError::Data { .. }));
    }

    #[test]
    fn imputation_policies() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let values = vec![Some(5.0), None, Some(50.0)];
        let dropped = impute_numeric(
            values.clone(),
            MissingValuesHandling::Drop,
            None,
            (0.0, 10.0),
            false,
            &mut rng,
        );
        assert_eq!(dropped, vec![5.0, 10.0]);
        let fixed = impute_numeric(
            values.clone(),
            MissingValuesHandling::InsertFixed,
            Some(2.0),
            (0.0, 10.0),
            false,
            &mut rng,
        );
        assert_eq!(fixed, vec![5.0, 2.0, 10.0]);
        let random = impute_numeric(
            values,
            MissingValuesHandling::InsertRandom,
            None,
            (0.0, 10.0),
            true,
            &mut rng,
        );
        assert_eq!(random.len(), 3);
        assert!(random[1] >= 0.0 && random[1] <= 10.0 && random[1].fract() == 0.0);
    }

    #[test]
    fn parse_integers_accepts_integral_floats() {
        let cells = vec![Some("3".into()), Some("4.0".into()), Some("4.5".into()), None];
        assert_eq!(parse_integers(&cells), vec![Some(3), Some(4), None, None]);
    }

    #[test]
    fn resize_pads_and_truncates() {
        assert_eq!(resize(vec![1.0, 2.0], 3, 0.5), vec![1.0, 2.0, 0.5]);
        assert_eq!(resize(vec![1.0, 2.0, 3.0], 2, 0.5), vec![1.0, 2.0]);
    }
}
