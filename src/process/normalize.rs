// src/process/normalize.rs
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// One row of cells as returned by the spreadsheet service.
pub type RawRow = Vec<String>;

/// Column name → cell value. `None` when the row stops before that column.
pub type Record = BTreeMap<String, Option<String>>;

/// Where the header lives, where data starts and which columns to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// 1-based index of the header row.
    pub header_row: usize,
    /// 0-based index of the first data row.
    pub data_start: usize,
    /// Number of leading header columns kept when `required_columns` is empty.
    pub column_window: usize,
    pub required_columns: Vec<String>,
    /// Drop records that lack any of `required_columns`.
    pub require_all_columns: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            header_row: 9,
            data_start: 9,
            column_window: 9,
            required_columns: Vec::new(),
            require_all_columns: true,
        }
    }
}

impl NormalizeOptions {
    /// How many header columns survive.
    pub fn window(&self) -> usize {
        if self.required_columns.is_empty() {
            self.column_window
        } else {
            self.required_columns.len()
        }
    }

    fn accepts(&self, record: &Record) -> bool {
        !self.require_all_columns
            || self
                .required_columns
                .iter()
                .all(|col| record.contains_key(col))
    }
}

/// Trimmed, non-blank cells of the header row. Empty if the sheet is too short.
pub fn headers(rows: &[RawRow], header_row: usize) -> Vec<String> {
    header_row
        .checked_sub(1)
        .and_then(|idx| rows.get(idx))
        .map(|row| {
            row.iter()
                .map(|h| h.trim())
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Turn a whole sheet into records, one per data row.
pub fn normalize(rows: &[RawRow], opts: &NormalizeOptions) -> Vec<Record> {
    let headers = headers(rows, opts.header_row);
    let window = opts.window();
    debug!(?headers, window, "normalizing sheet");

    let mut out = Vec::new();
    for row in rows.iter().skip(opts.data_start) {
        let record: Record = headers
            .iter()
            .enumerate()
            .take_while(|(idx, _)| *idx < window)
            .map(|(idx, header)| (header.clone(), row.get(idx).cloned()))
            .collect();

        if opts.accepts(&record) {
            out.push(record);
        } else {
            trace!(?record, "dropping record missing required columns");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 9] = [
        "Matricule",
        "Nom",
        "Prénom",
        "Etat",
        "Groupe TD",
        "Palier",
        "Spécialité",
        "Section",
        "N°",
    ];

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn header_first() -> NormalizeOptions {
        NormalizeOptions {
            header_row: 1,
            data_start: 1,
            ..Default::default()
        }
    }

    #[test]
    fn full_row_maps_in_order() {
        let values = [
            "202031045678",
            "Dupont",
            "Jean",
            "Inscrit",
            "G2",
            "L2",
            "Informatique",
            "A",
            "17",
        ];
        let rows = vec![row(&HEADER), row(&values)];

        let records = normalize(&rows, &header_first());
        assert_eq!(records.len(), 1);
        for (h, v) in HEADER.iter().zip(values.iter()) {
            assert_eq!(records[0][*h].as_deref(), Some(*v), "column {}", h);
        }
    }

    #[test]
    fn short_row_yields_absent_values() {
        let rows = vec![
            row(&HEADER),
            row(&["202031045678", "Dupont", "Jean", "Inscrit", "G2"]),
        ];

        let records = normalize(&rows, &header_first());
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.len(), 9);
        assert_eq!(rec["Groupe TD"].as_deref(), Some("G2"));
        for h in &HEADER[5..] {
            assert_eq!(rec[*h], None, "column {}", h);
        }
    }

    #[test]
    fn skips_metadata_rows_before_header() {
        let mut rows: Vec<RawRow> = (0..8).map(|i| row(&[&format!("meta {}", i)])).collect();
        rows.push(row(&["  Matricule ", "", "Nom"]));
        rows.push(row(&["1", "Dupont"]));
        rows.push(row(&["2", "Martin"]));

        let records = normalize(&rows, &NormalizeOptions::default());
        assert_eq!(records.len(), 2);
        // blank header cells are dropped, so "Nom" takes index 1
        assert_eq!(records[0]["Matricule"].as_deref(), Some("1"));
        assert_eq!(records[1]["Nom"].as_deref(), Some("Martin"));
    }

    #[test]
    fn window_follows_required_columns() {
        let opts = NormalizeOptions {
            required_columns: vec!["Matricule".into(), "Nom".into(), "Prénom".into()],
            ..header_first()
        };
        let rows = vec![row(&HEADER), row(&["1", "Dupont", "Jean", "Inscrit"])];

        let records = normalize(&rows, &opts);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].keys().cloned().collect::<Vec<_>>(),
            vec!["Matricule", "Nom", "Prénom"]
        );
    }

    #[test]
    fn required_filter_is_configurable() {
        let rows = vec![row(&["Matricule", "Nom"]), row(&["1", "Dupont"])];
        let strict = NormalizeOptions {
            required_columns: vec!["Matricule".into(), "Section".into()],
            ..header_first()
        };
        assert!(normalize(&rows, &strict).is_empty());

        let lax = NormalizeOptions {
            require_all_columns: false,
            ..strict
        };
        let records = normalize(&rows, &lax);
        assert_eq!(records.len(), 1);
        assert!(!records[0].contains_key("Section"));
    }

    #[test]
    fn sheet_shorter_than_header_row_is_empty() {
        let rows = vec![row(&["only"]), row(&["two"])];
        assert!(normalize(&rows, &NormalizeOptions::default()).is_empty());
        assert!(headers(&rows, 0).is_empty());
    }
}
