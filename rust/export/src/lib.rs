// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Clash-Lite Export
//!
//! Renders a tabular overlap row set to self-contained HTML and JSON byte
//! payloads. Rows arrive pre-formatted as strings (numeric columns to 3
//! decimal places, done by the caller); both renderers key values by the
//! column headers and emit UTF-8 bytes.
//!
//! An empty byte payload is the caller's export-failure signal, so both
//! renderers always produce at least headers.

pub mod html;
pub mod json;

pub use html::export_to_html;
pub use json::export_to_json;

/// One column of the export schema.
#[derive(Debug, Clone)]
pub struct ExportColumnDef {
    /// Position of the column's value in each row.
    pub index: usize,
    /// Column header, also the JSON object key.
    pub header: &'static str,
    /// Numeric columns are right-aligned in HTML.
    pub numeric: bool,
}

impl ExportColumnDef {
    pub fn new(index: usize, header: &'static str) -> Self {
        Self {
            index,
            header,
            numeric: false,
        }
    }

    pub fn numeric(index: usize, header: &'static str) -> Self {
        Self {
            index,
            header,
            numeric: true,
        }
    }
}

/// Cell lookup tolerant of short rows.
pub(crate) fn cell<'a>(row: &'a [String], column: &ExportColumnDef) -> &'a str {
    row.get(column.index).map(String::as_str).unwrap_or("")
}
