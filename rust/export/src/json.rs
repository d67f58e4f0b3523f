// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON row-object export.

use crate::{cell, ExportColumnDef};
use serde_json::{Map, Value};

/// Render the row set as a JSON array of objects keyed by the column
/// headers. All values are strings, pre-formatted by the caller. Returns
/// UTF-8 bytes; an empty row set renders as `[]`, never zero bytes.
pub fn export_to_json(columns: &[ExportColumnDef], rows: &[Vec<String>]) -> Vec<u8> {
    let array: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut object = Map::with_capacity(columns.len());
            for column in columns {
                object.insert(
                    column.header.to_string(),
                    Value::String(cell(row, column).to_string()),
                );
            }
            Value::Object(object)
        })
        .collect();
    serde_json::to_vec_pretty(&array).expect("string table serializes")
}
