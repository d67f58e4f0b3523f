// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Self-contained HTML report.

use crate::{cell, ExportColumnDef};
use std::fmt::Write;

/// Render the row set as a standalone HTML document.
///
/// The document is titled with `title` and names the source stage path
/// below the heading. Returns UTF-8 bytes; never empty.
pub fn export_to_html(
    title: &str,
    stage_path: &str,
    columns: &[ExportColumnDef],
    rows: &[Vec<String>],
) -> Vec<u8> {
    let mut out = String::with_capacity(1024 + rows.len() * 128);

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{} - {}</title>", escape(title), escape(stage_path));
    out.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 2em; }\n\
         table { border-collapse: collapse; }\n\
         th, td { border: 1px solid #999; padding: 4px 8px; }\n\
         th { background: #eee; }\n\
         td.num { text-align: right; }\n\
         </style>\n</head>\n<body>\n",
    );
    let _ = writeln!(out, "<h1>{}</h1>", escape(title));
    let _ = writeln!(out, "<p>Stage: <code>{}</code></p>", escape(stage_path));

    out.push_str("<table>\n<tr>");
    for column in columns {
        let _ = write!(out, "<th>{}</th>", escape(column.header));
    }
    out.push_str("</tr>\n");

    for row in rows {
        out.push_str("<tr>");
        for column in columns {
            let class = if column.numeric { " class=\"num\"" } else { "" };
            let _ = write!(out, "<td{}>{}</td>", class, escape(cell(row, column)));
        }
        out.push_str("</tr>\n");
    }

    out.push_str("</table>\n</body>\n</html>\n");
    out.into_bytes()
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
