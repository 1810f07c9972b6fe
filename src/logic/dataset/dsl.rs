//! DSL strong-password benchmark rows
//!
//! Each row of the benchmark holds per-key timings (seconds) for the same
//! password: `H.*` hold times, `DD.*` keydown-to-keydown times and `UD.*`
//! keyup-to-keydown times. Rows convert into raw captures for import.

use std::collections::HashMap;
use std::io::{self, BufRead};

use super::partition_user;
use super::record::{NewCapture, RawKeystrokeCapture};
use crate::error::{BioAuthError, Result};

pub const HOLD_COLUMNS: &[&str] = &[
    "H.period", "H.t", "H.i", "H.e", "H.five", "H.Shift.r", "H.o", "H.a", "H.n", "H.l",
    "H.Return",
];

pub const DOWN_DOWN_COLUMNS: &[&str] = &[
    "DD.period.t", "DD.t.i", "DD.i.e", "DD.e.five", "DD.five.Shift.r", "DD.Shift.r.o",
    "DD.o.a", "DD.a.n", "DD.n.l", "DD.l.Return",
];

pub const UP_DOWN_COLUMNS: &[&str] = &[
    "UD.period.t", "UD.t.i", "UD.i.e", "UD.e.five", "UD.five.Shift.r", "UD.Shift.r.o",
    "UD.o.a", "UD.a.n", "UD.n.l", "UD.l.Return",
];

/// An up-down gap must exceed the down-down gap by this much (s) to count
/// as a hesitation.
const PAUSE_MARGIN: f64 = 0.05;

/// Convert one benchmark row (column name → seconds). Missing columns are
/// skipped.
pub fn row_to_capture(row: &HashMap<String, f64>) -> RawKeystrokeCapture {
    let dwell_times: Vec<f64> = HOLD_COLUMNS
        .iter()
        .filter_map(|c| row.get(*c).copied())
        .collect();
    let flight_times: Vec<f64> = DOWN_DOWN_COLUMNS
        .iter()
        .filter_map(|c| row.get(*c).copied())
        .collect();

    let pause_patterns = UP_DOWN_COLUMNS
        .iter()
        .enumerate()
        .filter_map(|(i, col)| {
            let ud = row.get(*col).copied()?;
            let dd = flight_times.get(i).copied()?;
            (ud > dd + PAUSE_MARGIN).then_some(ud - dd)
        })
        .collect();

    let total: f64 = dwell_times.iter().sum::<f64>() + flight_times.iter().sum::<f64>();
    let typing_speed = if total > 0.0 {
        dwell_times.len() as f64 / total
    } else {
        0.0
    };

    RawKeystrokeCapture {
        dwell_times,
        flight_times,
        pause_patterns,
        typing_speed,
    }
}

/// Read a DSL benchmark CSV. Each subject becomes a user; its rows are
/// labeled 70/15/15 in file order.
pub fn read_dsl_csv<R: BufRead>(reader: R) -> Result<Vec<NewCapture>> {
    let mut lines = reader.lines();
    let header: Vec<String> = match lines.next() {
        Some(line) => line?.split(',').map(|c| c.trim().to_string()).collect(),
        None => return Ok(Vec::new()),
    };
    let column = |name: &str| header.iter().position(|c| c == name);
    let subject_col = column("subject").ok_or_else(|| invalid("missing subject column"))?;
    let session_col = column("sessionIndex");
    let rep_col = column("rep");

    let mut order: Vec<String> = Vec::new();
    let mut by_subject: HashMap<String, Vec<NewCapture>> = HashMap::new();

    for (line_no, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != header.len() {
            return Err(invalid(&format!(
                "row {} has {} fields, header has {}",
                line_no + 2,
                fields.len(),
                header.len()
            )));
        }

        let mut row = HashMap::new();
        for (name, value) in header.iter().zip(&fields) {
            if name.starts_with("H.") || name.starts_with("DD.") || name.starts_with("UD.") {
                let parsed = value.parse::<f64>().map_err(|_| {
                    invalid(&format!("row {}: bad {} value {:?}", line_no + 2, name, value))
                })?;
                row.insert(name.clone(), parsed);
            }
        }

        let subject = fields[subject_col].to_string();
        let field = |col: Option<usize>| col.map_or("0", |c| fields[c]);
        let session_id = format!("{}_s{}_r{}", subject, field(session_col), field(rep_col));

        if !by_subject.contains_key(&subject) {
            order.push(subject.clone());
        }
        by_subject
            .entry(subject.clone())
            .or_default()
            .push(NewCapture::live(&subject, &session_id, row_to_capture(&row)));
    }

    let mut captures = Vec::new();
    for subject in order {
        if let Some(rows) = by_subject.remove(&subject) {
            captures.extend(partition_user(rows));
        }
    }
    log::info!("Parsed {} DSL rows", captures.len());
    Ok(captures)
}

fn invalid(msg: &str) -> BioAuthError {
    BioAuthError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.to_string()))
}
