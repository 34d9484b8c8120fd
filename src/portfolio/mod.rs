//! Broker statement parsing and holdings merge.
//!
//! The statement is the CSV export of the broker's positions screen: banner
//! and label rows mixed in with position rows, numbers quoted with thousands
//! separators. Position rows are the ones where every non-empty cell is
//! numeric; columns are positional within those rows.

use crate::models::Snapshot;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

// Column positions in a position row, counted after empty cells are dropped.
const COL_COST_PRICE: usize = 4;
const COL_QUANTITY: usize = 6;
const COL_CODE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub quantity: u32,
    pub cost_price: f64,
}

/// Parse the statement into code → position. `None` means the file could not
/// be read at all; the acquisition run carries on without holdings either way.
pub fn load_positions(path: &Path) -> Option<HashMap<u32, Position>> {
    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            warn!("portfolio statement {path:?} could not be opened: {e}");
            return None;
        }
    };

    let mut positions = HashMap::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("portfolio statement row {}: {e}", i + 1);
                continue;
            }
        };

        let fields: Vec<String> = record
            .iter()
            .map(|f| f.trim().replace(',', ""))
            .filter(|f| !f.is_empty())
            .collect();

        // Banner, header and label rows all carry text; positions are
        // all-numeric.
        if fields.is_empty() || !fields.iter().all(|f| f.parse::<f64>().is_ok()) {
            continue;
        }

        match position_from(&fields) {
            Some((code, position)) => {
                positions.insert(code, position);
            }
            None => warn!("portfolio statement row {} is numeric but too short: {fields:?}", i + 1),
        }
    }

    info!("portfolio statement: {} positions", positions.len());
    Some(positions)
}

fn position_from(fields: &[String]) -> Option<(u32, Position)> {
    let code = fields.get(COL_CODE)?.parse().ok()?;
    let quantity = fields.get(COL_QUANTITY)?.parse().ok()?;
    let cost_price = fields.get(COL_COST_PRICE)?.parse().ok()?;
    Some((code, Position { quantity, cost_price }))
}

/// Attach holdings to today's stocks. A tracked stock missing from the
/// statement is logged and left without a position; this step never fails.
pub fn merge(snapshot: &mut Snapshot, positions: &HashMap<u32, Position>) {
    for stock in &mut snapshot.stocks {
        match positions.get(&stock.code) {
            Some(position) => {
                stock.quantity_owned = Some(position.quantity);
                stock.cost_price = Some(position.cost_price);
            }
            None => warn!("portfolio statement has no position for stock {}", stock.code),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, Stock};
    use chrono::Utc;
    use std::io::Write;

    const STATEMENT: &str = "\
Portfolio Statement,,,,,,,\n\
Account,12345678,,,,,,\n\
Cost,Market,,Avg,Cost,Gain,Qty,Symbol\n\
1,2.5,3,\"25.10\",\"25,400.00\",5,\"1,000\",1120\n\
1,2.5,3,\"80.00\",\"4,000.00\",5,50,7010\n\
Total,,,,\"29,400.00\",,,\n";

    fn write_statement(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_position_rows_and_skips_labels() {
        let file = write_statement(STATEMENT);
        let positions = load_positions(file.path()).unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(
            positions[&1120],
            Position { quantity: 1000, cost_price: 25400.0 }
        );
        assert_eq!(positions[&7010], Position { quantity: 50, cost_price: 4000.0 });
    }

    #[test]
    fn missing_file_is_none() {
        assert!(load_positions(Path::new("/nonexistent/statement.csv")).is_none());
    }

    #[test]
    fn merge_fills_holdings_and_tolerates_misses() {
        let at = Utc::now().naive_utc();
        let mut snapshot = Snapshot::assemble(
            Utc::now().date_naive(),
            vec![Stock::empty(1120, at), Stock::empty(9999, at)],
        );

        let mut positions = HashMap::new();
        positions.insert(1120, Position { quantity: 10, cost_price: 250.0 });

        merge(&mut snapshot, &positions);
        assert_eq!(snapshot.stocks[0].quantity_owned, Some(10));
        assert_eq!(snapshot.stocks[0].cost_price, Some(250.0));
        assert_eq!(snapshot.stocks[1].quantity_owned, None);
        assert_eq!(snapshot.stocks[1].cost_price, None);
    }
}
