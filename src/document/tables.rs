use super::{BoundingBox, TableRegion, TextSpan};

const MIN_TABLE_ROWS: usize = 3;
const MIN_TABLE_COLUMNS: usize = 2;
const MAX_CELL_CHARS: usize = 40;
const COLUMN_TOLERANCE: f64 = 4.0;
const MAX_ROW_GAP_FACTOR: f64 = 1.5;

#[derive(Debug)]
struct VisualRow<'a> {
    bbox: BoundingBox,
    cells: Vec<&'a TextSpan>,
}

impl VisualRow<'_> {
    fn is_tabular(&self) -> bool {
        self.cells.len() >= MIN_TABLE_COLUMNS
            && self.cells.iter().all(|cell| {
                let chars = cell.text.trim().chars().count();
                chars > 0 && chars <= MAX_CELL_CHARS
            })
    }

    fn aligns_with(&self, other: &VisualRow<'_>) -> bool {
        self.cells.len() == other.cells.len()
            && self
                .cells
                .iter()
                .zip(&other.cells)
                .all(|(left, right)| columns_align(&left.bbox, &right.bbox))
    }
}

fn columns_align(a: &BoundingBox, b: &BoundingBox) -> bool {
    let center_a = (a.x0 + a.x1) / 2.0;
    let center_b = (b.x0 + b.x1) / 2.0;
    (a.x0 - b.x0).abs() <= COLUMN_TOLERANCE
        || (a.x1 - b.x1).abs() <= COLUMN_TOLERANCE
        || (center_a - center_b).abs() <= COLUMN_TOLERANCE
}

/// Finds grid-like regions: at least three consecutive visual rows that split
/// into the same number of short, column-aligned cells.
pub(super) fn detect_tables(spans: &[TextSpan]) -> Vec<TableRegion> {
    let rows = group_visual_rows(spans);
    let mut tables = Vec::new();
    let mut run: Vec<&VisualRow<'_>> = Vec::new();

    for row in &rows {
        if !row.is_tabular() {
            flush_run(&mut run, &mut tables);
            continue;
        }

        let continues = match (run.first(), run.last()) {
            (Some(first), Some(previous)) => {
                let gap = row.bbox.top - previous.bbox.bottom;
                first.aligns_with(row) && gap <= previous.bbox.height() * MAX_ROW_GAP_FACTOR
            }
            _ => true,
        };

        if !continues {
            flush_run(&mut run, &mut tables);
        }
        run.push(row);
    }
    flush_run(&mut run, &mut tables);

    tables
}

fn flush_run(run: &mut Vec<&VisualRow<'_>>, tables: &mut Vec<TableRegion>) {
    if run.len() >= MIN_TABLE_ROWS {
        let bbox = run
            .iter()
            .skip(1)
            .fold(run[0].bbox, |acc, row| acc.union(&row.bbox));
        let rows = run
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|cell| cell.text.trim().to_string())
                    .collect()
            })
            .collect();
        tables.push(TableRegion { bbox, rows });
    }
    run.clear();
}

fn group_visual_rows(spans: &[TextSpan]) -> Vec<VisualRow<'_>> {
    let mut ordered = spans
        .iter()
        .filter(|span| !span.text.trim().is_empty())
        .collect::<Vec<&TextSpan>>();
    ordered.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut rows: Vec<VisualRow<'_>> = Vec::new();
    for span in ordered {
        if let Some(row) = rows.last_mut() {
            let tolerance = row.bbox.height().max(span.bbox.height()) * 0.5;
            if (span.bbox.top - row.bbox.top).abs() <= tolerance {
                row.bbox = row.bbox.union(&span.bbox);
                row.cells.push(span);
                continue;
            }
        }
        rows.push(VisualRow {
            bbox: span.bbox,
            cells: vec![span],
        });
    }

    for row in &mut rows {
        row.cells
            .sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    }
    rows
}
