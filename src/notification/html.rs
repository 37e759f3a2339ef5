//! HTML body for the availability alert, rendered from
//! `templates/availability_alert.html`: a heading and one zebra-striped table
//! row per stamped item. Cell text is escaped by the template engine.

use askama::Template;

use super::NotificationError;
use crate::orchestration::report_aggregator::TableRow;

const COLUMNS: [&str; 6] = [
    "SKU",
    "Name",
    "Qty Available",
    "Min Qty",
    "Buildable",
    "Date Added",
];

/// Alert body bound to the availability alert template
#[derive(Template, Debug)]
#[template(path = "availability_alert.html")]
pub struct AlertTemplate<'a> {
    pub columns: &'a [&'a str],
    pub rows: &'a [TableRow],
}

impl<'a> AlertTemplate<'a> {
    pub fn new(rows: &'a [TableRow]) -> Self {
        Self {
            columns: &COLUMNS,
            rows,
        }
    }
}

/// Full message body for the given rows
pub fn render_body(rows: &[TableRow]) -> Result<String, NotificationError> {
    AlertTemplate::new(rows)
        .render()
        .map_err(|e| NotificationError::Render(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(key: &str, name: &str) -> TableRow {
        TableRow {
            business_key: key.to_string(),
            name: name.to_string(),
            available: 3,
            minimum: 5,
            buildable: 1,
            marker_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    #[test]
    fn test_body_has_header_and_one_row_per_item() {
        let body = render_body(&[row("K-A100", "Pomade Kit"), row("K-A200", "Gel Kit")]).unwrap();
        assert!(body.starts_with("<h3>The following SKU(s) are below the availability limit.</h3>"));
        assert_eq!(body.matches("<th ").count(), 6);
        assert_eq!(body.matches("<tr ").count(), 3);
        assert!(body.contains(">Qty Available</th>"));
        assert!(body.contains(">K-A100</td>"));
        assert!(body.contains(">2026-10-19</td>"));
    }

    #[test]
    fn test_odd_rows_are_striped() {
        let body = render_body(&[row("K-1", "a"), row("K-2", "b"), row("K-3", "c")]).unwrap();
        assert_eq!(body.matches("background-color: #ccc;").count(), 1);
    }

    #[test]
    fn test_empty_rows_render_header_only() {
        let body = render_body(&[]).unwrap();
        assert_eq!(body.matches("<tr ").count(), 1);
    }

    #[test]
    fn test_names_are_escaped() {
        let body = render_body(&[row("K-1", "<script>"), row("K-&", "Tom & Jerry")]).unwrap();
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
        assert!(body.contains("Tom &amp; Jerry"));
    }
}
