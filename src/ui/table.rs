use tabled::{settings::Style, Table, Tabled};

use crate::checker::Finding;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

#[derive(Tabled)]
pub struct FindingRow {
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Target")]
    pub target: String,
}

impl From<&Finding> for FindingRow {
    fn from(finding: &Finding) -> Self {
        Self {
            status: finding.status.to_string(),
            source: finding.source.clone(),
            kind: finding.kind.clone(),
            target: finding.target.clone(),
        }
    }
}

pub fn findings_table(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let rows: Vec<FindingRow> = findings.iter().map(FindingRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
