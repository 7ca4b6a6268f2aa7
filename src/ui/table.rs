use crate::exemplar::ScoredExemplar;
use crate::normalize::Table;
use tabled::{builder::Builder, settings::Style, Tabled};

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct ExemplarRow {
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Question")]
    question: String,
    #[tabled(rename = "SQL")]
    answer: String,
}

/// Render a result table; the header row is the column list
pub fn result_table(table: &Table) -> String {
    let mut builder = Builder::new();
    builder.push_record(table.columns.iter().cloned());
    for row in &table.rows {
        builder.push_record(row.iter().map(|cell| cell.to_string()));
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn exemplar_table(ranked: &[ScoredExemplar]) -> String {
    if ranked.is_empty() {
        return String::new();
    }

    let rows: Vec<ExemplarRow> = ranked
        .iter()
        .map(|s| ExemplarRow {
            score: format!("{:.3}", s.score),
            question: s.exemplar.question.clone(),
            answer: s.exemplar.answer.clone(),
        })
        .collect();
    tabled::Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    if stats.is_empty() {
        return String::new();
    }

    let rows: Vec<StatRow> = stats
        .iter()
        .map(|(label, value)| StatRow {
            metric: label.to_string(),
            value: value.clone(),
        })
        .collect();
    tabled::Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exemplar::Exemplar;
    use crate::normalize::Cell;

    #[test]
    fn test_result_table_keeps_column_order() {
        let table = Table {
            columns: vec!["類別".into(), "平均".into()],
            rows: vec![
                vec![Cell::Text("飲料".into()), Cell::Number(12.5)],
                vec![Cell::Text("零食".into()), Cell::Null],
            ],
        };
        let out = result_table(&table);
        assert!(out.find("類別").unwrap() < out.find("平均").unwrap());
        assert!(out.contains("12.5"));
        assert!(out.find("飲料").unwrap() < out.find("零食").unwrap());
    }

    #[test]
    fn test_exemplar_table() {
        assert!(exemplar_table(&[]).is_empty());

        let ranked = vec![ScoredExemplar {
            exemplar: Exemplar::new("list items", "SELECT 商品 FROM \"sales\""),
            score: 0.91234,
        }];
        let out = exemplar_table(&ranked);
        assert!(out.contains("0.912"));
        assert!(out.contains("list items"));
    }

    #[test]
    fn test_stats_table() {
        let out = stats_table(&[("Tables", "2".to_string())]);
        assert!(out.contains("Metric"));
        assert!(out.contains("Tables"));
    }
}
