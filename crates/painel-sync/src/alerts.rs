use std::collections::BTreeMap;

use painel_core::Record;
use serde_json::Value;

pub const DEFAULT_EXAM_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamOverbooking {
    pub date: String,
    pub total: usize,
}

// Dates scheduled more than `limit` times, earliest first.
pub fn exam_overbooking(records: &[Record], field: &str, limit: usize) -> Vec<ExamOverbooking> {
    let mut per_date = BTreeMap::<&str, usize>::new();
    for record in records {
        let Some(Value::String(date)) = record.get(field) else {
            continue;
        };
        let date = date.trim();
        if date.is_empty() {
            continue;
        }
        *per_date.entry(date).or_default() += 1;
    }

    per_date
        .into_iter()
        .filter(|(_, total)| *total > limit)
        .map(|(date, total)| ExamOverbooking {
            date: date.to_owned(),
            total,
        })
        .collect()
}
