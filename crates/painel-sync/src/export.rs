use painel_core::{CoreError, Record};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportColumn {
    pub header: &'static str,
    pub field: &'static str,
    pub fallback: &'static str,
}

impl ExportColumn {
    pub const fn new(header: &'static str, field: &'static str) -> Self {
        Self {
            header,
            field,
            fallback: "",
        }
    }

    pub const fn or(self, fallback: &'static str) -> Self {
        Self { fallback, ..self }
    }

    fn cell(&self, record: &Record) -> String {
        match record.get(self.field) {
            None | Some(Value::Null) => self.fallback.to_owned(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Writes the held collection as CSV, one header row followed by one row per record.
pub fn export_csv(records: &[Record], columns: &[ExportColumn]) -> Result<Vec<u8>, CoreError> {
    if columns.is_empty() {
        return Err(CoreError::Configuration(
            "export needs at least one column".to_owned(),
        ));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(columns.iter().map(|column| column.header))
        .map_err(export_error)?;
    for record in records {
        writer
            .write_record(columns.iter().map(|column| column.cell(record)))
            .map_err(export_error)?;
    }
    writer.into_inner().map_err(export_error)
}

fn export_error(error: impl std::fmt::Display) -> CoreError {
    CoreError::Configuration(format!("failed to write export: {error}"))
}
