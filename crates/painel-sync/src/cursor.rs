use std::collections::BTreeMap;

use painel_core::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, String>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    // Blank values clear the filter instead of sending `name=`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            self.0.remove(&name);
        } else {
            self.0.insert(name, value.to_owned());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self, recognized: &[String]) -> Result<(), CoreError> {
        let unknown = self
            .0
            .keys()
            .filter(|name| !recognized.contains(name))
            .cloned()
            .collect::<Vec<_>>();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Configuration(format!(
                "unrecognized filters: {}",
                unknown.join(", ")
            )))
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    offset: usize,
    limit: usize,
}

impl SyncCursor {
    pub fn new(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn next_page(&mut self) {
        self.offset = self.offset.saturating_add(self.limit);
    }

    pub fn previous_page(&mut self) {
        self.offset = self.offset.saturating_sub(self.limit);
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        vec![
            ("limit".to_owned(), self.limit.to_string()),
            ("offset".to_owned(), self.offset.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_dropped() {
        let filters = Filters::new()
            .with("dataInicio", "2026-01-01")
            .with("roteiro", "   ");
        assert_eq!(
            filters.to_query(),
            vec![("dataInicio".to_owned(), "2026-01-01".to_owned())]
        );

        let cleared = filters.with("dataInicio", "");
        assert!(cleared.is_empty());
    }

    #[test]
    fn unknown_filters_are_rejected() {
        let recognized = vec!["roteiro".to_owned()];
        assert!(Filters::new().with("roteiro", "Vigilante").validate(&recognized).is_ok());
        let error = Filters::new()
            .with("setor", "B")
            .validate(&recognized)
            .expect_err("unknown filter");
        assert!(error.to_string().contains("setor"));
    }

    #[test]
    fn offset_never_goes_below_zero() {
        let mut cursor = SyncCursor::new(20);
        cursor.previous_page();
        assert_eq!(cursor.offset(), 0);

        cursor.next_page();
        cursor.next_page();
        assert_eq!(cursor.offset(), 40);
        cursor.previous_page();
        assert_eq!(cursor.offset(), 20);
        cursor.reset();
        assert_eq!(cursor.to_query()[1], ("offset".to_owned(), "0".to_owned()));
    }
}
