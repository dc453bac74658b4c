use std::collections::BTreeMap;
use std::time::Duration;

use painel_core::{
    encode_path_segment, CoreError, HttpMethod, RecordKey, SessionScope, WriteRequest,
};
use serde_json::{json, Map, Value};

use crate::export::ExportColumn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareFields {
    All,
    Only(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldBody {
    // `{ "valor": value }`
    Valor,
    // `{ "<field>": value }`
    Named,
    // `{ "campo": field, "valor": value }`
    CampoValor,
    // `{ "<name>": value }` when the server names the field differently
    Alias(&'static str),
}

// Path templates accept `{resource}`, `{key}` and `{field}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub method: HttpMethod,
    pub path: String,
    pub body: FieldBody,
}

impl FieldWrite {
    pub fn patch(path: impl Into<String>, body: FieldBody) -> Self {
        Self {
            method: HttpMethod::Patch,
            path: path.into(),
            body,
        }
    }

    pub fn put(path: impl Into<String>, body: FieldBody) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRoute {
    pub method: HttpMethod,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSpec {
    name: String,
    scope: SessionScope,
    resource: String,
    key_field: String,
    compare: CompareFields,
    default_write: Option<FieldWrite>,
    field_writes: BTreeMap<String, FieldWrite>,
    create_path: Option<String>,
    delete_path: Option<String>,
    actions: BTreeMap<String, ActionRoute>,
    filters: Vec<String>,
    page_size: Option<usize>,
    companion: Option<String>,
    poll_interval: Option<Duration>,
    poll_resets_cursor: bool,
    export_columns: &'static [ExportColumn],
}

impl ScreenSpec {
    pub fn builder(
        name: impl Into<String>,
        resource: impl Into<String>,
        key_field: impl Into<String>,
    ) -> ScreenSpecBuilder {
        ScreenSpecBuilder {
            spec: ScreenSpec {
                name: name.into(),
                scope: SessionScope::Main,
                resource: resource.into(),
                key_field: key_field.into(),
                compare: CompareFields::All,
                default_write: None,
                field_writes: BTreeMap::new(),
                create_path: None,
                delete_path: None,
                actions: BTreeMap::new(),
                filters: Vec::new(),
                page_size: None,
                companion: None,
                poll_interval: None,
                poll_resets_cursor: false,
                export_columns: &[],
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> SessionScope {
        self.scope
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn compare(&self) -> &CompareFields {
        &self.compare
    }

    pub fn recognized_filters(&self) -> &[String] {
        &self.filters
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn companion(&self) -> Option<&str> {
        self.companion.as_deref()
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    pub fn poll_resets_cursor(&self) -> bool {
        self.poll_resets_cursor
    }

    pub fn export_columns(&self) -> &'static [ExportColumn] {
        self.export_columns
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval).filter(|interval| !interval.is_zero());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        if self.page_size.is_some() && page_size > 0 {
            self.page_size = Some(page_size);
        }
        self
    }

    pub fn is_editable(&self, field: &str) -> bool {
        self.field_write(field).is_some()
    }

    fn field_write(&self, field: &str) -> Option<&FieldWrite> {
        if field == self.key_field {
            return None;
        }
        self.field_writes.get(field).or(self.default_write.as_ref())
    }

    pub fn field_request(
        &self,
        key: &RecordKey,
        field: &str,
        value: Value,
    ) -> Result<WriteRequest, CoreError> {
        let route = self.field_write(field).ok_or_else(|| {
            CoreError::Configuration(format!(
                "field `{field}` is not editable on the {} screen",
                self.name
            ))
        })?;

        let body = match route.body {
            FieldBody::Valor => json!({ "valor": value }),
            FieldBody::Named => {
                let mut body = Map::new();
                body.insert(field.to_owned(), value);
                Value::Object(body)
            }
            FieldBody::CampoValor => json!({ "campo": field, "valor": value }),
            FieldBody::Alias(name) => {
                let mut body = Map::new();
                body.insert(name.to_owned(), value);
                Value::Object(body)
            }
        };
        Ok(
            WriteRequest::new(self.scope, route.method, self.render(&route.path, key, field))
                .with_body(body),
        )
    }

    pub fn create_request(&self, fields: Value) -> Result<WriteRequest, CoreError> {
        let path = self.create_path.as_deref().ok_or_else(|| {
            CoreError::Configuration(format!("the {} screen does not create records", self.name))
        })?;
        Ok(
            WriteRequest::new(self.scope, HttpMethod::Post, self.render(path, &RecordKey::new(""), ""))
                .with_body(fields),
        )
    }

    pub fn delete_request(&self, key: &RecordKey) -> Result<WriteRequest, CoreError> {
        let path = self.delete_path.as_deref().ok_or_else(|| {
            CoreError::Configuration(format!("the {} screen does not delete records", self.name))
        })?;
        Ok(WriteRequest::new(
            self.scope,
            HttpMethod::Delete,
            self.render(path, key, ""),
        ))
    }

    pub fn action_request(&self, action: &str, key: &RecordKey) -> Result<WriteRequest, CoreError> {
        let route = self.actions.get(action).ok_or_else(|| {
            CoreError::Configuration(format!(
                "action `{action}` is not available on the {} screen",
                self.name
            ))
        })?;
        Ok(WriteRequest::new(
            self.scope,
            route.method,
            self.render(&route.path, key, ""),
        ))
    }

    // The resource is already a path; keys and fields are single segments.
    fn render(&self, template: &str, key: &RecordKey, field: &str) -> String {
        template
            .replace("{resource}", self.resource.trim_end_matches('/'))
            .replace("{key}", &key.path_segment())
            .replace("{field}", &encode_path_segment(field))
    }
}

#[derive(Debug, Clone)]
pub struct ScreenSpecBuilder {
    spec: ScreenSpec,
}

impl ScreenSpecBuilder {
    pub fn scope(mut self, scope: SessionScope) -> Self {
        self.spec.scope = scope;
        self
    }

    pub fn compare_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.compare = CompareFields::Only(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_write(mut self, write: FieldWrite) -> Self {
        self.spec.default_write = Some(write);
        self
    }

    pub fn field_write(mut self, field: impl Into<String>, write: FieldWrite) -> Self {
        self.spec.field_writes.insert(field.into(), write);
        self
    }

    pub fn create_path(mut self, path: impl Into<String>) -> Self {
        self.spec.create_path = Some(path.into());
        self
    }

    pub fn delete_path(mut self, path: impl Into<String>) -> Self {
        self.spec.delete_path = Some(path.into());
        self
    }

    pub fn action(
        mut self,
        name: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        self.spec.actions.insert(
            name.into(),
            ActionRoute {
                method,
                path: path.into(),
            },
        );
        self
    }

    pub fn filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.spec.page_size = Some(page_size);
        self
    }

    pub fn companion(mut self, resource: impl Into<String>) -> Self {
        self.spec.companion = Some(resource.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.spec.poll_interval = Some(interval);
        self
    }

    pub fn poll_resets_cursor(mut self, resets: bool) -> Self {
        self.spec.poll_resets_cursor = resets;
        self
    }

    pub fn export_columns(mut self, columns: &'static [ExportColumn]) -> Self {
        self.spec.export_columns = columns;
        self
    }

    pub fn build(self) -> Result<ScreenSpec, CoreError> {
        let mut spec = self.spec;
        if spec.name.trim().is_empty() {
            return Err(CoreError::Configuration(
                "screen name must not be empty".to_owned(),
            ));
        }
        if !spec.resource.starts_with('/') {
            return Err(CoreError::Configuration(format!(
                "resource for the {} screen must start with '/': {}",
                spec.name, spec.resource
            )));
        }
        if spec.key_field.trim().is_empty() {
            return Err(CoreError::Configuration(format!(
                "key field for the {} screen must not be empty",
                spec.name
            )));
        }
        if spec.page_size == Some(0) {
            return Err(CoreError::Configuration(format!(
                "page size for the {} screen must be positive",
                spec.name
            )));
        }
        if spec.poll_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(CoreError::Configuration(format!(
                "poll interval for the {} screen must be positive",
                spec.name
            )));
        }

        if let CompareFields::Only(fields) = &mut spec.compare {
            fields.retain(|field| !field.trim().is_empty());
            if !fields.iter().any(|field| field == &spec.key_field) {
                fields.insert(0, spec.key_field.clone());
            }
            let mut seen = std::collections::BTreeSet::new();
            fields.retain(|field| seen.insert(field.clone()));
        }
        spec.filters.retain(|filter| !filter.trim().is_empty());
        spec.filters.sort();
        spec.filters.dedup();

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agenda() -> ScreenSpec {
        ScreenSpec::builder("agendamento", "/mrhsagendamento", "mrh")
            .compare_fields(["exame", "uniformes"])
            .default_write(FieldWrite::patch("{resource}/{field}/{key}", FieldBody::Valor))
            .build()
            .expect("build spec")
    }

    #[test]
    fn key_field_is_always_compared() {
        let spec = agenda();
        assert_eq!(
            spec.compare(),
            &CompareFields::Only(vec![
                "mrh".to_owned(),
                "exame".to_owned(),
                "uniformes".to_owned()
            ])
        );
    }

    #[test]
    fn field_requests_render_path_and_body() {
        let request = agenda()
            .field_request(&RecordKey::from("101"), "exame", json!("2026-03-02"))
            .expect("editable field");
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(request.path, "/mrhsagendamento/exame/101");
        assert_eq!(request.body, Some(json!({ "valor": "2026-03-02" })));
    }

    #[test]
    fn key_field_is_never_editable() {
        let error = agenda()
            .field_request(&RecordKey::from("101"), "mrh", json!(102))
            .expect_err("key is read-only");
        assert!(matches!(error, CoreError::Configuration(_)));
    }

    #[test]
    fn field_specific_routes_override_the_default() {
        let spec = ScreenSpec::builder("candidatos", "/candidatos/7", "id")
            .default_write(FieldWrite::put("/candidatos/validacao/{key}", FieldBody::CampoValor))
            .field_write("status", FieldWrite::put("/candidatos/status/{key}", FieldBody::Named))
            .build()
            .expect("build spec");

        let status = spec
            .field_request(&RecordKey::from("3"), "status", json!("aprovado"))
            .expect("status route");
        assert_eq!(status.path, "/candidatos/status/3");
        assert_eq!(status.body, Some(json!({ "status": "aprovado" })));

        let other = spec
            .field_request(&RecordKey::from("3"), "rg_ok", json!(true))
            .expect("default route");
        assert_eq!(other.path, "/candidatos/validacao/3");
        assert_eq!(other.body, Some(json!({ "campo": "rg_ok", "valor": true })));
    }

    #[test]
    fn keys_are_encoded_as_single_path_segments() {
        let spec = ScreenSpec::builder("arquivos", "/mrhsdocumentacao/arquivos", "nome")
            .delete_path("{resource}/{key}")
            .build()
            .expect("build spec");

        let request = spec
            .delete_request(&RecordKey::from("ASO joao/v2.pdf"))
            .expect("delete route");
        assert_eq!(request.path, "/mrhsdocumentacao/arquivos/ASO%20joao%2Fv2.pdf");
    }

    #[test]
    fn aliased_bodies_use_the_server_field_name() {
        let spec = ScreenSpec::builder("itens", "/mrhsdocumentacao/itens/1", "id")
            .field_write(
                "concluido",
                FieldWrite::patch("/checkdocs/item/{key}/check", FieldBody::Alias("checked")),
            )
            .build()
            .expect("build spec");

        let request = spec
            .field_request(&RecordKey::from("8"), "concluido", json!(true))
            .expect("toggle route");
        assert_eq!(request.body, Some(json!({ "checked": true })));
    }

    #[test]
    fn invalid_specs_are_rejected() {
        assert!(ScreenSpec::builder("x", "mrhs", "mrh").build().is_err());
        assert!(ScreenSpec::builder("x", "/mrhs", " ").build().is_err());
        assert!(ScreenSpec::builder("x", "/mrhs", "mrh")
            .page_size(0)
            .build()
            .is_err());
    }
}
