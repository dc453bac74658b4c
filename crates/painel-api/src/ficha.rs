//! Shape conversions for the candidate ficha document.
//!
//! The server stores list sections either as arrays, `{ "itens": [...] }` or
//! JSON-encoded strings, and free-text sections as `{ "texto": "..." }`.
//! `normalize_ficha` flattens those into an editable form and `ficha_payload`
//! turns the edited form back into what `PUT /fichas/{id}` expects.

use serde_json::{json, Map, Value};

const LIST_SECTIONS: [&str; 3] = ["formacao", "cursos", "experiencias"];
const TEXT_SECTIONS: [&str; 3] = ["disponibilidade", "informacoes_adicionais", "como_conheceu"];

pub fn normalize_ficha(raw: Value) -> Value {
    let mut ficha = match raw {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for section in LIST_SECTIONS {
        let items = match ficha.get(section).map(parse_embedded) {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut wrapper)) => match wrapper.remove("itens") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        ficha.insert(section.to_owned(), json!({ "itens": items }));
    }

    for section in TEXT_SECTIONS {
        let text = ficha
            .get(section)
            .map(parse_embedded)
            .and_then(|value| value.get("texto").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default();
        ficha.insert(text_key(section), Value::String(text));
    }

    Value::Object(ficha)
}

pub fn ficha_payload(ficha: Value) -> Value {
    let mut payload = match ficha {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for section in LIST_SECTIONS {
        if let Some(value) = payload.remove(section) {
            payload.insert(section.to_owned(), sanitize(value));
        }
    }
    for section in TEXT_SECTIONS {
        let text = match payload.remove(&text_key(section)) {
            Some(Value::String(text)) => text,
            _ => String::new(),
        };
        payload.insert(section.to_owned(), json!({ "texto": text }));
    }

    Value::Object(payload)
}

fn text_key(section: &str) -> String {
    format!("{section}_texto")
}

fn parse_embedded(value: &Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

// Blank strings become null and list entries with no content are dropped.
fn sanitize(value: Value) -> Value {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_owned())
            }
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(sanitize)
                .filter(|item| match item {
                    Value::Object(map) => !map.is_empty(),
                    Value::String(text) => !text.is_empty(),
                    _ => false,
                })
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, sanitize(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unwraps_stored_sections() {
        let ficha = normalize_ficha(json!({
            "id": 3,
            "formacao": "[{\"curso\":\"Técnico\"}]",
            "cursos": { "itens": [{ "nome": "NR-10" }] },
            "experiencias": null,
            "disponibilidade": "{\"texto\":\"Noturno\"}",
            "como_conheceu": { "texto": "Indicação" }
        }));

        assert_eq!(ficha["formacao"], json!({ "itens": [{ "curso": "Técnico" }] }));
        assert_eq!(ficha["cursos"], json!({ "itens": [{ "nome": "NR-10" }] }));
        assert_eq!(ficha["experiencias"], json!({ "itens": [] }));
        assert_eq!(ficha["disponibilidade_texto"], json!("Noturno"));
        assert_eq!(ficha["informacoes_adicionais_texto"], json!(""));
        assert_eq!(ficha["como_conheceu_texto"], json!("Indicação"));
    }

    #[test]
    fn payload_trims_blanks_and_rewraps_text_sections() {
        let payload = ficha_payload(json!({
            "id": 3,
            "nome": "Ana",
            "formacao": { "itens": [{ "curso": "  Técnico " }, { "curso": "" }] },
            "disponibilidade_texto": "Noturno",
            "como_conheceu_texto": "Indicação"
        }));

        assert_eq!(
            payload["formacao"],
            json!({ "itens": [{ "curso": "Técnico" }, { "curso": null }] })
        );
        assert_eq!(payload["disponibilidade"], json!({ "texto": "Noturno" }));
        assert_eq!(payload["informacoes_adicionais"], json!({ "texto": "" }));
        assert!(payload.get("disponibilidade_texto").is_none());
        assert_eq!(payload["nome"], json!("Ana"));
    }
}
