//! Preset screen definitions for the dashboard's list screens.

use std::time::Duration;

use painel_core::{encode_path_segment, CoreError, HttpMethod, RecordKey, SessionScope};

use crate::export::ExportColumn;
use crate::screen::{FieldBody, FieldWrite, ScreenSpec};

pub const MRHS_INTERVAL: Duration = Duration::from_secs(5);
pub const DOCUMENTACAO_INTERVAL: Duration = Duration::from_secs(5);
pub const AGENDAMENTO_INTERVAL: Duration = Duration::from_secs(5);
pub const CANDIDATOS_REGISTRADOS_INTERVAL: Duration = Duration::from_secs(3);
pub const CANDIDATOS_MRH_INTERVAL: Duration = Duration::from_secs(10);
pub const RONDAS_INTERVAL: Duration = Duration::from_secs(300);
pub const RONDAS_PAGE_SIZE: usize = 20;

pub const CONCLUIR: &str = "concluir";
pub const MOVER_DOCUMENTACAO: &str = "documentacao";

pub const MRHS_EXPORT: &[ExportColumn] = &[
    ExportColumn::new("Abertura", "data_abertura"),
    ExportColumn::new("Dias em Aberto", "dias_em_aberto").or("0"),
    ExportColumn::new("MRH", "mrh"),
    ExportColumn::new("Função", "funcao"),
    ExportColumn::new("Salário", "salario"),
    ExportColumn::new("Motivo", "motivo_admissao"),
    ExportColumn::new("Escala", "escala"),
    ExportColumn::new("Período", "periodo"),
    ExportColumn::new("Empresa", "empresa"),
    ExportColumn::new("Endereço", "endereco"),
    ExportColumn::new("CR", "cr"),
    ExportColumn::new("Usuário Abertura", "usuario_abertura"),
    ExportColumn::new("Diretor", "diretor"),
    ExportColumn::new("Gerente Regional", "gerente_regional"),
    ExportColumn::new("Gerente", "gerente"),
    ExportColumn::new("Supervisor", "supervisor"),
    ExportColumn::new("Responsável", "responsavel"),
    ExportColumn::new("Qtd. Comentários", "total_comentarios"),
    ExportColumn::new("Qtd. Candidatos", "total_candidatos"),
];

pub const AGENDAMENTO_EXPORT: &[ExportColumn] = &[
    ExportColumn::new("MRH", "mrh"),
    ExportColumn::new("Colaborador", "nome_colaborador"),
    ExportColumn::new("CPF", "cpf_colaborador"),
    ExportColumn::new("Função", "funcao"),
    ExportColumn::new("Empresa", "empresa"),
    ExportColumn::new("CR", "cr"),
    ExportColumn::new("Exame", "exame"),
    ExportColumn::new("Uniformes", "uniformes"),
    ExportColumn::new("Integração", "data_integracao"),
    ExportColumn::new("Admissão", "data_admissao"),
];

pub fn mrhs() -> Result<ScreenSpec, CoreError> {
    ScreenSpec::builder("mrhs", "/mrhsabertas", "mrh")
        .compare_fields(["mrh", "dias_em_aberto", "total_candidatos", "total_comentarios"])
        .action(
            MOVER_DOCUMENTACAO,
            HttpMethod::Patch,
            "{resource}/{key}/documentacao",
        )
        .poll_interval(MRHS_INTERVAL)
        .export_columns(MRHS_EXPORT)
        .build()
}

pub fn documentacao() -> Result<ScreenSpec, CoreError> {
    let write = FieldWrite::patch("{resource}/{field}/{key}", FieldBody::Named);
    ScreenSpec::builder("documentacao", "/mrhsdocumentacao", "mrh")
        .compare_fields([
            "mrh",
            "status_rh",
            "status_dp",
            "dias_em_aberto",
            "exame",
            "condicao",
        ])
        .field_write("exame", write.clone())
        .field_write("condicao", write)
        .action(CONCLUIR, HttpMethod::Patch, "{resource}/concluir/{key}")
        .poll_interval(DOCUMENTACAO_INTERVAL)
        .build()
}

pub fn agendamento() -> Result<ScreenSpec, CoreError> {
    ScreenSpec::builder("agendamento", "/mrhsagendamento", "mrh")
        .compare_fields([
            "mrh",
            "exame",
            "uniformes",
            "data_integracao",
            "data_admissao",
        ])
        .default_write(FieldWrite::patch(
            "{resource}/{field}/{key}",
            FieldBody::Valor,
        ))
        .poll_interval(AGENDAMENTO_INTERVAL)
        .export_columns(AGENDAMENTO_EXPORT)
        .build()
}

pub fn candidatos_registrados() -> Result<ScreenSpec, CoreError> {
    ScreenSpec::builder("candidatos_registrados", "/candidatosregistrados", "id")
        .field_write(
            "desistente",
            FieldWrite::patch("{resource}/{key}/desistente", FieldBody::Named),
        )
        .delete_path("{resource}/{key}")
        .poll_interval(CANDIDATOS_REGISTRADOS_INTERVAL)
        .build()
}

pub fn candidatos_mrh(mrh: &RecordKey) -> Result<ScreenSpec, CoreError> {
    if mrh.as_str().trim().is_empty() {
        return Err(CoreError::Configuration(
            "the candidate screen needs an MRH".to_owned(),
        ));
    }

    ScreenSpec::builder(
        "candidatos_mrh",
        format!("/candidatos/{}", mrh.path_segment()),
        "id",
    )
        .default_write(FieldWrite::put(
            "/candidatos/validacao/{key}",
            FieldBody::CampoValor,
        ))
        .field_write(
            "status",
            FieldWrite::put("/candidatos/status/{key}", FieldBody::Named),
        )
        .create_path("{resource}")
        .poll_interval(CANDIDATOS_MRH_INTERVAL)
        .build()
}

// The checklist is a modal without its own refresh timer.
pub fn checkdocs(candidato: &RecordKey) -> Result<ScreenSpec, CoreError> {
    ScreenSpec::builder(
        "checkdocs",
        format!("/checkdocs/{}", candidato.path_segment()),
        "id",
    )
    .field_write(
        "checked",
        FieldWrite::patch("/checkdocs/item/{key}/check", FieldBody::Named),
    )
    .create_path("{resource}")
    .delete_path("/checkdocs/item/{key}")
    .build()
}

// Same checklist items, looked up by the collaborator's CPF on the Documentação screen.
pub fn checkdocs_by_cpf(cpf: &str) -> Result<ScreenSpec, CoreError> {
    let cpf = cpf.trim();
    if cpf.is_empty() {
        return Err(CoreError::Configuration(
            "the checklist needs a CPF".to_owned(),
        ));
    }

    ScreenSpec::builder(
        "checkdocs_cpf",
        format!("/mrhsdocumentacao/itens/{}", encode_path_segment(cpf)),
        "id",
    )
    .field_write(
        "concluido",
        FieldWrite::patch("/checkdocs/item/{key}/check", FieldBody::Alias("checked")),
    )
    .create_path("{resource}")
    .delete_path("/checkdocs/item/{key}")
    .build()
}

pub fn rondas() -> Result<ScreenSpec, CoreError> {
    ScreenSpec::builder("rondas", "/rondas", "id")
        .scope(SessionScope::Rondas)
        .filters(["dataInicio", "dataFim", "roteiro"])
        .page_size(RONDAS_PAGE_SIZE)
        .companion("/rondas/ultima-sincronizacao")
        .poll_interval(RONDAS_INTERVAL)
        .poll_resets_cursor(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::CompareFields;
    use serde_json::json;

    #[test]
    fn presets_build() {
        for spec in [
            mrhs(),
            documentacao(),
            agendamento(),
            candidatos_registrados(),
            candidatos_mrh(&RecordKey::from("101")),
            checkdocs(&RecordKey::from("9")),
            checkdocs_by_cpf("123.456.789-00"),
            rondas(),
        ] {
            spec.expect("preset should build");
        }
    }

    #[test]
    fn documentacao_only_edits_exam_and_condition() {
        let spec = documentacao().expect("preset");
        assert!(spec.is_editable("exame"));
        assert!(spec.is_editable("condicao"));
        assert!(!spec.is_editable("status_rh"));

        let request = spec
            .field_request(&RecordKey::from("55"), "condicao", json!("apto"))
            .expect("condicao route");
        assert_eq!(request.path, "/mrhsdocumentacao/condicao/55");
        assert_eq!(request.body, Some(json!({ "condicao": "apto" })));

        let concluir = spec
            .action_request(CONCLUIR, &RecordKey::from("55"))
            .expect("concluir route");
        assert_eq!(concluir.path, "/mrhsdocumentacao/concluir/55");
        assert_eq!(concluir.body, None);
    }

    #[test]
    fn rondas_uses_its_own_scope_and_pagination() {
        let spec = rondas().expect("preset");
        assert_eq!(spec.scope(), SessionScope::Rondas);
        assert_eq!(spec.page_size(), Some(20));
        assert!(spec.poll_resets_cursor());
        assert_eq!(spec.compare(), &CompareFields::All);
        assert_eq!(
            spec.recognized_filters(),
            &["dataFim".to_owned(), "dataInicio".to_owned(), "roteiro".to_owned()]
        );
    }

    #[test]
    fn checklist_routes_target_items() {
        let spec = checkdocs(&RecordKey::from("9")).expect("preset");
        assert_eq!(spec.poll_interval(), None);
        let toggle = spec
            .field_request(&RecordKey::from("31"), "checked", json!(true))
            .expect("toggle route");
        assert_eq!(toggle.path, "/checkdocs/item/31/check");
        assert_eq!(toggle.body, Some(json!({ "checked": true })));
        assert_eq!(
            spec.delete_request(&RecordKey::from("31"))
                .expect("delete route")
                .path,
            "/checkdocs/item/31"
        );
        assert_eq!(
            spec.create_request(json!({ "nome": "RG" }))
                .expect("create route")
                .path,
            "/checkdocs/9"
        );
    }

    #[test]
    fn mrhs_move_to_documentacao() {
        let spec = mrhs().expect("preset");
        let request = spec
            .action_request(MOVER_DOCUMENTACAO, &RecordKey::from("318"))
            .expect("documentacao route");
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(request.path, "/mrhsabertas/318/documentacao");
        assert_eq!(spec.export_columns().len(), 19);
    }

    #[test]
    fn cpf_checklist_toggles_concluido_through_item_routes() {
        let spec = checkdocs_by_cpf(" 12345678900 ").expect("preset");
        assert_eq!(spec.resource(), "/mrhsdocumentacao/itens/12345678900");
        assert!(!spec.is_editable("checked"));

        let toggle = spec
            .field_request(&RecordKey::from("4"), "concluido", json!(true))
            .expect("toggle route");
        assert_eq!(toggle.path, "/checkdocs/item/4/check");
        assert_eq!(toggle.body, Some(json!({ "checked": true })));
        assert_eq!(
            spec.create_request(json!({ "nome": "CTPS" }))
                .expect("create route")
                .path,
            "/mrhsdocumentacao/itens/12345678900"
        );
        assert!(checkdocs_by_cpf("  ").is_err());
    }
}
