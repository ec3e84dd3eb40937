use std::fs;
use std::path::Path;

use tracing::info;

use super::{CatalogError, KnowledgeBase};

/// Catalogs compiled into the binary, keyed by their source file name.
pub const BUILTIN_CATALOGS: &[(&str, &str)] = &[
    ("instalacion_electrica.toml", include_str!("../../catalogs/instalacion_electrica.toml")),
    ("pozo_tierra.toml", include_str!("../../catalogs/pozo_tierra.toml")),
    ("certificado_seguridad.toml", include_str!("../../catalogs/certificado_seguridad.toml")),
    ("proyecto_pmi.toml", include_str!("../../catalogs/proyecto_pmi.toml")),
];

pub fn builtin_catalogs() -> Result<Vec<KnowledgeBase>, CatalogError> {
    BUILTIN_CATALOGS.iter().map(|(origin, raw)| KnowledgeBase::from_toml_str(origin, raw)).collect()
}

/// Loads every `*.toml` file in `dir`, sorted by file name.
pub fn load_catalog_dir(dir: &Path) -> Result<Vec<KnowledgeBase>, CatalogError> {
    let io_error = |error: std::io::Error| CatalogError::Io {
        path: dir.display().to_string(),
        message: error.to_string(),
    };

    let mut paths = fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|extension| extension == "toml"))
        .collect::<Vec<_>>();
    paths.sort();

    let mut catalogs = Vec::with_capacity(paths.len());
    for path in paths {
        let origin = path.display().to_string();
        let raw = fs::read_to_string(&path)
            .map_err(|error| CatalogError::Io { path: origin.clone(), message: error.to_string() })?;
        let knowledge_base = KnowledgeBase::from_toml_str(&origin, &raw)?;
        info!(
            event_name = "catalog.loaded",
            domain = %knowledge_base.domain,
            origin = %origin,
            stages = knowledge_base.stages.len(),
            "loaded catalog override"
        );
        catalogs.push(knowledge_base);
    }

    Ok(catalogs)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rust_decimal::Decimal;

    use super::{builtin_catalogs, load_catalog_dir, BUILTIN_CATALOGS};
    use crate::catalog::{CatalogError, InputKind, KnowledgeBase, NextStage};
    use crate::domain::conversation::TERMINAL_STAGE;

    fn builtin(domain: &str) -> KnowledgeBase {
        builtin_catalogs()
            .expect("builtin catalogs should validate")
            .into_iter()
            .find(|knowledge_base| knowledge_base.domain == domain)
            .expect("domain should be builtin")
    }

    #[test]
    fn every_builtin_catalog_validates() {
        let catalogs = builtin_catalogs().expect("builtin catalogs should validate");
        assert_eq!(catalogs.len(), BUILTIN_CATALOGS.len());

        let domains = catalogs.iter().map(|catalog| catalog.domain.as_str()).collect::<Vec<_>>();
        assert_eq!(
            domains,
            vec!["instalacion_electrica", "pozo_tierra", "certificado_seguridad", "proyecto_pmi"]
        );
    }

    #[test]
    fn electrical_sequence_matches_declaration_order() {
        let knowledge_base = builtin("instalacion_electrica");
        assert_eq!(
            knowledge_base.stage_sequence().collect::<Vec<_>>(),
            vec!["area", "pisos", "puntos_luz", "tomacorrientes", "tableros"]
        );
        assert_eq!(knowledge_base.first_stage(), "area");
        assert_eq!(knowledge_base.next_in_sequence("pisos"), "puntos_luz");
        assert_eq!(knowledge_base.next_in_sequence("tableros"), TERMINAL_STAGE);
    }

    #[test]
    fn pmi_duration_stage_splits_and_skips_to_risks() {
        let knowledge_base = builtin("proyecto_pmi");
        let stage = knowledge_base.stage("duracion_total").expect("duration stage");

        assert_eq!(stage.input, InputKind::Integer { min: 0, max: 1825 });
        assert_eq!(stage.next, NextStage::SplitWhenPositive { skip_to: "riesgos".to_string() });
        assert_eq!(stage.quick_replies[0].value, "0");
        let weights = knowledge_base.phases.iter().map(|phase| phase.weight).collect::<Vec<_>>();
        assert_eq!(weights, vec![10, 20, 45, 15, 10]);
    }

    #[test]
    fn unknown_variant_falls_back_to_default() {
        let knowledge_base = builtin("pozo_tierra");

        let requested = knowledge_base.variant(Some("ARENOSO"));
        assert_eq!(requested.code, "ARENOSO");
        assert!(!requested.substituted);

        let fallback = knowledge_base.variant(Some("PANTANOSO"));
        assert_eq!(fallback.code, "ARCILLOSO");
        assert!(fallback.substituted);

        let unset = knowledge_base.variant(None);
        assert_eq!(unset.code, "ARCILLOSO");
        assert!(!unset.substituted);
    }

    #[test]
    fn missing_price_falls_back_to_default_variant_then_zero() {
        let mut knowledge_base = builtin("pozo_tierra");
        let rocoso = knowledge_base.variants.get_mut("ROCOSO").expect("rocoso variant");
        rocoso.prices.remove("medicion");
        let rocoso = rocoso.clone();

        let fallback = knowledge_base.unit_price(&rocoso, "medicion");
        assert_eq!(fallback.amount, Decimal::from(250));
        assert!(fallback.substituted);

        let unknown = knowledge_base.unit_price(&rocoso, "no_existe");
        assert_eq!(unknown.amount, Decimal::ZERO);
        assert!(unknown.substituted);

        let present = knowledge_base.unit_price(&rocoso, "excavacion");
        assert_eq!(present.amount, Decimal::from(420));
        assert!(!present.substituted);
    }

    #[test]
    fn lookup_table_defaults_unknown_keys() {
        let knowledge_base = builtin("proyecto_pmi");
        let table = knowledge_base.lookup_table("contingencia").expect("contingency table");
        assert_eq!(table.get("Alta"), Decimal::new(15, 1));
        assert_eq!(table.get("Desconocida"), Decimal::ONE);
    }

    const MINIMAL: &str = r#"
domain = "minimo"
title = "Mínimo"
greeting = "Hola"
default_variant = "BASE"

[variants.BASE]
label = "Base"
prices = { unidad = "10" }

[[stages]]
id = "cantidad"
prompt = "¿Cuántas?"
input = { kind = "integer", min = 1, max = 10 }

[[items]]
code = "unidad"
description = "Unidad"
unit = "und"
price = "unidad"
quantity = { source = "field", field = "cantidad" }
"#;

    fn invalid_reason(raw: &str) -> String {
        match KnowledgeBase::from_toml_str("test.toml", raw) {
            Err(CatalogError::Invalid { reason, .. }) => reason,
            other => panic!("expected invalid catalog, got {other:?}"),
        }
    }

    #[test]
    fn minimal_catalog_parses() {
        let knowledge_base =
            KnowledgeBase::from_toml_str("test.toml", MINIMAL).expect("minimal catalog");
        assert_eq!(knowledge_base.first_stage(), "cantidad");
        assert!(knowledge_base.shortcuts.is_empty());
    }

    #[test]
    fn rejects_unknown_default_variant() {
        let raw = MINIMAL.replace("default_variant = \"BASE\"", "default_variant = \"OTRO\"");
        assert!(invalid_reason(&raw).contains("default_variant"));
    }

    #[test]
    fn rejects_reserved_stage_ids() {
        let raw = MINIMAL.replace("id = \"cantidad\"", "id = \"cotizado\"");
        assert!(invalid_reason(&raw).contains("reserved"));
    }

    #[test]
    fn rejects_reversed_bounds() {
        let raw = MINIMAL.replace("min = 1, max = 10", "min = 10, max = 1");
        assert!(invalid_reason(&raw).contains("reversed"));
    }

    #[test]
    fn rejects_items_reading_uncollected_fields() {
        let raw = MINIMAL.replace("field = \"cantidad\"", "field = \"metros\"");
        assert!(invalid_reason(&raw).contains("metros"));
    }

    #[test]
    fn rejects_items_priced_from_text_stages() {
        let raw = MINIMAL.replace(
            "input = { kind = \"integer\", min = 1, max = 10 }",
            "input = { kind = \"text\", min_len = 1, max_len = 10 }",
        );
        assert!(invalid_reason(&raw).contains("not a numeric stage"));
    }

    #[test]
    fn rejects_risk_items_reading_numeric_stages() {
        let raw = MINIMAL.replace(
            "quantity = { source = \"field\", field = \"cantidad\" }",
            "quantity = { source = \"risks\", field = \"cantidad\", table = \"contingencia\" }",
        );
        assert!(invalid_reason(&raw).contains("does not collect a risk table"));
    }

    #[test]
    fn rejects_phases_entered_through_non_integer_stages() {
        let mut knowledge_base = builtin("proyecto_pmi");
        let stage = knowledge_base
            .stages
            .iter_mut()
            .find(|stage| stage.id == "dias_cierre")
            .expect("closing phase stage");
        stage.input = InputKind::Decimal { min: Decimal::ONE, max: Decimal::from(730) };

        let error = knowledge_base.validate().expect_err("decimal phase stage");
        assert!(error.to_string().contains("phase `dias_cierre`"));
    }

    #[test]
    fn rejects_shortcuts_to_unknown_stages() {
        let raw = format!(
            "{MINIMAL}\n[[shortcuts]]\ntoken = \"BASE\"\nlabel = \"Base\"\ntarget = \"nada\"\n"
        );
        assert!(invalid_reason(&raw).contains("unknown stage"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let error = KnowledgeBase::from_toml_str("broken.toml", "domain = ")
            .expect_err("malformed catalog");
        assert!(matches!(error, CatalogError::Parse { .. }));
        assert!(error.to_string().contains("broken.toml"));
    }

    #[test]
    fn catalog_dir_loads_toml_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("minimo.toml"), MINIMAL).expect("write catalog");
        fs::write(dir.path().join("notas.txt"), "ignored").expect("write note");

        let catalogs = load_catalog_dir(dir.path()).expect("catalog dir should load");
        assert_eq!(catalogs.len(), 1);
        assert_eq!(catalogs[0].domain, "minimo");
    }

    #[test]
    fn missing_catalog_dir_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = load_catalog_dir(&dir.path().join("missing")).expect_err("missing dir");
        assert!(matches!(error, CatalogError::Io { .. }));
    }
}
