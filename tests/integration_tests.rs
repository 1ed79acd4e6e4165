//! Integration tests for the complete CDM pipeline
//!
//! These tests drive the engine the way a front end does, on real
//! directories:
//! - load (fast and full) → query → validate
//! - convert → save → reload
//! - identifier codec ↔ engine lookups
//!
//! Run with: cargo test --test integration_tests

use anyhow::Result;
use cdm_engine::{
    render_mce_tree, CdmController, CdmError, CdmLoader, CdmModel, ConversionError,
    ConversionRequest, EngineConfig, FormatError, FsDirectory, LoadError, LoadMode,
    MemoryDirectory, NoProgress, TracingProgress,
};
use std::path::Path;
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cdm_engine=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixture: a spacecraft split over three files
// ============================================================================

const MANIFEST_ID: &str = "_AAAAAAAAAAAAAAAAAAAAAA";
const SPACECRAFT_ID: &str = "_AAAAAAAAAAAAAAAAAAAAAg";
const VOLTAGE_ID: &str = "_AAAAAAAAAAAAAAAAAAAABA";
const BATTERY_ID: &str = "_AAAAAAAAAAAAAAAAAAAABQ";
const CELL_ID: &str = "_AAAAAAAAAAAAAAAAAAAABg";

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<configurationcontrol:Manifest xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:configurationcontrol="http://www.esa.int/dme/ConfigurationControl/1.12.1" xmi:id="_AAAAAAAAAAAAAAAAAAAAAA" name="Manifest"/>
"#;

const SPACECRAFT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<configurationcontrol:McmCI xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:configurationcontrol="http://www.esa.int/dme/ConfigurationControl/1.12.1" xmlns:monitoringcontrol="http://www.esa.int/dme/MonitoringControl/1.12.1" xmi:id="_AAAAAAAAAAAAAAAAAAAAAQ" name="SpacecraftCI">
  <monitoringControlElement xmi:id="_AAAAAAAAAAAAAAAAAAAAAg" name="Spacecraft" defaultRoute="_AAAAAAAAAAAAAAAAAAAABA">
    <subElements href="Battery.cdm#_AAAAAAAAAAAAAAAAAAAABQ"/>
    <activities xmi:id="_AAAAAAAAAAAAAAAAAAAAAw" name="SwitchOn"/>
    <parameters xmi:id="_AAAAAAAAAAAAAAAAAAAABA" name="Voltage"/>
  </monitoringControlElement>
</configurationcontrol:McmCI>
"#;

const BATTERY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<monitoringcontrol:MonitoringControlElement xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:monitoringcontrol="http://www.esa.int/dme/MonitoringControl/1.12.1" xmi:id="_AAAAAAAAAAAAAAAAAAAABQ" name="Battery">
  <subElements xmi:id="_AAAAAAAAAAAAAAAAAAAABg" name="Cell"/>
  <parameter href="Spacecraft.cdm#_AAAAAAAAAAAAAAAAAAAABA"/>
</monitoringcontrol:MonitoringControlElement>
"#;

fn write_fixture(dir: &Path) -> Result<()> {
    std::fs::write(dir.join("Manifest.cdm"), MANIFEST)?;
    std::fs::write(dir.join("Spacecraft.cdm"), SPACECRAFT)?;
    std::fs::write(dir.join("Battery.cdm"), BATTERY)?;
    Ok(())
}

fn load_fixture(dir: &Path) -> Result<CdmModel> {
    write_fixture(dir)?;
    Ok(CdmModel::load_full(
        Box::new(FsDirectory::new(dir)),
        &TracingProgress,
    )?)
}

// ============================================================================
// Loading and querying
// ============================================================================

#[test]
fn test_full_load_builds_cross_file_tree() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let model = load_fixture(dir.path())?;

    assert_eq!(model.version(), Some("1.12.1"));
    assert_eq!(model.prefix(), Some("http://www.esa.int/dme/"));

    let roots = model.tree_roots()?;
    assert_eq!(roots.len(), 1);
    let spacecraft = roots[0];
    assert_eq!(model.node(spacecraft).and_then(|n| n.name()), Some("Spacecraft"));

    let children = model.mce_children(spacecraft);
    assert_eq!(children.len(), 1);
    assert_eq!(model.node(children[0]).and_then(|n| n.name()), Some("Battery"));

    assert_eq!(
        render_mce_tree(&model)?,
        "Spacecraft\n  Battery\n    Cell\n"
    );

    let report = model.check_validity();
    assert!(report.is_valid(), "unexpected problems: {:?}", report.problems);
    Ok(())
}

#[test]
fn test_queries_by_name_type_tag_and_identifier() -> Result<()> {
    let dir = tempdir()?;
    let model = load_fixture(dir.path())?;

    let battery = model.find_by_name("Battery");
    assert_eq!(battery.len(), 1);

    let canonical = cdm_uuid::ensure_canonical(BATTERY_ID)?;
    assert_eq!(model.find_by_identifier(&canonical)?, Some(battery[0]));
    assert_eq!(model.find_by_identifier(BATTERY_ID)?, Some(battery[0]));

    assert_eq!(
        model
            .find_by_type("monitoringcontrol:MonitoringControlElement")
            .len(),
        3
    );
    assert_eq!(model.find_by_tag("subElements").len(), 1);
    assert!(model.find_by_name("Nothing").is_empty());

    let err = model.find_by_identifier("definitely not an id").unwrap_err();
    assert!(matches!(err, CdmError::Codec(_)));
    Ok(())
}

#[test]
fn test_fast_load_answers_queries_without_resolving() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    let model = CdmModel::load_fast(Box::new(FsDirectory::new(dir.path())), &NoProgress)?;

    assert_eq!(model.version(), Some("1.12.1"));
    assert!(model.find_by_identifier(CELL_ID)?.is_some());
    assert_eq!(model.find_by_name("Voltage").len(), 1);
    assert!(matches!(
        model.tree_roots(),
        Err(CdmError::Load(LoadError::NotFullyResolved { .. }))
    ));
    // Validation looks edges up directly, so a fast model validates the same.
    assert!(model.check_validity().is_valid());
    Ok(())
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_duplicate_identifier_aborts_the_load() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    let copy = BATTERY.replace("name=\"Battery\"", "name=\"Spare\"").replace(
        "_AAAAAAAAAAAAAAAAAAAABQ\" name",
        "_AAAAAAAAAAAAAAAAAAAACA\" name",
    );
    std::fs::write(dir.path().join("Spare.cdm"), copy)?;

    let err = CdmModel::load_full(Box::new(FsDirectory::new(dir.path())), &NoProgress)
        .unwrap_err();
    match err {
        CdmError::Load(LoadError::DuplicateIdentifier {
            id,
            first_file,
            second_file,
        }) => {
            assert_eq!(id, cdm_uuid::ensure_canonical(CELL_ID)?);
            assert_eq!(first_file, "Battery.cdm");
            assert_eq!(second_file, "Spare.cdm");
        }
        other => panic!("expected a duplicate identifier, got {other}"),
    }
    Ok(())
}

#[test]
fn test_broken_reference_is_one_problem() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    let missing = "_AAAAAAAAAAAAAAAAAAAAZw";
    std::fs::write(
        dir.path().join("Battery.cdm"),
        BATTERY.replace(VOLTAGE_ID, missing),
    )?;

    let model = CdmModel::load_full(Box::new(FsDirectory::new(dir.path())), &NoProgress)?;
    let report = model.check_validity();
    assert_eq!(report.count(), 1, "{:?}", report.problems);
    assert!(report.problems[0].contains("Battery"));
    assert!(report.problems[0].contains(missing));
    Ok(())
}

#[test]
fn test_foreign_files_are_rejected() -> Result<()> {
    let emf = tempdir()?;
    write_fixture(emf.path())?;
    std::fs::write(
        emf.path().join("Binary.cdm"),
        [0x89, b'e', b'm', b'f', b'\n', b'\r', 0x1a, b'\n', 0, 1, 2],
    )?;
    let err = CdmModel::load_fast(Box::new(FsDirectory::new(emf.path())), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, CdmError::Format(FormatError::Foreign { .. })));

    let ecore = tempdir()?;
    write_fixture(ecore.path())?;
    std::fs::write(
        ecore.path().join("Metamodel.cdm"),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ecore:EPackage xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:ecore="http://www.eclipse.org/emf/2002/Ecore" name="monitoringcontrol" nsURI="http://www.esa.int/dme/MonitoringControl/1.12.1"/>
"#,
    )?;
    let err = CdmModel::load_fast(Box::new(FsDirectory::new(ecore.path())), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, CdmError::Format(FormatError::Foreign { .. })));
    Ok(())
}

#[test]
fn test_full_load_requires_the_header() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    std::fs::remove_file(dir.path().join("Manifest.cdm"))?;

    let err = CdmModel::load_full(Box::new(FsDirectory::new(dir.path())), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, CdmError::Load(LoadError::MissingMetadata { .. })));

    let fast = CdmModel::load_fast(Box::new(FsDirectory::new(dir.path())), &NoProgress)?;
    assert_eq!(fast.version(), None);
    assert_eq!(fast.info().egscc_compatibility, "unknown");
    Ok(())
}

// ============================================================================
// Conversion and persistence
// ============================================================================

#[test]
fn test_conversion_to_current_version_is_a_no_op() -> Result<()> {
    let dir = tempdir()?;
    let mut model = load_fixture(dir.path())?;
    let before = model.graph().snapshot();

    let report = model.convert_to("1.12.1", None)?;
    assert!(report.no_op);
    assert_eq!(model.graph().snapshot(), before);
    Ok(())
}

#[test]
fn test_upgrade_then_downgrade_keeps_every_node() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let mut model = load_fixture(dir.path())?;
    let original: Vec<_> = model.graph().snapshot().nodes.into_keys().collect();

    let up = model.convert_to("1.14.0", None)?;
    assert_eq!(up.steps.len(), 3);
    assert_eq!(up.nodes_created, 3);
    assert_eq!(model.prefix(), Some("http://www.esa.int/egscc/"));
    assert!(model.check_validity().is_valid());
    let spacecraft = model.find_by_identifier(SPACECRAFT_ID)?.expect("spacecraft");
    let node = model.node(spacecraft).expect("node");
    assert!(node
        .references
        .iter()
        .any(|r| r.role == "defaultServiceAccessPoint"));

    let down = model.convert_to("1.12.1", None)?;
    assert_eq!(down.nodes_removed, 0);
    let after = model.graph().snapshot();
    for id in &original {
        assert!(after.nodes.contains_key(id));
    }
    assert!(model.check_validity().is_valid());
    Ok(())
}

#[test]
fn test_destructive_downgrade_is_explicit() -> Result<()> {
    let dir = tempdir()?;
    let mut model = load_fixture(dir.path())?;
    let original = model.graph().len();

    model.convert_to("1.14.0", None)?;
    let report = model.convert(&ConversionRequest::to_version("1.12.1").dropping_deprecated())?;
    assert_eq!(report.nodes_removed, 3);
    assert_eq!(report.attributes_removed, 1);
    assert_eq!(model.graph().len(), original);
    Ok(())
}

#[test]
fn test_conversion_rejects_bad_targets() -> Result<()> {
    let dir = tempdir()?;
    let mut model = load_fixture(dir.path())?;
    let err = model.convert_to("2.0", None).unwrap_err();
    assert!(matches!(err, CdmError::Conversion(ConversionError::UnknownVersion { .. })));

    let err = model
        .convert_to("1.12", Some("http://www.esa.int/egscc/"))
        .unwrap_err();
    assert!(matches!(err, CdmError::Conversion(ConversionError::InconsistentPrefix { .. })));
    assert_eq!(model.version(), Some("1.12.1"));
    Ok(())
}

#[test]
fn test_converted_model_survives_save_and_reload() -> Result<()> {
    let source = tempdir()?;
    let mut model = load_fixture(source.path())?;
    model.convert_to("1.14.0", None)?;

    let target = tempdir()?;
    model.save_to(&FsDirectory::new(target.path()))?;
    let reloaded = CdmModel::load_full(Box::new(FsDirectory::new(target.path())), &NoProgress)?;

    assert_eq!(reloaded.version(), Some("1.14.0"));
    assert_eq!(reloaded.graph().snapshot(), model.graph().snapshot());
    assert!(reloaded.check_validity().is_valid());
    assert_eq!(reloaded.find_by_tag("definition").len(), 3);
    Ok(())
}

#[test]
fn test_serialization_is_deterministic() -> Result<()> {
    let dir = tempdir()?;
    let model = load_fixture(dir.path())?;

    let first = MemoryDirectory::new("first");
    let second = MemoryDirectory::new("second");
    model.save_to(&first)?;
    model.save_to(&second)?;
    assert_eq!(first.snapshot(), second.snapshot());

    // Saving in place and saving again leaves the bytes alone.
    model.save()?;
    let once = std::fs::read(dir.path().join("Spacecraft.cdm"))?;
    model.save()?;
    assert_eq!(std::fs::read(dir.path().join("Spacecraft.cdm"))?, once);
    Ok(())
}

#[test]
fn test_save_to_non_empty_directory_fails() -> Result<()> {
    let dir = tempdir()?;
    let model = load_fixture(dir.path())?;
    let busy = MemoryDirectory::new("busy").with_file("Other.cdm", "x");
    let err = model.save_to(&busy).unwrap_err();
    assert!(matches!(
        err,
        CdmError::Io(cdm_engine::IoError::DestinationNotEmpty { .. })
    ));
    Ok(())
}

// ============================================================================
// Configuration and info
// ============================================================================

#[test]
fn test_custom_header_file_from_json_config() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    std::fs::rename(dir.path().join("Manifest.cdm"), dir.path().join("Header.cdm"))?;

    let config = EngineConfig::from_json_str(r#"{ "header_file": "Header.cdm" }"#)?;
    let loader = CdmLoader::new(config);
    let model = loader.load(
        Box::new(FsDirectory::new(dir.path())),
        LoadMode::Full,
        &NoProgress,
    )?;
    assert_eq!(model.version(), Some("1.12.1"));
    assert!(model.find_by_identifier(MANIFEST_ID)?.is_some());

    let info = model.info();
    assert_eq!(info.egscc_compatibility, "EGS-CC release 1.1");
    assert_eq!(info.mcde_compatibility, "2.1");
    let json = serde_json::to_value(&info)?;
    assert_eq!(json["version"], "1.12.1");
    Ok(())
}
