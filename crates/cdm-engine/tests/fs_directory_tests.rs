//! File-system backed directories.

use cdm_engine::{
    create_cdm, CdmController, CdmDirectory, CdmError, CdmModel, EngineConfig, FsDirectory,
    IoError, NoProgress, Template,
};
use tempfile::tempdir;

#[test]
fn create_then_reload_from_disk() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("new-cdm");
    let created = create_cdm(
        Box::new(FsDirectory::new(&target)),
        None,
        None,
        Template::Mcm,
        &EngineConfig::default(),
        &NoProgress,
    )
    .unwrap();

    assert!(target.join("Manifest.cdm").is_file());
    assert!(target.join("Mcm.cdm").is_file());

    let reloaded = CdmModel::load_full(Box::new(FsDirectory::new(&target)), &NoProgress).unwrap();
    assert_eq!(reloaded.graph().snapshot(), created.graph().snapshot());
    assert_eq!(reloaded.version(), Some("1.14.0"));
}

#[test]
fn listing_is_flat_and_skips_other_files() {
    let dir = tempdir().unwrap();
    create_cdm(
        Box::new(FsDirectory::new(dir.path())),
        Some("1.12.1"),
        None,
        Template::Mcm,
        &EngineConfig::default(),
        &NoProgress,
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a model").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested").join("Ignored.cdm"), "<garbage").unwrap();

    let fs = FsDirectory::new(dir.path());
    assert_eq!(
        fs.list_files().unwrap(),
        vec!["Manifest.cdm", "Mcm.cdm", "notes.txt"]
    );
    let model = CdmModel::load_full(Box::new(fs), &NoProgress).unwrap();
    assert_eq!(model.graph().files().len(), 2);
}

#[test]
fn save_to_checks_the_destination() {
    let source = tempdir().unwrap();
    let model = create_cdm(
        Box::new(FsDirectory::new(source.path())),
        None,
        None,
        Template::Mcm,
        &EngineConfig::default(),
        &NoProgress,
    )
    .unwrap();

    let busy = tempdir().unwrap();
    std::fs::write(busy.path().join("keep.txt"), "x").unwrap();
    let err = model.save_to(&FsDirectory::new(busy.path())).unwrap_err();
    assert!(matches!(err, CdmError::Io(IoError::DestinationNotEmpty { .. })));
    assert!(!busy.path().join("Manifest.cdm").exists());

    // The source itself is never "foreign", even when reached by another path.
    let dotted = source.path().join(".");
    model.save_to(&FsDirectory::new(dotted)).unwrap();

    let empty = tempdir().unwrap();
    let copy_path = empty.path().join("copy");
    model.save_to(&FsDirectory::new(&copy_path)).unwrap();
    assert_eq!(
        std::fs::read(source.path().join("Mcm.cdm")).unwrap(),
        std::fs::read(copy_path.join("Mcm.cdm")).unwrap()
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = FsDirectory::new(dir.path()).read_file("Absent.cdm").unwrap_err();
    assert!(matches!(err, IoError::Access { .. }));
    assert!(err.to_string().contains("Absent.cdm"));
}
