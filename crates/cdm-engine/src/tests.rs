//! Tests for the text views, run against both a loaded model and an
//! in-memory controller double.

use super::*;

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<configurationcontrol:Manifest xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:configurationcontrol="http://www.esa.int/dme/ConfigurationControl/1.12.1" xmi:id="_AAAAAAAAAAAAAAAAAAAAAA"/>
"#;

const MAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<configurationcontrol:McmCI xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:configurationcontrol="http://www.esa.int/dme/ConfigurationControl/1.12.1" xmi:id="_AAAAAAAAAAAAAAAAAAAAAQ" name="CI">
  <monitoringControlElement xmi:id="_AAAAAAAAAAAAAAAAAAAAAg" name="Spacecraft" defaultRoute="_AAAAAAAAAAAAAAAAAAAABg">
    <subElements href="Battery.cdm#_AAAAAAAAAAAAAAAAAAAAAw"/>
    <subElements xmi:id="_AAAAAAAAAAAAAAAAAAAABw" name="Thermal"/>
  </monitoringControlElement>
  <monitoringControlElement xmi:id="_AAAAAAAAAAAAAAAAAAAACA">
    <description>ground segment</description>
  </monitoringControlElement>
</configurationcontrol:McmCI>
"#;

const BATTERY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<monitoringcontrol:MonitoringControlElement xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:monitoringcontrol="http://www.esa.int/dme/MonitoringControl/1.12.1" xmi:id="_AAAAAAAAAAAAAAAAAAAAAw" name="Battery">
  <subElements xmi:id="_AAAAAAAAAAAAAAAAAAAABA" name="Cell"/>
</monitoringcontrol:MonitoringControlElement>
"#;

fn load() -> CdmModel {
    let dir = MemoryDirectory::new("views")
        .with_file("Manifest.cdm", MANIFEST)
        .with_file("Main.cdm", MAIN)
        .with_file("Battery.cdm", BATTERY);
    CdmModel::load_full(Box::new(dir), &NoProgress).unwrap()
}

#[test]
fn tree_follows_proxies_and_separates_roots() {
    let model = load();
    let tree = render_mce_tree(&model).unwrap();
    assert_eq!(
        tree,
        "Spacecraft\n  Battery\n    Cell\n  Thermal\n\n(unnamed)\n"
    );
}

#[test]
fn tree_through_a_trait_object() {
    let model = load();
    let controller: &dyn CdmController = &model;
    assert!(render_mce_tree(controller).unwrap().starts_with("Spacecraft\n"));
}

#[test]
fn describe_lists_attributes_and_references() {
    let model = load();
    let spacecraft = model.find_by_name("Spacecraft")[0];
    let text = describe_node(&model, spacecraft).unwrap();
    assert!(text.starts_with("Spacecraft\n"));
    assert!(text.contains("  type: monitoringcontrol:MonitoringControlElement\n"));
    assert!(text.contains("  tag: monitoringControlElement\n"));
    assert!(text.contains("    name = Spacecraft\n"));
    assert!(text.contains("    defaultRoute -> _AAAAAAAAAAAAAAAAAAAABg (broken)\n"));

    let ground = model
        .find_by_identifier("_AAAAAAAAAAAAAAAAAAAACA")
        .unwrap()
        .unwrap();
    let text = describe_node(&model, ground).unwrap();
    assert!(text.starts_with("(unnamed)\n"));
    assert!(text.contains("    description = ground segment (element)\n"));
    assert!(describe_node(&model, NodeId::new(999)).is_none());
}

/// A controller over a hand-built graph that only answers reads.
struct FixedController {
    graph: ModelGraph,
    resolved: bool,
}

impl FixedController {
    fn new(resolved: bool) -> Self {
        let mut graph = ModelGraph::new();
        let file = graph.push_file(CdmFile {
            name: "Fixed.cdm".to_string(),
            xmi_version: None,
            namespaces: Vec::new(),
            root: NodeId::new(0),
        });
        let mut root = Node::new(Uuid::from_u128(10), schema::MCE_TYPE, file);
        root.declared_type = Some(schema::MCE_TYPE.to_string());
        root.set_attribute("name", "Station");
        let root = graph.insert_node(root).unwrap();
        for (n, name) in [(11, "Antenna"), (12, "Receiver")] {
            let mut child = Node::new(Uuid::from_u128(n), "subElements", file);
            child.declared_type = Some(schema::MCE_TYPE.to_string());
            child.set_attribute("name", name);
            graph.add_inline_child(root, child).unwrap();
        }
        Self { graph, resolved }
    }
}

impl CdmController for FixedController {
    fn load_fast(_dir: Box<dyn CdmDirectory>, _progress: &dyn ProgressSink) -> Result<Self> {
        Ok(Self::new(false))
    }

    fn load_full(_dir: Box<dyn CdmDirectory>, _progress: &dyn ProgressSink) -> Result<Self> {
        Ok(Self::new(true))
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn prefix(&self) -> Option<&str> {
        None
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    fn find_by_identifier(&self, id: &str) -> Result<Option<NodeId>> {
        Ok(self.graph.lookup(&cdm_uuid::parse(id)?))
    }

    fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        QueryIndex::build(&self.graph).find_by_name(name)
    }

    fn find_by_type(&self, declared_type: &str) -> Vec<NodeId> {
        QueryIndex::build(&self.graph).find_by_type(declared_type)
    }

    fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        QueryIndex::build(&self.graph).find_by_tag(tag)
    }

    fn tree_roots(&self) -> Result<Vec<NodeId>> {
        if self.resolved {
            Ok(self.graph.mce_roots())
        } else {
            Err(LoadError::NotFullyResolved {
                operation: "tree_roots",
            }
            .into())
        }
    }

    fn mce_children(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.mce_children(id)
    }

    fn check_validity(&self) -> ValidationReport {
        ValidationReport::default()
    }

    fn convert_to(&mut self, version: &str, _prefix: Option<&str>) -> Result<ConversionReport> {
        Err(ConversionError::UnknownVersion {
            version: version.to_string(),
        }
        .into())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    fn save_to(&self, _dest: &dyn CdmDirectory) -> Result<()> {
        Ok(())
    }
}

#[test]
fn views_work_over_any_controller() {
    let fixed = FixedController::load_full(Box::new(MemoryDirectory::new("unused")), &NoProgress)
        .unwrap();
    assert_eq!(
        render_mce_tree(&fixed).unwrap(),
        "Station\n  Antenna\n  Receiver\n"
    );
    let antenna = fixed.find_by_name("Antenna")[0];
    let text = describe_node(&fixed, antenna).unwrap();
    assert!(text.contains("  tag: subElements\n"));
    assert!(!text.contains("references:"));
}

#[test]
fn tree_view_propagates_unresolved_error() {
    let fixed = FixedController::load_fast(Box::new(MemoryDirectory::new("unused")), &NoProgress)
        .unwrap();
    let err = render_mce_tree(&fixed).unwrap_err();
    assert_eq!(err.kind(), CdmErrorKind::Load);
}
