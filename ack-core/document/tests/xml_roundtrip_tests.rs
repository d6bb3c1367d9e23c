//! 文档层集成测试

use ack_document::{modify, DocumentError, DocumentStore, FileStore};
use std::fs;

const RUN_XML: &str = r#"<?xml version="1.0" ?>
<automated_certification>
  <global_config rerun="2" mode="ALL"/>
  <devices>
    <device tag="NA" udid="1" PCI_id="8086:10fb">
      <certification_tests>
        <test_class name="net" order="0" caps="['REQ', 'network']">
          <test_method name="link"><control>eth0</control><status>init</status><result>NULL</result></test_method>
        </test_class>
      </certification_tests>
    </device>
  </devices>
</automated_certification>
"#;

#[test]
fn test_file_store_roundtrip_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.xml");
    fs::write(&path, RUN_XML).unwrap();
    let resource = path.to_str().unwrap();

    let store = FileStore::new();
    let doc = store.load(resource).unwrap();
    store.store(resource, &doc).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), RUN_XML);
}

#[test]
fn test_file_store_modify_touches_only_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.xml");
    fs::write(&path, RUN_XML).unwrap();
    let resource = path.to_str().unwrap();

    let store = FileStore::new();
    modify(&store, resource, |doc| -> Result<(), DocumentError> {
        let root = doc.root_mut();
        let path = root.descendant_paths("global_config").remove(0);
        root.at_path_mut(&path).unwrap().set_attribute("rerun", "1");
        Ok(())
    })
    .unwrap();

    let expected = RUN_XML.replace(r#"rerun="2""#, r#"rerun="1""#);
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);
}

#[test]
fn test_query_operations() {
    let doc = ack_document::Document::parse(RUN_XML).unwrap();
    let root = doc.root();

    let devices = root.descendants_by_tag("device");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].attribute("udid"), Some("1"));
    assert_eq!(devices[0].child_elements().count(), 1);

    let methods = root.descendants_by_tag("test_method");
    let annotations: Vec<_> = methods[0]
        .child_elements()
        .map(|e| (e.name().to_string(), e.text()))
        .collect();
    assert_eq!(
        annotations,
        vec![
            ("control".to_string(), Some("eth0".to_string())),
            ("status".to_string(), Some("init".to_string())),
            ("result".to_string(), Some("NULL".to_string())),
        ]
    );
}
