//! CLI 命令处理模块

pub mod caps;
pub mod common; // 公共工具函数
pub mod next;
pub mod output;
pub mod record;
pub mod reset;
pub mod status;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const RUN_XML: &str = r#"<automated_certification><global_config rerun="0"/><devices><device tag="NA" udid="1" PCI_id="8086:10fb" PCI_description="82599ES"><certification_tests><test_class name="net" caps="['REQ', 'network']"><test_method name="link"><status>done</status><result>pass</result></test_method><test_method name="mtu"><status>init</status><result>NULL</result></test_method></test_class><test_class name="gro" caps="['GRO']"><test_method name="on"><status>done</status><result>fail</result></test_method></test_class></certification_tests></device></devices></automated_certification>"#;

    fn fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.xml");
        fs::write(&path, RUN_XML).unwrap();
        let file = path.to_string_lossy().into_owned();
        (dir, file)
    }

    #[test]
    fn test_status_rows() {
        let (_dir, file) = fixture();
        let run = common::open_run(&file).unwrap();
        let status = status::RunStatus::from_run(&run);

        assert!(!status.finished);
        assert_eq!(status.total.waiting, 1);
        assert_eq!(status.devices[0].id, "8086:10fb");
        assert!(!status.devices[0].certified);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["devices"][0]["passed"], 1);
    }

    #[test]
    fn test_caps_rows() {
        let (_dir, file) = fixture();
        let run = common::open_run(&file).unwrap();
        let rows = caps::collect(&run);

        // net 未全部通过，gro 非必需视为通过
        let names: Vec<_> = rows
            .iter()
            .map(|r| (r.capability.as_str(), r.supported))
            .collect();
        assert_eq!(names, vec![("GRO", true), ("network", false)]);
    }

    #[test]
    fn test_record_then_reset() {
        let (_dir, file) = fixture();

        record::handle(
            &file,
            "net.mtu",
            "pass",
            Some("1"),
            vec![("reason".to_string(), "jumbo ok".to_string())],
        )
        .unwrap();
        let run = common::open_run(&file).unwrap();
        let device = run.device("1").unwrap();
        assert!(device.has_passed());
        let mtu = device.class("net").unwrap().method_by_name("mtu").unwrap();
        assert_eq!(mtu.annotation("reason").unwrap().value(), Some("jumbo ok"));

        reset::handle(&file, "net.mtu", None).unwrap();
        let run = common::open_run(&file).unwrap();
        assert_eq!(run.status_counts().waiting, 1);

        assert!(record::handle(&file, "net.ghost", "pass", None, vec![]).is_err());
        assert!(record::handle(&file, "net.mtu", "PASS", None, vec![]).is_err());
        let override_status = vec![("status".to_string(), "init".to_string())];
        assert!(record::handle(&file, "net.mtu", "pass", None, override_status).is_err());
        assert_eq!(common::open_run(&file).unwrap().status_counts().waiting, 1);
    }

    #[test]
    fn test_next_start_marks_running() {
        let (_dir, file) = fixture();
        next::handle(&file, true).unwrap();

        let run = common::open_run(&file).unwrap();
        assert_eq!(run.status_counts().running, 1);
        let sel = run.find_method("net.mtu").unwrap();
        assert!(run.selected_method(&sel).unwrap().is_running());
    }
}
