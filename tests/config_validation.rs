use k8scc::config::K8sccConfig;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_yaml(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn malformed_yaml_is_a_config_error_not_a_panic() {
    let file = write_yaml("images: [this, is, not, a, map]");
    let data = std::fs::read_to_string(file.path()).unwrap();
    let parsed: Result<K8sccConfig, _> = serde_yaml::from_str(&data);
    assert!(parsed.is_err());
}

#[test]
fn well_formed_document_parses_and_validates() {
    let file = write_yaml(
        r#"
images:
  golang: "example.com/golang-cc:latest"
  java: "example.com/java-cc:latest"
transfer_volume:
  path: /var/lib/k8scc
  claim: k8scc-transfer
builder:
  resources:
    memory_limit: "256Mi"
    cpu_limit: ""
launcher:
  resources:
    memory_limit: "512Mi"
    cpu_limit: "1"
"#,
    );
    let data = std::fs::read_to_string(file.path()).unwrap();
    let cfg: K8sccConfig = serde_yaml::from_str(&data).unwrap();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.image_for("golang"), Some("example.com/golang-cc:latest"));
    assert_eq!(cfg.image_for("rust"), None);
}
