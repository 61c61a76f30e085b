//! Maps a chaincode language tag to the parameters needed to build and run
//! it: the in-container build command/env, the launcher's entrypoint args,
//! and where built artifacts must be mounted. A closed set of three
//! languages rather than a pluggable registry -- see DESIGN.md.

pub struct BuildSpec {
    pub cmd: Vec<String>,
    pub env: Vec<(String, String)>,
}

pub fn is_supported(language_tag: &str) -> bool {
    matches!(language_tag.to_uppercase().as_str(), "GOLANG" | "JAVA" | "NODE")
}

pub fn build_spec(language_tag: &str, path: &str) -> BuildSpec {
    match language_tag.to_uppercase().as_str() {
        "GOLANG" => BuildSpec {
            cmd: vec![
                "sh".to_string(),
                "-c".to_string(),
                format!(
                    "cd /chaincode/input/src/{path} && go build -o /chaincode/output/chaincode ."
                ),
            ],
            env: vec![("GO111MODULE".to_string(), "on".to_string())],
        },
        "JAVA" => BuildSpec {
            cmd: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cd /chaincode/input/src && ./gradlew installDist -x test \
                 && cp -r build/install/* /chaincode/output/"
                    .to_string(),
            ],
            env: vec![],
        },
        "NODE" => BuildSpec {
            cmd: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cd /chaincode/input/src && npm install --production \
                 && cp -r . /chaincode/output/"
                    .to_string(),
            ],
            env: vec![],
        },
        _ => BuildSpec {
            cmd: vec!["true".to_string()],
            env: vec![],
        },
    }
}

pub fn run_args(language_tag: &str, peer_address: &str) -> Vec<String> {
    match language_tag.to_uppercase().as_str() {
        "JAVA" => vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("./start --peer.address {peer_address}"),
        ],
        _ => vec![
            "chaincode".to_string(),
            "-peer.address".to_string(),
            peer_address.to_string(),
        ],
    }
}

pub fn mount_dir(language_tag: &str) -> &'static str {
    match language_tag.to_uppercase().as_str() {
        "GOLANG" => "/usr/local/bin",
        "JAVA" => "/root/chaincode-java/chaincode",
        "NODE" => "/usr/local/src",
        _ => "/usr/local/bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_platforms_case_insensitively() {
        assert!(is_supported("golang"));
        assert!(is_supported("Golang"));
        assert!(is_supported("JAVA"));
        assert!(is_supported("node"));
    }

    #[test]
    fn rejects_unknown_platform() {
        assert!(!is_supported("rust"));
    }

    #[test]
    fn mount_dir_falls_back_to_usr_local_bin() {
        assert_eq!(mount_dir("rust"), "/usr/local/bin");
        assert_eq!(mount_dir("node"), "/usr/local/src");
    }

    #[test]
    fn run_args_fallback_matches_go_shape() {
        let args = run_args("rust", "peer0:7052");
        assert_eq!(args, vec!["chaincode", "-peer.address", "peer0:7052"]);
    }
}
