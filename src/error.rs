use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("reading namespace file {path}: {source}")]
    Namespace {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transfer_volume.path must not be empty")]
    EmptyTransferPath,
    #[error("invalid resource quantity {value:?} for {field}: {reason}")]
    InvalidQuantity {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("reading {what} at {path}: {source}")]
    Read {
        what: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("chaincode id {0:?} is not of the form name:hash")]
    MalformedCcid(String),
    #[error("chaincode id hash {0:?} is shorter than 8 hex characters")]
    ShortCcidHash(String),
    #[error("language {0:?} is not a supported platform")]
    UnsupportedPlatform(String),
    #[error("build information at {path} is missing a non-empty image")]
    MissingImage { path: String },
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("creating staging directory {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("copying {from} to {to}: {source}")]
    Copy {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("creating pod {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("watching pod {name}: {source}")]
    Watch {
        name: String,
        #[source]
        source: kube::runtime::watcher::Error,
    },
    #[error("deleting pod {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("fetching owner pod {name}: {source}")]
    OwnerLookup {
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("streaming logs for pod {name}: {source}")]
    Logs {
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("constructing kubernetes client: {0}")]
    ClientInit(#[source] kube::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum WorkloadFailure {
    #[error("pod {pod} (chaincode {label:?}) did not succeed: {reason}")]
    Build {
        pod: String,
        label: String,
        reason: String,
    },
    #[error("pod {pod} (ccid {ccid:?}) did not succeed: {reason}")]
    Run {
        pod: String,
        ccid: String,
        reason: String,
    },
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("removing staging directory {path}: {source}")]
    Staging {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("deleting pod {name}: {source}")]
    Pod {
        name: String,
        #[source]
        source: kube::Error,
    },
}
