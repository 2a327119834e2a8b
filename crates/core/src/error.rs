#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("patient not found: {0}")]
    PatientNotFound(String),
    #[error("unknown status: {0}")]
    UnknownStatus(String),
    #[error("failed to create patient directory: {0}")]
    PatientDirCreation(std::io::Error),
    #[error("failed to write patient file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read patient file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize patient: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize patient: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to read status registry {path}: {source}", path = path.display())]
    RegistryRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("status registry schema mismatch at {path}: {message}")]
    RegistrySchema { path: String, message: String },
    #[error("duplicate status in registry: {0}")]
    DuplicateStatus(String),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
