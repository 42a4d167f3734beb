use std::fmt;
use std::path::PathBuf;

/// A result file that cannot be read as an evaluation result.
///
/// Fatal: the pipeline aborts on the first one.
#[derive(Debug, Clone)]
pub struct FileFormatError {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for FileFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed result file {}: {}",
            self.path.display(),
            self.reason
        )
    }
}

impl std::error::Error for FileFormatError {}

/// Normalization was asked for a (task, metric) the reference table lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMissingError {
    pub task: String,
    pub metric: String,
}

impl fmt::Display for ReferenceMissingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no normalization reference for task '{}' metric '{}'",
            self.task, self.metric
        )
    }
}

impl std::error::Error for ReferenceMissingError {}

/// Reference row whose max equals its random baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegenerateReferenceError {
    pub task: String,
    pub metric: String,
}

impl fmt::Display for DegenerateReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reference for task '{}' metric '{}' has max equal to random baseline",
            self.task, self.metric
        )
    }
}

impl std::error::Error for DegenerateReferenceError {}

#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Input directory layout is unusable (missing roots and the like).
#[derive(Debug, Clone)]
pub struct StructuralError(pub String);

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StructuralError {}
