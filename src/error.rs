use thiserror::Error;

/// Crate-wide error taxonomy, one variant per failure kind in the synthesis pipeline.
///
/// `DeathStar` signaling (interpolation running past a track's last row) is *not*
/// represented here — it is an intra-component control-flow value handled entirely
/// inside [`crate::stellar`] and never escapes to a caller.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("MIST asset missing: {path}")]
    MissingAsset { path: String },

    #[error("MIST table {path} is missing required column `{column}`")]
    MissingColumn { path: String, column: &'static str },

    #[error("interpolation kernel given rows of unequal length ({lhs} vs {rhs})")]
    SizeMismatch { lhs: usize, rhs: usize },

    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    #[error("stage `{stage}` failed at star index {index}: {source}")]
    Stage {
        stage: &'static str,
        index: usize,
        #[source]
        source: Box<GenError>,
    },

    #[error("octree sampler could not reach target count {requested} (stalled at {reached})")]
    OctreeStalled { requested: usize, reached: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, GenError>;
