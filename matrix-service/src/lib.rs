// Matrix Service Library
// Combination tree, status aggregation, visibility filtering and leaf execution

pub mod error;
pub mod execution;
pub mod filter;
pub mod notify;
pub mod report;
pub mod runners;
pub mod schema;
pub mod session;
pub mod tree;

// Re-export commonly used types
pub use error::{ServiceError, ServiceResult};

// Re-export schema types
pub use schema::{
    ConfigError, Dimension, DimensionSchema, MatrixConfig, MatrixConfigParser, ResultDimension,
    ResultKey, RunnerConfig, SchemaError, SchemaErrorKind,
};

// Re-export tree types
pub use tree::{
    aggregate, Leaf, Node, NodeCounts, NodeId, Status, SummaryCounts, Tree, TreeBuilder, ROOT_ID,
};

// Re-export execution types
pub use execution::{
    progress_channel, ExecutionEvent, ProgressReceiver, ProgressSender, RunHandle, RunReport,
    Scheduler,
};

pub use filter::{FilterError, VisibilityFilter};
pub use notify::{ChangeSink, NullSink};
pub use report::{MatrixSnapshot, ReportFormat, Reporter};
pub use runners::{LeafJob, LeafOutput, LeafTask, RunScope, SimulatedRunner};
pub use session::{LeafDetail, Session};
