pub mod etl;
pub mod extract;
pub mod load;
pub mod transform;
pub mod validate;

pub use crate::domain::model::{
    Cell, InferredType, LoadSummary, Row, RowSet, SourceRecord, TableId, TargetSchema,
    TransformedPayload, ValidationIssue, ValidationReport,
};
pub use crate::domain::ports::{SourceDatabase, Warehouse};
pub use crate::utils::error::Result;
