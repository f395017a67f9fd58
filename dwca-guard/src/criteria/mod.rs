//! Built-in record and dataset criteria.
//!
//! | Criterion | Kind | Produces |
//! |-----------|------|----------|
//! | [`CompletenessCriterion`] | record | a result for every applicable record, failures as `RecordContentValue` |
//! | [`NumericRangeCriterion`] | record | failures only, `RecordContentValue` / `RecordContentBounds` |
//! | [`UniquenessEvaluator`](crate::uniqueness::UniquenessEvaluator) | record, two-phase | `FieldUniqueness` at finalize |
//! | [`RecordCountCriterion`] | dataset | `recordCount` |
//! | [`FieldCoverageCriterion`] | dataset | `<field>.coverage` |

mod completeness;
mod dataset;
mod numeric_range;
pub mod transformation;

pub use completeness::{CompletenessCriterion, CompletenessCriterionBuilder, COMPLETENESS_KEY};
pub use dataset::{FieldCoverageCriterion, RecordCountCriterion, RECORD_COUNT_KEY};
pub use numeric_range::{
    FieldRange, NumericRangeCriterion, NumericRangeCriterionBuilder, SentinelPair,
    NUMERIC_RANGE_KEY,
};
pub use transformation::{
    BoxedTransformation, TransformationResult, TransformationRule, TransformationSpec,
    ValueTransformation,
};
