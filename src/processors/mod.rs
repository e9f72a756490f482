//! Data processing modules.

pub mod alignment;
pub mod cross;
pub mod curing;
pub mod field;
pub mod resampling;
pub mod splitting;

// Re-export key types for convenience
pub use alignment::{align_streams, sync_sensor_files, AlignedTable, AlignmentError, SyncReport};
pub use cross::{combine_curing_files, cross_resample, CrossError, CrossOutcome};
pub use curing::{parse_curing_files, ChannelFilter, CuringReport};
pub use field::{
    generate_field_files, reconstruct_field, FieldError, FieldInterpolator, FieldLayout,
    FieldRequest, SensorPosition, Snapshot, StructuredField,
};
pub use resampling::{
    resample_all, resample_stream, BracketState, ResampleError, ResampledStream,
    StreamResampler, TimeWindow,
};
pub use splitting::{convert_hub_units, split_hub_files, HubSummary};
