//! Core data types, scalar primitives and I/O operations.

pub mod clock;
pub mod loaders;
pub mod sentinel;
pub mod table;
pub mod transforms;
pub mod writers;

pub use clock::{ClockError, EpochClock};
pub use loaders::{HubRecord, LoaderError, Sample, SensorStream};
pub use sentinel::{Reading, SentinelPolicy, SENTINEL_VALUE};
pub use table::{TextTable, TimeTable};
pub use transforms::{interpolate, lerp, InterpolationError};
pub use writers::{write_stream_csv, write_time_table_csv, write_vtk_structured_points, WriteError};
