// Storage glue for calibration measurement data.
//
// * `data` – labeled datasets, assembly from per-qubit result streams,
//   Parquet / JSON files and CSV export.
// * `store` – numbered experiment folders and the bundles inside them.
// * `machine` – the calibration state saved with each run.
// * `config`, `logging`, `error` – settings, logger setup, errors.

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod machine;
pub mod store;

pub use data::assemble::{
    fetch_results_as_dataset, fetch_single_shot_results_as_dataset, NamedQubit,
};
pub use data::handles::{extract_prefix, ResultHandles, StreamHandle};
pub use data::model::{AxisValues, DataVariable, Dataset, MeasurementAxis, QUBIT_DIM};
pub use error::{Result, StorageError};
pub use machine::{Machine, Transmon};
pub use store::{find_numbered_folder, DatasetLoader, LoadedRun};
