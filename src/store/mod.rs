/// Experiment storage: numbered run folders and the bundles inside them.
///
/// ```text
///  <storage root>/
///    2024-06-01/
///      #12_resonator_spec/
///        ds.parquet         dataset (one or more data files)
///        data.json          run metadata, `initial_parameters`
///        quam_state.json    calibration state
/// ```
pub mod bundle;
pub mod locate;
pub mod parameters;
pub mod serial;

pub use bundle::{DatasetLoader, LoadedRun, DEFAULT_TARGET};
pub use locate::{find_numbered_folder, numbered_folders, NumberedFolder};
pub use parameters::{overlay_initial_parameters, INITIAL_PARAMETERS, LOAD_DATA_ID};
pub use serial::{IntoSerialNumber, SerialNumber};
