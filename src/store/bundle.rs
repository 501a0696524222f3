use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::locate::find_numbered_folder;
use super::parameters::overlay_initial_parameters;
use super::serial::IntoSerialNumber;
use crate::config::{LoaderOptions, Settings};
use crate::data::loader::load_file;
use crate::data::model::Dataset;
use crate::error::{Result, StorageError};
use crate::machine::{Machine, Transmon};

/// Default stem of the dataset file inside an experiment folder.
pub const DEFAULT_TARGET: &str = "ds";

/// Everything persisted for one run.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub folder: PathBuf,
    pub dataset: Dataset,
    pub machine: Machine,
    pub metadata: Value,
    /// Qubits of the calibration state, in the dataset's qubit order.
    pub qubits: Vec<Transmon>,
}

/// Reads experiment bundles from a storage tree.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    root: PathBuf,
    options: LoaderOptions,
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: LoaderOptions::default(),
        }
    }

    /// Use the storage location of the settings file.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.storage_location())
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder of run `serial`.
    pub fn locate(&self, serial: impl IntoSerialNumber) -> Result<PathBuf> {
        let serial = serial.into_serial_number()?;
        find_numbered_folder(&self.root, serial.0).ok_or_else(|| StorageError::FolderNotFound {
            serial: serial.0,
            root: self.root.clone(),
        })
    }

    /// Load run `serial`, reading the data file named `<target>.<ext>`.
    ///
    /// Returns `Ok(None)` when the folder holds no data file at all.
    pub fn load(&self, serial: impl IntoSerialNumber, target: &str) -> Result<Option<LoadedRun>> {
        let folder = self.locate(serial)?;

        let data_files = self.data_files(&folder)?;
        if data_files.is_empty() {
            log::warn!(
                "No .{} file found in folder: {}",
                self.options.data_extension,
                folder.display()
            );
            return Ok(None);
        }

        let data_path = data_files
            .into_iter()
            .find(|p| dataset_name(p) == Some(target))
            .ok_or_else(|| StorageError::DatasetFileNotFound {
                folder: folder.clone(),
                target: target.to_string(),
                extension: self.options.data_extension.clone(),
            })?;

        let dataset = load_file(&data_path)?;
        let metadata = read_metadata(&folder.join(&self.options.metadata_filename))?;

        let state_path = folder.join(&self.options.state_filename);
        let machine = match Machine::load(&state_path) {
            Ok(machine) => machine,
            Err(e) => {
                log::error!("Error loading machine: {e}");
                return Err(StorageError::MachineUnavailable(state_path));
            }
        };
        let qubits = cross_reference(&dataset, &machine)?;

        log::info!(
            "loaded {} ({} variables, {} qubits)",
            data_path.display(),
            dataset.len(),
            qubits.len()
        );
        Ok(Some(LoadedRun {
            folder,
            dataset,
            machine,
            metadata,
            qubits,
        }))
    }

    /// As [`DatasetLoader::load`], then overwrite `parameters` with the run's
    /// `initial_parameters` (except `load_data_id`).
    pub fn load_with_parameters<P>(
        &self,
        serial: impl IntoSerialNumber,
        target: &str,
        parameters: P,
    ) -> Result<Option<(LoadedRun, P)>>
    where
        P: Serialize + DeserializeOwned,
    {
        let Some(run) = self.load(serial, target)? else {
            return Ok(None);
        };
        let parameters = overlay_initial_parameters(parameters, &run.metadata)?;
        Ok(Some((run, parameters)))
    }

    /// Files in `folder` (not below it) carrying the data extension, sorted.
    fn data_files(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(folder)
            .map_err(|e| StorageError::io(folder, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|e| e == self.options.data_extension.as_str())
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

/// File name up to its first dot: `ds.v2.parquet` is dataset `ds`.
fn dataset_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.split('.').next()
}

fn read_metadata(path: &Path) -> Result<Value> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Calibration-state qubits matching the dataset's `qubit` coordinate, in order.
fn cross_reference(dataset: &Dataset, machine: &Machine) -> Result<Vec<Transmon>> {
    dataset
        .qubit_names()?
        .into_iter()
        .map(|name| {
            machine
                .qubit(&name)
                .cloned()
                .ok_or(StorageError::UnknownQubit(name))
        })
        .collect()
}
