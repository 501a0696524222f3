use std::collections::BTreeMap;
use std::fmt;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Name of the dimension that indexes qubits in every assembled dataset.
pub const QUBIT_DIM: &str = "qubit";

// ---------------------------------------------------------------------------
// AxisValues – coordinate values of a single axis
// ---------------------------------------------------------------------------

/// Coordinate values of one measurement axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisValues {
    /// Numeric sweep values (frequencies, amplitudes, idle times…).
    Values(Vec<f64>),
    /// Text labels, e.g. qubit names.
    Labels(Vec<String>),
    /// An axis given only by its size, e.g. the number of repetitions.
    Count(usize),
}

impl AxisValues {
    /// Number of points along the axis. A `Count` contributes the count itself.
    pub fn len(&self) -> usize {
        match self {
            AxisValues::Values(v) => v.len(),
            AxisValues::Labels(l) => l.len(),
            AxisValues::Count(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable label of the point at `index`.
    pub fn label(&self, index: usize) -> Option<String> {
        match self {
            AxisValues::Values(v) => v.get(index).map(|x| x.to_string()),
            AxisValues::Labels(l) => l.get(index).cloned(),
            AxisValues::Count(n) => (index < *n).then(|| index.to_string()),
        }
    }
}

impl From<Vec<f64>> for AxisValues {
    fn from(values: Vec<f64>) -> Self {
        AxisValues::Values(values)
    }
}

impl From<Vec<String>> for AxisValues {
    fn from(labels: Vec<String>) -> Self {
        AxisValues::Labels(labels)
    }
}

impl From<usize> for AxisValues {
    fn from(count: usize) -> Self {
        AxisValues::Count(count)
    }
}

// ---------------------------------------------------------------------------
// MeasurementAxis – ordered axis name → values mapping
// ---------------------------------------------------------------------------

/// Ordered mapping from axis name to coordinate values.
///
/// Order is significant: it decides the dimension order of assembled
/// datasets. Inserting an existing name replaces its values in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementAxis {
    axes: Vec<(String, AxisValues)>,
}

impl MeasurementAxis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MeasurementAxis::insert`].
    pub fn with(mut self, name: impl Into<String>, values: impl Into<AxisValues>) -> Self {
        self.insert(name, values);
        self
    }

    /// Insert or replace an axis. New names are appended at the end.
    pub fn insert(&mut self, name: impl Into<String>, values: impl Into<AxisValues>) {
        let name = name.into();
        let values = values.into();
        match self.axes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = values,
            None => self.axes.push((name, values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AxisValues> {
        self.axes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.axes.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AxisValues)> {
        self.axes.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Copy with the axis order reversed.
    pub fn reversed(&self) -> Self {
        Self {
            axes: self.axes.iter().rev().cloned().collect(),
        }
    }

    /// Size of each axis, in order.
    pub fn expected_shape(&self) -> Vec<usize> {
        self.axes.iter().map(|(_, v)| v.len()).collect()
    }
}

impl<N: Into<String>, V: Into<AxisValues>> FromIterator<(N, V)> for MeasurementAxis {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut axis = MeasurementAxis::new();
        for (name, values) in iter {
            axis.insert(name, values);
        }
        axis
    }
}

// ---------------------------------------------------------------------------
// DataVariable – one labeled n-dimensional array
// ---------------------------------------------------------------------------

/// A data variable: ordered dimension names and the values they label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataVariable {
    pub dims: Vec<String>,
    pub values: ArrayD<f64>,
}

impl DataVariable {
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }
}

// ---------------------------------------------------------------------------
// Dataset – labeled collection of data variables sharing coordinates
// ---------------------------------------------------------------------------

/// A labeled dataset: shared coordinates plus named data variables.
///
/// Every dimension of every variable must have a coordinate whose length
/// matches the variable's extent along that dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    coords: MeasurementAxis,
    data_vars: BTreeMap<String, DataVariable>,
}

impl Dataset {
    pub fn new(coords: MeasurementAxis) -> Self {
        Self {
            coords,
            data_vars: BTreeMap::new(),
        }
    }

    /// Add (or replace) a data variable after checking it against the coordinates.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        dims: Vec<String>,
        values: ArrayD<f64>,
    ) -> Result<()> {
        let name = name.into();
        if dims.len() != values.ndim() {
            return Err(StorageError::InvalidDataset(format!(
                "variable '{name}' has {} dims {dims:?} but {} axes of data (shape {:?})",
                dims.len(),
                values.ndim(),
                values.shape()
            )));
        }
        for (dim, &extent) in dims.iter().zip(values.shape()) {
            let coord = self.coords.get(dim).ok_or_else(|| {
                StorageError::InvalidDataset(format!(
                    "variable '{name}': dimension '{dim}' has no coordinate"
                ))
            })?;
            if coord.len() != extent {
                return Err(StorageError::InvalidDataset(format!(
                    "variable '{name}': dimension '{dim}' has length {extent} but its coordinate has {}",
                    coord.len()
                )));
            }
        }
        self.data_vars
            .insert(name, DataVariable { dims, values });
        Ok(())
    }

    pub fn coords(&self) -> &MeasurementAxis {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Option<&AxisValues> {
        self.coords.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.data_vars.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &DataVariable)> {
        self.data_vars.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Variable names in sorted order.
    pub fn variable_names(&self) -> Vec<String> {
        self.data_vars.keys().cloned().collect()
    }

    /// Qubit names carried by the `qubit` coordinate.
    pub fn qubit_names(&self) -> Result<Vec<String>> {
        match self.coords.get(QUBIT_DIM) {
            Some(AxisValues::Labels(names)) => Ok(names.clone()),
            Some(other) => Err(StorageError::InvalidDataset(format!(
                "'{QUBIT_DIM}' coordinate must hold labels, got {other:?}"
            ))),
            None => Err(StorageError::InvalidDataset(format!(
                "dataset has no '{QUBIT_DIM}' coordinate"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.data_vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_vars.is_empty()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset")?;
        writeln!(f, "Coordinates:")?;
        for (name, values) in self.coords.iter() {
            writeln!(f, "  {name} ({})", values.len())?;
        }
        writeln!(f, "Data variables:")?;
        for (name, var) in &self.data_vars {
            writeln!(f, "  {name} {:?} {:?}", var.dims, var.shape())?;
        }
        Ok(())
    }
}
