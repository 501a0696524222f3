// Turn per-qubit result streams into labeled datasets.
//
// Two conventions coexist and must not be mixed up:
//
// * `fetch_results_as_dataset` appends `qubit` to the caller's axes and
//   then **reverses** the whole ordering. Streams are expected to be laid
//   out innermost-sweep-first, as the acquisition program buffers them, so
//   an axis `{amp, freq}` yields dims `[qubit, freq, amp]`.
// * `fetch_single_shot_results_as_dataset` keeps the caller's order and
//   puts `qubit` first: `{t, repetition}` yields `[qubit, t, repetition]`.
//   Streams whose axes arrive permuted are transposed into that order.

use ndarray::{stack, ArrayD, ArrayViewD, Axis, IxDyn};

use super::handles::{measurement_variables, stream_name, ResultHandles};
use super::model::{AxisValues, Dataset, MeasurementAxis, QUBIT_DIM};
use crate::error::{Result, StorageError};

/// Anything that identifies a qubit by name.
pub trait NamedQubit {
    fn name(&self) -> &str;
}

impl NamedQubit for str {
    fn name(&self) -> &str {
        self
    }
}

impl NamedQubit for String {
    fn name(&self) -> &str {
        self
    }
}

impl<Q: NamedQubit + ?Sized> NamedQubit for &Q {
    fn name(&self) -> &str {
        (**self).name()
    }
}

fn qubit_labels<Q: NamedQubit>(qubits: &[Q]) -> AxisValues {
    AxisValues::Labels(qubits.iter().map(|q| q.name().to_string()).collect())
}

/// Stack equally shaped arrays along a new leading axis.
fn stack_qubits(variable: &str, arrays: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
    let views: Vec<ArrayViewD<'_, f64>> = arrays.iter().map(|a| a.view()).collect();
    stack(Axis(0), &views).map_err(|e| {
        StorageError::InvalidDataset(format!(
            "streams of '{variable}' do not share a shape ({:?}): {e}",
            arrays.iter().map(|a| a.shape().to_vec()).collect::<Vec<_>>()
        ))
    })
}

/// Drop every axis of length 1.
fn squeeze(mut array: ArrayD<f64>) -> ArrayD<f64> {
    for axis in (0..array.ndim()).rev() {
        if array.len_of(Axis(axis)) == 1 {
            array = array.index_axis_move(Axis(axis), 0);
        }
    }
    array
}

// ---------------------------------------------------------------------------
// Standard variant
// ---------------------------------------------------------------------------

/// Fetch every `<variable><n>` stream and assemble a dataset.
///
/// `measurement_axis` gains a `qubit` entry holding the qubit names. The
/// dataset's dimension order is the reverse of the resulting axis order.
pub fn fetch_results_as_dataset<R, Q>(
    handles: &R,
    qubits: &[Q],
    measurement_axis: &mut MeasurementAxis,
) -> Result<Dataset>
where
    R: ResultHandles + ?Sized,
    Q: NamedQubit,
{
    let variables = measurement_variables(handles);

    let mut values = Vec::with_capacity(variables.len());
    for variable in &variables {
        let per_qubit = (0..qubits.len())
            .map(|i| handles.fetch(&stream_name(variable, i)))
            .collect::<Result<Vec<_>>>()?;
        values.push(stack_qubits(variable, &per_qubit)?);
    }

    if let Some(first) = values.first() {
        if let Some(other) = values.iter().find(|v| v.shape() != first.shape()) {
            return Err(StorageError::InvalidDataset(format!(
                "measurement variables differ in shape: {:?} vs {:?}",
                first.shape(),
                other.shape()
            )));
        }
        if first.ndim() > 1 && first.shape()[first.ndim() - 1] == 1 {
            values = values
                .into_iter()
                .map(|v| {
                    let last = v.ndim() - 1;
                    v.index_axis_move(Axis(last), 0)
                })
                .collect();
        }
    }

    measurement_axis.insert(QUBIT_DIM, qubit_labels(qubits));
    let coords = measurement_axis.reversed();
    let dims = coords.names();

    let mut ds = Dataset::new(coords);
    for (variable, data) in variables.into_iter().zip(values) {
        ds.add_variable(variable, dims.clone(), data)?;
    }
    Ok(ds)
}

// ---------------------------------------------------------------------------
// Validated ("single-shot") variant
// ---------------------------------------------------------------------------

/// Bring a fetched stream into the `expected` shape.
///
/// Singleton axes are squeezed first. A result with the same sizes in a
/// different order is transposed; anything else is an error.
fn conform(
    raw: ArrayD<f64>,
    expected: &[usize],
    variable: &str,
    position: usize,
) -> Result<ArrayD<f64>> {
    let arr = squeeze(raw);
    if arr.shape() == expected {
        return Ok(arr);
    }

    let mismatch = |got: &[usize]| StorageError::ShapeMismatch {
        variable: variable.to_string(),
        qubit_index: position + 1,
        got: got.to_vec(),
        expected: expected.to_vec(),
    };

    // expected axes of length 1 were squeezed away along with the rest
    let without_units: Vec<usize> = expected.iter().copied().filter(|&n| n != 1).collect();
    if arr.shape() == without_units.as_slice() {
        let got = arr.shape().to_vec();
        let flat: Vec<f64> = arr.iter().copied().collect();
        return ArrayD::from_shape_vec(IxDyn(expected), flat).map_err(|_| mismatch(&got));
    }

    let mut got_sorted = arr.shape().to_vec();
    let mut expected_sorted = expected.to_vec();
    got_sorted.sort_unstable();
    expected_sorted.sort_unstable();
    if got_sorted != expected_sorted {
        return Err(mismatch(arr.shape()));
    }

    let mut used = vec![false; arr.ndim()];
    let mut perm = Vec::with_capacity(expected.len());
    for &size in expected {
        let axis = (0..arr.ndim())
            .find(|&i| !used[i] && arr.shape()[i] == size)
            .ok_or_else(|| mismatch(arr.shape()))?;
        used[axis] = true;
        perm.push(axis);
    }
    log::debug!(
        "transposing {variable}{} from {:?} with permutation {perm:?}",
        position + 1,
        arr.shape()
    );
    Ok(arr.permuted_axes(perm))
}

/// Fetch every `<variable><n>` stream, validating each against the axis sizes.
///
/// Dimensions are `["qubit", <axes in the given order>]`. The axis
/// specification is not modified.
pub fn fetch_single_shot_results_as_dataset<R, Q>(
    handles: &R,
    qubits: &[Q],
    measurement_axis: &MeasurementAxis,
) -> Result<Dataset>
where
    R: ResultHandles + ?Sized,
    Q: NamedQubit,
{
    let variables = measurement_variables(handles);
    let expected = measurement_axis.expected_shape();

    let mut coords = MeasurementAxis::new().with(QUBIT_DIM, qubit_labels(qubits));
    for (name, values) in measurement_axis.iter() {
        coords.insert(name, values.clone());
    }
    let mut dims = vec![QUBIT_DIM.to_string()];
    dims.extend(measurement_axis.names());

    let mut ds = Dataset::new(coords);
    for variable in variables {
        let mut per_qubit = Vec::with_capacity(qubits.len());
        for i in 0..qubits.len() {
            let raw = handles.fetch(&stream_name(&variable, i))?;
            per_qubit.push(conform(raw, &expected, &variable, i)?);
        }
        let data = stack_qubits(&variable, &per_qubit)?;
        ds.add_variable(variable, dims.clone(), data)?;
    }
    Ok(ds)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ndarray::{arr1, arr2, Array, ArrayD};

    use super::*;

    fn handles(entries: Vec<(&str, ArrayD<f64>)>) -> BTreeMap<String, ArrayD<f64>> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn ramp(shape: &[usize], offset: f64) -> ArrayD<f64> {
        let n: usize = shape.iter().product();
        Array::from_iter((0..n).map(|i| i as f64 + offset))
            .into_shape_with_order(IxDyn(shape))
            .unwrap()
    }

    fn freqs() -> Vec<f64> {
        vec![5.0e9, 5.1e9, 5.2e9]
    }

    #[test]
    fn standard_variant_puts_qubit_first() {
        let h = handles(vec![
            ("I1", arr1(&[1.0, 2.0, 3.0]).into_dyn()),
            ("I2", arr1(&[4.0, 5.0, 6.0]).into_dyn()),
            ("Q1", arr1(&[7.0, 8.0, 9.0]).into_dyn()),
            ("Q2", arr1(&[10.0, 11.0, 12.0]).into_dyn()),
        ]);
        let mut axis = MeasurementAxis::new().with("freq", freqs());

        let ds = fetch_results_as_dataset(&h, &["q1", "q2"], &mut axis).unwrap();

        assert_eq!(ds.variable_names(), vec!["I", "Q"]);
        let i = ds.variable("I").unwrap();
        assert_eq!(i.dims, vec!["qubit", "freq"]);
        assert_eq!(i.shape(), &[2, 3]);
        assert_eq!(i.values[[1, 0]], 4.0);
        assert_eq!(ds.variable("Q").unwrap().values[[0, 2]], 9.0);
        assert_eq!(ds.qubit_names().unwrap(), vec!["q1", "q2"]);
    }

    #[test]
    fn standard_variant_appends_qubit_to_caller_axes() {
        let h = handles(vec![("I1", ramp(&[3, 2], 0.0))]);
        let mut axis = MeasurementAxis::new()
            .with("amp", vec![0.1, 0.2])
            .with("freq", freqs());

        let ds = fetch_results_as_dataset(&h, &["q1"], &mut axis).unwrap();

        assert_eq!(axis.names(), vec!["amp", "freq", "qubit"]);
        assert_eq!(ds.coords().names(), vec!["qubit", "freq", "amp"]);
        assert_eq!(ds.variable("I").unwrap().shape(), &[1, 3, 2]);
    }

    #[test]
    fn standard_variant_squeezes_trailing_singleton() {
        let h = handles(vec![
            ("state1", ramp(&[3, 1], 0.0)),
            ("state2", ramp(&[3, 1], 3.0)),
        ]);
        let mut axis = MeasurementAxis::new().with("freq", freqs());

        let ds = fetch_results_as_dataset(&h, &["q1".to_string(), "q2".to_string()], &mut axis)
            .unwrap();

        let state = ds.variable("state").unwrap();
        assert_eq!(state.shape(), &[2, 3]);
        assert_eq!(state.values, arr2(&[[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]).into_dyn());
    }

    #[test]
    fn standard_variant_reports_missing_stream() {
        let h = handles(vec![("I1", ramp(&[3], 0.0))]);
        let mut axis = MeasurementAxis::new().with("freq", freqs());
        let err = fetch_results_as_dataset(&h, &["q1", "q2"], &mut axis).unwrap_err();
        assert!(matches!(err, StorageError::MissingStream(ref k) if k == "I2"));
    }

    #[test]
    fn standard_variant_surfaces_construction_failure() {
        let h = handles(vec![("I1", ramp(&[4], 0.0))]);
        let mut axis = MeasurementAxis::new().with("freq", freqs());
        let err = fetch_results_as_dataset(&h, &["q1"], &mut axis).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDataset(_)));
    }

    #[test]
    fn single_shot_keeps_axis_order() {
        let h = handles(vec![
            ("I1", ramp(&[1, 1, 2, 3], 0.0)),
            ("I2", ramp(&[2, 3], 6.0)),
        ]);
        let axis = MeasurementAxis::new()
            .with("t", vec![16.0, 32.0])
            .with("repetition", 3usize);

        let ds = fetch_single_shot_results_as_dataset(&h, &["q1", "q2"], &axis).unwrap();

        let i = ds.variable("I").unwrap();
        assert_eq!(i.dims, vec!["qubit", "t", "repetition"]);
        assert_eq!(i.shape(), &[2, 2, 3]);
        assert_eq!(i.values[[1, 0, 0]], 6.0);
        assert_eq!(ds.coords().names(), vec!["qubit", "t", "repetition"]);
        assert_eq!(axis.names(), vec!["t", "repetition"]);
    }

    #[test]
    fn single_shot_transposes_permuted_axes() {
        // physically (3, 2) while the axes describe (2, 3)
        let raw = arr2(&[[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]]).into_dyn();
        let h = handles(vec![("I1", raw)]);
        let axis = MeasurementAxis::new()
            .with("t", vec![16.0, 32.0])
            .with("repetition", 3usize);

        let ds = fetch_single_shot_results_as_dataset(&h, &["q1"], &axis).unwrap();

        let i = ds.variable("I").unwrap();
        assert_eq!(i.shape(), &[1, 2, 3]);
        assert_eq!(i.values[[0, 0, 2]], 4.0);
        assert_eq!(i.values[[0, 1, 0]], 1.0);
    }

    #[test]
    fn single_shot_rejects_incompatible_shape() {
        let h = handles(vec![("I1", ramp(&[2, 3], 0.0)), ("I2", ramp(&[3, 2], 0.0))]);
        let axis = MeasurementAxis::new()
            .with("a", vec![0.0; 4])
            .with("b", vec![0.0; 5]);

        let err = fetch_single_shot_results_as_dataset(&h, &["q1", "q2"], &axis).unwrap_err();

        match err {
            StorageError::ShapeMismatch {
                variable,
                qubit_index,
                got,
                expected,
            } => {
                assert_eq!(variable, "I");
                assert_eq!(qubit_index, 1);
                assert_eq!(got, vec![2, 3]);
                assert_eq!(expected, vec![4, 5]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn single_shot_error_names_the_offending_stream() {
        let h = handles(vec![("I1", ramp(&[2, 3], 0.0)), ("I2", ramp(&[3, 3], 0.0))]);
        let axis = MeasurementAxis::new()
            .with("a", vec![0.0; 2])
            .with("b", vec![0.0; 3]);

        let err = fetch_single_shot_results_as_dataset(&h, &["q1", "q2"], &axis).unwrap_err();
        assert_eq!(
            err.to_string(),
            "shape mismatch for I2: got [3, 3], expected [2, 3]"
        );
    }

    #[test]
    fn single_shot_restores_unit_axes() {
        let h = handles(vec![("I1", ramp(&[4], 0.0))]);
        let axis = MeasurementAxis::new()
            .with("flux", vec![0.0])
            .with("repetition", 4usize);

        let ds = fetch_single_shot_results_as_dataset(&h, &["q1"], &axis).unwrap();
        assert_eq!(ds.variable("I").unwrap().shape(), &[1, 1, 4]);
    }

    #[test]
    fn squeeze_drops_all_singletons() {
        assert_eq!(squeeze(ramp(&[1, 3, 1, 2, 1], 0.0)).shape(), &[3, 2]);
        assert_eq!(squeeze(ramp(&[1], 0.0)).ndim(), 0);
    }
}
