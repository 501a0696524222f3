use std::io;

use super::model::Dataset;
use crate::error::Result;

/// Write the dataset in long format: one CSV row per element.
///
/// Columns are `variable`, one column per coordinate (in coordinate
/// order) and `value`. Coordinates a variable does not span stay empty.
pub fn write_csv<W: io::Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let coord_names = dataset.coords().names();
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["variable".to_string()];
    header.extend(coord_names.iter().cloned());
    header.push("value".to_string());
    out.write_record(&header)?;

    for (name, var) in dataset.variables() {
        // position of each coordinate column within the variable's dims
        let columns: Vec<Option<usize>> = coord_names
            .iter()
            .map(|c| var.dims.iter().position(|d| d == c))
            .collect();

        for (index, value) in var.values.indexed_iter() {
            let mut record = Vec::with_capacity(header.len());
            record.push(name.to_string());
            for (coord, column) in coord_names.iter().zip(&columns) {
                let cell = match column {
                    Some(axis) => dataset
                        .coord(coord)
                        .and_then(|c| c.label(index[*axis]))
                        .unwrap_or_default(),
                    None => String::new(),
                };
                record.push(cell);
            }
            record.push(value.to_string());
            out.write_record(&record)?;
        }
    }

    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;
    use crate::data::model::{MeasurementAxis, QUBIT_DIM};

    #[test]
    fn one_row_per_element_with_coordinate_labels() {
        let coords = MeasurementAxis::new()
            .with(QUBIT_DIM, vec!["q1".to_string(), "q2".to_string()])
            .with("amp", vec![0.5, 1.0]);
        let mut ds = Dataset::new(coords);
        ds.add_variable(
            "I",
            vec![QUBIT_DIM.into(), "amp".into()],
            arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(),
        )
        .unwrap();
        ds.add_variable("T1", vec![QUBIT_DIM.into()], arr1(&[20.0, 30.0]).into_dyn())
            .unwrap();

        let mut buf = Vec::new();
        write_csv(&ds, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "variable,qubit,amp,value");
        assert_eq!(lines[1], "I,q1,0.5,1");
        assert_eq!(lines[4], "I,q2,1,4");
        assert_eq!(lines[5], "T1,q1,,20");
        assert_eq!(lines.len(), 1 + 4 + 2);
    }
}
