use chrono::NaiveDate;

use crate::netcdf::Variable;

use super::AnalysisError;

/// Modified Julian Date of midnight on a calendar date
pub fn calendar_mjd(year: i32, month: u32, day: u32) -> Option<f64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)?;
    Some(date.signed_duration_since(epoch).num_days() as f64)
}

/// Convert vgosDB time tags to Modified Julian Date.
///
/// `ymdhm` holds year, month, day, hour and minute per epoch, stored either
/// as `[N, 5]` or `[5, N]`; `seconds` holds the matching seconds of minute.
pub fn ymdhm_to_mjd(ymdhm: &Variable, seconds: &[f64]) -> Result<Vec<f64>, AnalysisError> {
    let values = ymdhm
        .to_f64()
        .ok_or_else(|| AnalysisError::InvalidTime(format!("{} is not numeric", ymdhm.name)))?;
    let n = seconds.len();
    if values.len() != 5 * n {
        return Err(AnalysisError::Shape {
            what: ymdhm.name.clone(),
            expected: 5 * n,
            found: values.len(),
        });
    }

    // A leading axis of 5 holds the fields, even for a [5, 5] array
    let fields_first = ymdhm.shape.len() == 2 && ymdhm.shape[0] == 5;
    let field = |epoch: usize, k: usize| {
        if fields_first {
            values[k * n + epoch]
        } else {
            values[epoch * 5 + k]
        }
    };

    (0..n)
        .map(|i| {
            let (year, month, day) = (field(i, 0), field(i, 1), field(i, 2));
            let (hour, minute) = (field(i, 3), field(i, 4));
            let midnight = calendar_mjd(year as i32, month as u32, day as u32).ok_or_else(|| {
                AnalysisError::InvalidTime(format!("{year}-{month}-{day} is not a calendar date"))
            })?;
            Ok(midnight + (hour + minute / 60.0 + seconds[i] / 3600.0) / 24.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcdf::ArrayData;

    fn ymdhm(shape: Vec<usize>, values: Vec<i16>) -> Variable {
        Variable {
            name: "YMDHM".to_string(),
            dimensions: Vec::new(),
            shape,
            attributes: Vec::new(),
            data: ArrayData::Short(values),
        }
    }

    #[test]
    fn test_calendar_mjd() {
        assert_eq!(calendar_mjd(1858, 11, 17), Some(0.0));
        assert_eq!(calendar_mjd(2000, 1, 1), Some(51544.0));
        assert_eq!(calendar_mjd(2025, 5, 20), Some(60815.0));
        assert_eq!(calendar_mjd(2025, 2, 30), None);
    }

    #[test]
    fn test_rows_layout() {
        let var = ymdhm(vec![2, 5], vec![2025, 5, 20, 18, 0, 2025, 5, 20, 18, 30]);
        let mjd = ymdhm_to_mjd(&var, &[0.0, 36.0]).unwrap();
        assert!((mjd[0] - 60815.75).abs() < 1e-9);
        assert!((mjd[1] - (60815.0 + 18.51 / 24.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fields_first_layout() {
        let var = ymdhm(vec![5, 2], vec![2025, 2025, 5, 5, 20, 21, 0, 12, 0, 0]);
        let mjd = ymdhm_to_mjd(&var, &[0.0, 0.0]).unwrap();
        assert_eq!(mjd, vec![60815.0, 60816.5]);
    }

    #[test]
    fn test_square_array_is_fields_first() {
        // Five epochs, one per column, on consecutive days at midnight
        let mut values = vec![2025; 5];
        values.extend([5; 5]);
        values.extend([20, 21, 22, 23, 24]);
        values.extend([0; 10]);
        let var = ymdhm(vec![5, 5], values);
        let mjd = ymdhm_to_mjd(&var, &[0.0; 5]).unwrap();
        assert_eq!(mjd, vec![60815.0, 60816.0, 60817.0, 60818.0, 60819.0]);
    }

    #[test]
    fn test_length_mismatch() {
        let var = ymdhm(vec![1, 5], vec![2025, 5, 20, 0, 0]);
        assert!(matches!(
            ymdhm_to_mjd(&var, &[0.0, 1.0]),
            Err(AnalysisError::Shape { .. })
        ));
    }
}
