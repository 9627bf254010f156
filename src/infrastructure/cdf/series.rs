// Sample series from the configured variables of a decoded file
use super::CdfFile;
use crate::domain::errors::DecodeError;
use crate::domain::samples::SampleSeries;
use crate::infrastructure::config::VariableLayout;

pub fn decode_series(cdf: &CdfFile, layout: &VariableLayout) -> Result<SampleSeries, DecodeError> {
    let time = cdf.read_f64(&layout.time)?.values;
    let flag = cdf.read_i64(&layout.flag)?.values;
    let data = cdf
        .read_f64(&layout.data)?
        .into_array2()
        .map_err(|e| DecodeError::bad_variable(&layout.data, e.to_string()))?;

    for index in [layout.channel_a, layout.channel_c] {
        if index >= data.ncols() {
            return Err(DecodeError::bad_variable(
                &layout.data,
                format!("channel {} out of range ({} channels)", index, data.ncols()),
            ));
        }
    }

    SampleSeries::new(
        time,
        flag,
        data.column(layout.channel_a).to_vec(),
        data.column(layout.channel_c).to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::samples::Channel;
    use crate::infrastructure::cdf::Endian;
    use crate::infrastructure::cdf::writer::{CdfWriter, WriterVariable};

    fn file(time: &[f64]) -> CdfFile {
        let data: Vec<f32> = (0..time.len())
            .flat_map(|i| [i as f32, -1.0, 100.0 + i as f32])
            .collect();
        let flag: Vec<i8> = vec![0; time.len()];
        let bytes = CdfWriter::new(Endian::Big)
            .variable(WriterVariable::f64("time_unix", &[], time))
            .variable(WriterVariable::i8("flag", &flag))
            .variable(WriterVariable::f32("data", &[3], &data))
            .build();
        CdfFile::from_bytes(bytes).unwrap()
    }

    #[test]
    fn test_selects_configured_channels() {
        let series = decode_series(&file(&[1.0, 2.0, 3.0]), &VariableLayout::default()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.channel(Channel::A), &[0.0, 1.0, 2.0]);
        assert_eq!(series.channel(Channel::C), &[100.0, 101.0, 102.0]);
        assert_eq!(series.flags(), &[0, 0, 0]);
    }

    #[test]
    fn test_rejects_channel_out_of_range() {
        let layout = VariableLayout {
            channel_c: 3,
            ..VariableLayout::default()
        };
        assert!(matches!(
            decode_series(&file(&[1.0]), &layout),
            Err(DecodeError::BadVariable { .. })
        ));
    }

    #[test]
    fn test_reports_missing_variable() {
        let layout = VariableLayout {
            time: "epoch".to_string(),
            ..VariableLayout::default()
        };
        assert!(matches!(
            decode_series(&file(&[1.0]), &layout),
            Err(DecodeError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_rejects_decreasing_time() {
        assert!(matches!(
            decode_series(&file(&[3.0, 2.0]), &VariableLayout::default()),
            Err(DecodeError::InconsistentSeries(_))
        ));
    }
}
