//! Result writers: CSV tables and label stacks.

use crate::Result;
use log::info;
use ndarray::Axis;
use speckle_algorithms::CellAggregate;
use speckle_core::{LabelVolume, ObjectRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};

/// Writer for quantification and segmentation tables.
pub struct ResultWriter {
    writer: BufWriter<File>,
}

impl ResultWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes id-keyed per-cell rows as CSV.
    ///
    /// Missing means and ratios are left blank.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_cell_table_csv(&mut self, rows: &[CellAggregate]) -> Result<()> {
        writeln!(self.writer, "cell_id,puncta_count,mean_volume,coloc")?;

        for row in rows {
            writeln!(
                self.writer,
                "{},{},{},{}",
                row.cell_id,
                row.puncta_count,
                optional(row.mean_volume),
                optional(row.coloc)
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes object records as CSV, centroids in `(z, x, y)` axis order.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_objects_csv(&mut self, objects: &[ObjectRecord]) -> Result<()> {
        writeln!(self.writer, "id,z,x,y,area")?;

        for o in objects {
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                o.id, o.centroid[0], o.centroid[1], o.centroid[2], o.area
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes the three population lists side by side, one row per index.
    ///
    /// Shorter columns are padded with blanks.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_averages_csv(
        &mut self,
        counts: &[usize],
        volumes: &[f64],
        colocs: &[f64],
    ) -> Result<()> {
        writeln!(self.writer, ",average_count,average_volume,average_coloc")?;

        let rows = counts.len().max(volumes.len()).max(colocs.len());
        for i in 0..rows {
            writeln!(
                self.writer,
                "{i},{},{},{}",
                optional(counts.get(i)),
                optional(volumes.get(i)),
                optional(colocs.get(i))
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes a label volume as a multi-page 32-bit grayscale TIFF, one page per
/// z-slice.
///
/// # Errors
/// Returns an error if the file cannot be created or encoded.
pub fn write_label_stack<P: AsRef<Path>>(path: P, labels: &LabelVolume) -> Result<()> {
    let (depth, height, width) = labels.dim();
    let (Ok(h), Ok(w)) = (u32::try_from(height), u32::try_from(width)) else {
        return Err(crate::Error::InvalidFormat(format!(
            "slice {height}x{width} too large for TIFF"
        )));
    };

    let mut writer = BufWriter::new(File::create(&path)?);
    {
        let mut encoder = TiffEncoder::new(&mut writer)?;
        for slice in labels.axis_iter(Axis(0)) {
            let page: Vec<u32> = slice.iter().copied().collect();
            encoder.write_image::<colortype::Gray32>(w, h, &page)?;
        }
    }
    writer.flush()?;
    info!(
        "wrote {depth} label slice(s) to {}",
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use speckle_core::ObjectId;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_cell_table_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = ResultWriter::create(file.path()).unwrap();

        let rows = vec![
            CellAggregate {
                cell_id: ObjectId(3),
                puncta: vec![ObjectId(1), ObjectId(2)],
                puncta_count: 2,
                mean_volume: Some(1.5),
                coloc: Some(0.5),
            },
            CellAggregate {
                cell_id: ObjectId(9),
                puncta: vec![ObjectId(4)],
                puncta_count: 1,
                mean_volume: Some(2.0),
                coloc: None,
            },
        ];

        writer.write_cell_table_csv(&rows).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "cell_id,puncta_count,mean_volume,coloc",
                "3,2,1.5,0.5",
                "9,1,2,"
            ]
        );
    }

    #[test]
    fn test_write_objects_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = ResultWriter::create(file.path()).unwrap();

        writer
            .write_objects_csv(&[ObjectRecord::new(1, [1.0, 2.5, 3.0], 27.0)])
            .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("id,z,x,y,area"));
        assert!(content.contains("1,1,2.5,3,27"));
    }

    #[test]
    fn test_write_averages_pads_short_columns() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = ResultWriter::create(file.path()).unwrap();

        writer.write_averages_csv(&[2, 3], &[1.25], &[]).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[1], "0,2,1.25,");
        assert_eq!(lines[2], "1,3,,");
    }

    #[test]
    fn test_label_stack_complete_on_return() {
        let file = NamedTempFile::new().unwrap();
        let mut labels = LabelVolume::zeros((3, 4, 5));
        labels[[2, 3, 4]] = 7;
        write_label_stack(file.path(), &labels).unwrap();

        let mut decoder = tiff::decoder::Decoder::new(File::open(file.path()).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (5, 4));
        let mut pages = 1;
        while decoder.more_images() {
            decoder.next_image().unwrap();
            pages += 1;
        }
        assert_eq!(pages, 3);
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U32(page) => assert_eq!(page[19], 7),
            other => panic!("unexpected sample type {other:?}"),
        }
    }
}
