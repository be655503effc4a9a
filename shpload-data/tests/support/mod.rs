//! Writes small polygon shapefiles for integration tests.
#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use shpload_fs::write_bytes;
use tempfile::TempDir;

const POLYGON: i32 = 5;

/// `.prj` text for geographic CGCS2000.
pub const CGCS2000_PRJ: &str = r#"GEOGCS["GCS_China_Geodetic_Coordinate_System_2000",DATUM["D_China_2000",SPHEROID["CGCS2000",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// `.prj` text for geographic WGS 84.
pub const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Temporary directory with a UTF-8 path.
pub fn temp_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
    (dir, path)
}

/// Axis-aligned rectangle `[x0, y0, x1, y1]`.
pub type Rect = [f64; 4];

/// One attribute column: name, DBF type tag, length, decimals.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub tag: u8,
    pub length: u8,
    pub decimals: u8,
}

impl Column {
    pub const fn new(name: &'static str, tag: u8, length: u8, decimals: u8) -> Self {
        Self {
            name,
            tag,
            length,
            decimals,
        }
    }
}

/// In-memory description of a shapefile to write.
#[derive(Debug, Clone, Default)]
pub struct ShapefileFixture {
    columns: Vec<Column>,
    rows: Vec<(Option<Rect>, Vec<Vec<u8>>)>,
    extra_shapes: Vec<Rect>,
    prj: Option<String>,
    cpg: Option<String>,
}

impl ShapefileFixture {
    pub fn new(columns: &[Column]) -> Self {
        Self {
            columns: columns.to_vec(),
            ..Self::default()
        }
    }

    /// Append a record; `None` writes a null shape.
    pub fn row(mut self, rect: Option<Rect>, cells: &[&[u8]]) -> Self {
        self.rows
            .push((rect, cells.iter().map(|cell| cell.to_vec()).collect()));
        self
    }

    /// Append a shape with no attribute record behind it.
    pub fn with_extra_shape(mut self, rect: Rect) -> Self {
        self.extra_shapes.push(rect);
        self
    }

    pub fn with_prj(mut self, text: &str) -> Self {
        self.prj = Some(text.to_owned());
        self
    }

    pub fn with_cpg(mut self, label: &str) -> Self {
        self.cpg = Some(label.to_owned());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Write `<stem>.shp`, `.dbf` and any sidecars into `dir`, returning the
    /// `.shp` path.
    pub fn write(&self, dir: &Utf8Path, stem: &str) -> Utf8PathBuf {
        let shp = dir.join(format!("{stem}.shp"));
        write_bytes(&shp, &self.shp_bytes()).expect("write shp");
        write_bytes(&dir.join(format!("{stem}.dbf")), &self.dbf_bytes()).expect("write dbf");
        if let Some(prj) = &self.prj {
            write_bytes(&dir.join(format!("{stem}.prj")), prj.as_bytes()).expect("write prj");
        }
        if let Some(cpg) = &self.cpg {
            write_bytes(&dir.join(format!("{stem}.cpg")), cpg.as_bytes()).expect("write cpg");
        }
        shp
    }

    fn shp_bytes(&self) -> Vec<u8> {
        let mut records = Vec::new();
        let mut bounds: Option<Rect> = None;
        let shapes = self
            .rows
            .iter()
            .map(|(rect, _)| *rect)
            .chain(self.extra_shapes.iter().copied().map(Some));
        for (number, rect) in shapes.enumerate() {
            let content = match rect {
                Some(rect) => {
                    bounds = Some(match bounds {
                        Some(b) => [
                            b[0].min(rect[0]),
                            b[1].min(rect[1]),
                            b[2].max(rect[2]),
                            b[3].max(rect[3]),
                        ],
                        None => rect,
                    });
                    polygon_content(rect)
                }
                None => 0_i32.to_le_bytes().to_vec(),
            };
            let record_number = i32::try_from(number + 1).expect("record number");
            let words = i32::try_from(content.len() / 2).expect("content length");
            records.extend_from_slice(&record_number.to_be_bytes());
            records.extend_from_slice(&words.to_be_bytes());
            records.extend_from_slice(&content);
        }

        let mut out = Vec::with_capacity(100 + records.len());
        out.extend_from_slice(&9994_i32.to_be_bytes());
        out.extend_from_slice(&[0_u8; 20]);
        let file_words = i32::try_from((100 + records.len()) / 2).expect("file length");
        out.extend_from_slice(&file_words.to_be_bytes());
        out.extend_from_slice(&1000_i32.to_le_bytes());
        out.extend_from_slice(&POLYGON.to_le_bytes());
        for value in bounds.unwrap_or_default() {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&[0_u8; 32]);
        out.extend_from_slice(&records);
        out
    }

    fn dbf_bytes(&self) -> Vec<u8> {
        let record_len: usize = 1 + self
            .columns
            .iter()
            .map(|c| usize::from(c.length))
            .sum::<usize>();
        let header_len = 32 + self.columns.len() * 32 + 1;
        let mut out = vec![0_u8; 32];
        out[0] = 0x03;
        out[4..8].copy_from_slice(&u32::try_from(self.rows.len()).expect("rows").to_le_bytes());
        out[8..10].copy_from_slice(&u16::try_from(header_len).expect("header").to_le_bytes());
        out[10..12].copy_from_slice(&u16::try_from(record_len).expect("record").to_le_bytes());
        for column in &self.columns {
            let mut descriptor = [0_u8; 32];
            descriptor[..column.name.len()].copy_from_slice(column.name.as_bytes());
            descriptor[11] = column.tag;
            descriptor[16] = column.length;
            descriptor[17] = column.decimals;
            out.extend_from_slice(&descriptor);
        }
        out.push(0x0D);
        for (_, cells) in &self.rows {
            out.push(b' ');
            for (column, cell) in self.columns.iter().zip(cells) {
                let mut padded = cell.clone();
                padded.resize(usize::from(column.length), b' ');
                out.extend_from_slice(&padded);
            }
        }
        out.push(0x1A);
        out
    }
}

/// Polygon record content for a rectangle with a clockwise outer ring.
fn polygon_content([x0, y0, x1, y1]: Rect) -> Vec<u8> {
    let ring = [(x0, y0), (x0, y1), (x1, y1), (x1, y0), (x0, y0)];
    let mut out = Vec::new();
    out.extend_from_slice(&POLYGON.to_le_bytes());
    for value in [x0, y0, x1, y1] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&1_i32.to_le_bytes());
    out.extend_from_slice(&i32::try_from(ring.len()).expect("points").to_le_bytes());
    out.extend_from_slice(&0_i32.to_le_bytes());
    for (x, y) in ring {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}
