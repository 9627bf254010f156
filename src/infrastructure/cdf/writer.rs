// Minimal CDF v3 writer used to build fixtures in tests
use super::values::Endian;
use super::{CCR, CDR, CPR, CVVR, GDR, GZIP, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAGIC_V3, VVR, VXR, ZVDR};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

const CDR_SIZE: usize = 312;
const GDR_SIZE: usize = 84;
const CPR_SIZE: usize = 28;

enum Values {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I8(Vec<i8>),
}

impl Values {
    fn data_type(&self) -> i32 {
        match self {
            Values::F64(_) => 45,
            Values::F32(_) => 21,
            Values::I8(_) => 1,
        }
    }

    fn len(&self) -> usize {
        match self {
            Values::F64(v) => v.len(),
            Values::F32(v) => v.len(),
            Values::I8(v) => v.len(),
        }
    }

    fn encode(&self, endian: Endian) -> Vec<u8> {
        let big = endian == Endian::Big;
        match self {
            Values::F64(v) => v
                .iter()
                .flat_map(|x| if big { x.to_be_bytes() } else { x.to_le_bytes() })
                .collect(),
            Values::F32(v) => v
                .iter()
                .flat_map(|x| if big { x.to_be_bytes() } else { x.to_le_bytes() })
                .collect(),
            Values::I8(v) => v.iter().map(|x| *x as u8).collect(),
        }
    }
}

pub(crate) struct WriterVariable {
    name: String,
    dims: Vec<u32>,
    values: Values,
    compressed: bool,
    split_at: Option<usize>,
    max_rec: Option<i32>,
}

impl WriterVariable {
    fn new(name: &str, dims: &[u32], values: Values) -> Self {
        Self {
            name: name.to_string(),
            dims: dims.to_vec(),
            values,
            compressed: false,
            split_at: None,
            max_rec: None,
        }
    }

    pub(crate) fn f64(name: &str, dims: &[u32], values: &[f64]) -> Self {
        Self::new(name, dims, Values::F64(values.to_vec()))
    }

    pub(crate) fn f32(name: &str, dims: &[u32], values: &[f32]) -> Self {
        Self::new(name, dims, Values::F32(values.to_vec()))
    }

    pub(crate) fn i8(name: &str, values: &[i8]) -> Self {
        Self::new(name, &[], Values::I8(values.to_vec()))
    }

    pub(crate) fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Store the records in two blocks, the first holding `records` records.
    pub(crate) fn split_at(mut self, records: usize) -> Self {
        self.split_at = Some(records);
        self
    }

    /// Claim a different `MaxRec` than the data written.
    pub(crate) fn max_rec(mut self, max_rec: i32) -> Self {
        self.max_rec = Some(max_rec);
        self
    }

    fn values_per_record(&self) -> usize {
        self.dims
            .iter()
            .fold(1usize, |acc, d| acc.saturating_mul(*d as usize))
    }

    fn num_records(&self) -> usize {
        self.values.len() / self.values_per_record()
    }

    fn vdr_size(&self) -> usize {
        340 + 4 + 8 * self.dims.len()
    }

    /// `(first, last, stored bytes)` for every block.
    fn blocks(&self, endian: Endian) -> Vec<(i32, i32, Vec<u8>)> {
        let records = self.num_records();
        let encoded = self.values.encode(endian);
        let record_len = encoded.len() / records.max(1);
        let cuts = match self.split_at {
            Some(k) if k > 0 && k < records => vec![(0, k), (k, records)],
            _ => vec![(0, records)],
        };
        cuts.into_iter()
            .map(|(from, to)| {
                let raw = encoded[from * record_len..to * record_len].to_vec();
                let stored = if self.compressed { gzip(&raw) } else { raw };
                (from as i32, to as i32 - 1, stored)
            })
            .collect()
    }
}

pub(crate) struct CdfWriter {
    endian: Endian,
    variables: Vec<WriterVariable>,
    compress_file: bool,
}

impl CdfWriter {
    pub(crate) fn new(endian: Endian) -> Self {
        Self {
            endian,
            variables: Vec::new(),
            compress_file: false,
        }
    }

    pub(crate) fn variable(mut self, variable: WriterVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub(crate) fn compress_file(mut self, compress: bool) -> Self {
        self.compress_file = compress;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let image = self.build_uncompressed();
        if !self.compress_file {
            return image;
        }
        let payload = gzip(&image[8..]);
        let ccr_size = 32 + payload.len();
        let cpr_offset = 8 + ccr_size;
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC_V3);
        put_u32(&mut out, MAGIC_COMPRESSED);
        put_i64(&mut out, ccr_size as i64);
        put_i32(&mut out, CCR);
        put_i64(&mut out, cpr_offset as i64);
        put_i64(&mut out, (image.len() - 8) as i64);
        put_i32(&mut out, 0);
        out.extend_from_slice(&payload);
        write_cpr(&mut out);
        out
    }

    fn build_uncompressed(&self) -> Vec<u8> {
        let encoding = match self.endian {
            Endian::Big => 1,
            Endian::Little => 6,
        };
        let gdr_offset = 8 + CDR_SIZE;
        let mut cursor = gdr_offset + GDR_SIZE;

        struct Planned {
            vdr: usize,
            cpr: Option<usize>,
            vxr: usize,
            blocks: Vec<(i32, i32, Vec<u8>, usize)>,
        }

        let mut plans = Vec::new();
        for variable in &self.variables {
            let vdr = cursor;
            cursor += variable.vdr_size();
            let cpr = variable.compressed.then(|| {
                let at = cursor;
                cursor += CPR_SIZE;
                at
            });
            let raw_blocks = variable.blocks(self.endian);
            let vxr = cursor;
            cursor += 28 + 16 * raw_blocks.len();
            let mut blocks = Vec::new();
            for (first, last, data) in raw_blocks {
                let at = cursor;
                let header = if variable.compressed { 24 } else { 12 };
                cursor += header + data.len();
                blocks.push((first, last, data, at));
            }
            plans.push(Planned {
                vdr,
                cpr,
                vxr,
                blocks,
            });
        }
        let eof = cursor;

        let mut out = Vec::with_capacity(eof);
        put_u32(&mut out, MAGIC_V3);
        put_u32(&mut out, MAGIC_UNCOMPRESSED);

        // CDR
        put_i64(&mut out, CDR_SIZE as i64);
        put_i32(&mut out, CDR);
        put_i64(&mut out, gdr_offset as i64);
        for field in [3, 9, encoding, 1, 0, 0, 0, 2, -1] {
            put_i32(&mut out, field);
        }
        out.extend_from_slice(&[0u8; 256]);

        // GDR
        put_i64(&mut out, GDR_SIZE as i64);
        put_i32(&mut out, GDR);
        put_i64(&mut out, 0);
        put_i64(&mut out, plans.first().map_or(0, |p| p.vdr as i64));
        put_i64(&mut out, 0);
        put_i64(&mut out, eof as i64);
        put_i32(&mut out, 0);
        put_i32(&mut out, 0);
        put_i32(&mut out, -1);
        put_i32(&mut out, 0);
        put_i32(&mut out, self.variables.len() as i32);
        put_i64(&mut out, 0);
        put_i32(&mut out, 0);
        put_i32(&mut out, 0);
        put_i32(&mut out, -1);

        for (i, (variable, plan)) in self.variables.iter().zip(&plans).enumerate() {
            debug_assert_eq!(out.len(), plan.vdr);
            let next = plans.get(i + 1).map_or(0, |p| p.vdr as i64);
            let max_rec = variable
                .max_rec
                .unwrap_or(variable.num_records() as i32 - 1);
            let flags = if variable.compressed { 0b101 } else { 0b001 };

            put_i64(&mut out, variable.vdr_size() as i64);
            put_i32(&mut out, ZVDR);
            put_i64(&mut out, next);
            put_i32(&mut out, variable.values.data_type());
            put_i32(&mut out, max_rec);
            put_i64(&mut out, plan.vxr as i64);
            put_i64(&mut out, plan.vxr as i64);
            put_i32(&mut out, flags);
            for _ in 0..4 {
                put_i32(&mut out, 0);
            }
            put_i32(&mut out, 1);
            put_i32(&mut out, i as i32);
            put_i64(&mut out, plan.cpr.map_or(-1, |c| c as i64));
            put_i32(&mut out, 0);
            let mut name = [0u8; 256];
            name[..variable.name.len()].copy_from_slice(variable.name.as_bytes());
            out.extend_from_slice(&name);
            put_i32(&mut out, variable.dims.len() as i32);
            for dim in &variable.dims {
                put_i32(&mut out, *dim as i32);
            }
            for _ in &variable.dims {
                put_i32(&mut out, -1);
            }

            if let Some(cpr) = plan.cpr {
                debug_assert_eq!(out.len(), cpr);
                write_cpr(&mut out);
            }

            debug_assert_eq!(out.len(), plan.vxr);
            let n = plan.blocks.len();
            put_i64(&mut out, (28 + 16 * n) as i64);
            put_i32(&mut out, VXR);
            put_i64(&mut out, 0);
            put_i32(&mut out, n as i32);
            put_i32(&mut out, n as i32);
            for (first, _, _, _) in &plan.blocks {
                put_i32(&mut out, *first);
            }
            for (_, last, _, _) in &plan.blocks {
                put_i32(&mut out, *last);
            }
            for (_, _, _, at) in &plan.blocks {
                put_i64(&mut out, *at as i64);
            }

            for (_, _, data, at) in &plan.blocks {
                debug_assert_eq!(out.len(), *at);
                if variable.compressed {
                    put_i64(&mut out, (24 + data.len()) as i64);
                    put_i32(&mut out, CVVR);
                    put_i32(&mut out, 0);
                    put_i64(&mut out, data.len() as i64);
                } else {
                    put_i64(&mut out, (12 + data.len()) as i64);
                    put_i32(&mut out, VVR);
                }
                out.extend_from_slice(data);
            }
        }
        debug_assert_eq!(out.len(), eof);
        out
    }
}

fn write_cpr(out: &mut Vec<u8>) {
    put_i64(out, CPR_SIZE as i64);
    put_i32(out, CPR);
    put_i32(out, GZIP);
    put_i32(out, 0);
    put_i32(out, 1);
    put_i32(out, 6);
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_be_bytes());
}
