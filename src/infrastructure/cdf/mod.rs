//! Reader for version 3 CDF (Common Data Format) files.
//!
//! Only what the flare pipeline needs is supported: numeric r- and
//! z-variables stored in VVRs or GZIP-compressed CVVRs, optionally inside a
//! GZIP-compressed file. Records must be contiguous from 0 to `MaxRec`.
//! Multi-dimensional records are returned flattened in file order.

mod series;
mod values;
#[cfg(test)]
pub(crate) mod writer;

pub use series::decode_series;
pub use values::{DataType, Endian};

use crate::domain::errors::DecodeError;
use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::io::Read;
use std::path::Path;

const MAGIC_V3: u32 = 0xCDF3_0001;
const MAGIC_V2_6: u32 = 0xCDF2_6002;
const MAGIC_UNCOMPRESSED: u32 = 0x0000_FFFF;
const MAGIC_COMPRESSED: u32 = 0xCCCC_0001;

const CDR: i32 = 1;
const GDR: i32 = 2;
const RVDR: i32 = 3;
const VXR: i32 = 6;
const VVR: i32 = 7;
const ZVDR: i32 = 8;
const CCR: i32 = 10;
const CPR: i32 = 11;
const CVVR: i32 = 13;

const GZIP: i32 = 5;

const VDR_FLAG_COMPRESSED: i32 = 0b100;
const VDR_NAME_OFFSET: usize = 84;
const VDR_NAME_LEN: usize = 256;
const VDR_DIMS_OFFSET: usize = VDR_NAME_OFFSET + VDR_NAME_LEN;

/// Bound on nested VXR depth.
const MAX_VXR_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    data_type: i32,
    num_elems: usize,
    max_rec: i64,
    record_shape: Vec<usize>,
    vxr_head: usize,
    compression: Option<i32>,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_shape(&self) -> &[usize] {
        &self.record_shape
    }

    pub fn num_records(&self) -> usize {
        usize::try_from(self.max_rec + 1).unwrap_or(0)
    }

    /// `None` when the declared dimensions overflow.
    fn values_per_record(&self) -> Option<usize> {
        self.record_shape
            .iter()
            .try_fold(self.num_elems, |acc, &size| acc.checked_mul(size))
    }
}

/// Values of one variable, record after record.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableData<T> {
    pub values: Vec<T>,
    pub num_records: usize,
}

impl<T> VariableData<T> {
    pub fn values_per_record(&self) -> usize {
        if self.num_records == 0 {
            0
        } else {
            self.values.len() / self.num_records
        }
    }

    /// Shape `(records, values per record)`.
    pub fn into_array2(self) -> Result<Array2<T>, ndarray::ShapeError> {
        let shape = (self.num_records, self.values_per_record());
        Array2::from_shape_vec(shape, self.values)
    }
}

/// A fully loaded CDF file.
pub struct CdfFile {
    bytes: Vec<u8>,
    endian: Endian,
    variables: Vec<Variable>,
}

impl CdfFile {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        let magic = be_u32(&bytes, 0)?;
        match magic {
            MAGIC_V3 => {}
            MAGIC_V2_6 | MAGIC_UNCOMPRESSED => return Err(DecodeError::UnsupportedVersion(magic)),
            other => return Err(DecodeError::BadMagic(other)),
        }
        let bytes = match be_u32(&bytes, 4)? {
            MAGIC_UNCOMPRESSED => bytes,
            MAGIC_COMPRESSED => decompress_file(&bytes)?,
            other => return Err(DecodeError::BadMagic(other)),
        };

        expect_record(&bytes, 8, CDR, "CDR")?;
        let gdr_offset = be_offset(&bytes, 8 + 12)?;
        let endian = Endian::from_encoding(be_i32(&bytes, 8 + 28)?)?;

        expect_record(&bytes, gdr_offset, GDR, "GDR")?;
        let r_vdr_head = be_offset(&bytes, gdr_offset + 12)?;
        let z_vdr_head = be_offset(&bytes, gdr_offset + 20)?;
        let num_r_vars = be_count(&bytes, gdr_offset + 44)?;
        let r_num_dims = be_count(&bytes, gdr_offset + 56)?;
        let num_z_vars = be_count(&bytes, gdr_offset + 60)?;
        let r_dim_sizes = (0..r_num_dims)
            .map(|i| be_count(&bytes, gdr_offset + 84 + 4 * i))
            .collect::<Result<Vec<_>, _>>()?;

        let mut variables = Vec::new();
        for (head, count, z) in [(r_vdr_head, num_r_vars, false), (z_vdr_head, num_z_vars, true)] {
            let mut offset = head;
            for _ in 0..count {
                if offset == 0 {
                    break;
                }
                let (variable, next) = parse_vdr(&bytes, offset, z, &r_dim_sizes)?;
                variables.push(variable);
                offset = next;
            }
        }

        Ok(Self {
            bytes,
            endian,
            variables,
        })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Result<&Variable, DecodeError> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| DecodeError::MissingVariable(name.to_string()))
    }

    /// Reads any numeric variable, widening to `f64`.
    pub fn read_f64(&self, name: &str) -> Result<VariableData<f64>, DecodeError> {
        let endian = self.endian;
        self.read_values(name, |dt, chunk| Some(dt.to_f64(endian, chunk)))
    }

    /// Reads an integer variable; floating-point variables are rejected.
    pub fn read_i64(&self, name: &str) -> Result<VariableData<i64>, DecodeError> {
        let endian = self.endian;
        let variable = self.variable(name)?;
        if DataType::from_code(variable.data_type).is_some_and(DataType::is_float) {
            return Err(DecodeError::bad_variable(name, "expected integer data"));
        }
        self.read_values(name, |dt, chunk| dt.to_i64(endian, chunk))
    }

    fn read_values<T>(
        &self,
        name: &str,
        decode: impl Fn(DataType, &[u8]) -> Option<T>,
    ) -> Result<VariableData<T>, DecodeError> {
        let variable = self.variable(name)?;
        let data_type =
            DataType::from_code(variable.data_type).ok_or_else(|| DecodeError::UnsupportedDataType {
                variable: name.to_string(),
                data_type: variable.data_type,
            })?;
        let record_len = variable
            .values_per_record()
            .and_then(|n| n.checked_mul(data_type.size()))
            .ok_or_else(|| DecodeError::bad_variable(name, "record size overflows"))?;
        let raw = self.record_bytes(variable, record_len)?;
        let values = raw
            .chunks_exact(data_type.size())
            .map(|chunk| decode(data_type, chunk))
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| DecodeError::UnsupportedDataType {
                variable: name.to_string(),
                data_type: variable.data_type,
            })?;
        Ok(VariableData {
            values,
            num_records: variable.num_records(),
        })
    }

    /// Concatenated bytes of records `0..=MaxRec`.
    fn record_bytes(&self, variable: &Variable, record_len: usize) -> Result<Vec<u8>, DecodeError> {
        let mut segments = Vec::new();
        if variable.vxr_head != 0 {
            self.collect_segments(variable, variable.vxr_head, 0, &mut segments)?;
        }
        segments.sort_by_key(|s| s.first);

        // Sizes come from the header; the buffer grows only with data actually present.
        let total = variable
            .num_records()
            .checked_mul(record_len)
            .ok_or_else(|| DecodeError::bad_variable(&variable.name, "variable size overflows"))?;
        let mut out = Vec::new();
        let mut expected = 0i64;
        for segment in segments {
            if segment.first > expected {
                return Err(DecodeError::MissingRecords {
                    variable: variable.name.clone(),
                    from: expected,
                    to: segment.first - 1,
                });
            }
            if segment.first < expected || segment.last < segment.first {
                return Err(DecodeError::bad_variable(&variable.name, "overlapping record ranges"));
            }
            let count = usize::try_from(segment.last - segment.first + 1).unwrap_or(0);
            let needed = count
                .checked_mul(record_len)
                .ok_or_else(|| DecodeError::bad_variable(&variable.name, "block size overflows"))?;
            if segment.data.len() < needed {
                return Err(DecodeError::bad_variable(
                    &variable.name,
                    format!(
                        "records {}..={} need {} bytes, block holds {}",
                        segment.first,
                        segment.last,
                        needed,
                        segment.data.len()
                    ),
                ));
            }
            out.extend_from_slice(&segment.data[..needed]);
            expected = segment.last + 1;
        }
        if expected <= variable.max_rec {
            return Err(DecodeError::MissingRecords {
                variable: variable.name.clone(),
                from: expected,
                to: variable.max_rec,
            });
        }
        out.truncate(total);
        Ok(out)
    }

    fn collect_segments(
        &self,
        variable: &Variable,
        head: usize,
        depth: usize,
        out: &mut Vec<Segment>,
    ) -> Result<(), DecodeError> {
        if depth > MAX_VXR_DEPTH {
            return Err(DecodeError::bad_variable(&variable.name, "VXR tree too deep"));
        }
        let bytes = &self.bytes;
        let mut offset = head;
        // Each VXR is at least 28 bytes, which bounds a well-formed chain.
        let mut budget = bytes.len() / 28 + 1;
        while offset != 0 {
            budget = budget
                .checked_sub(1)
                .ok_or_else(|| DecodeError::bad_variable(&variable.name, "VXR chain loops"))?;
            expect_record(bytes, offset, VXR, "VXR")?;
            let next = be_offset(bytes, offset + 12)?;
            let num_entries = be_count(bytes, offset + 20)?;
            let used = be_count(bytes, offset + 24)?.min(num_entries);
            let firsts = offset + 28;
            let lasts = firsts + 4 * num_entries;
            let offsets = lasts + 4 * num_entries;
            for i in 0..used {
                let first = i64::from(be_i32(bytes, firsts + 4 * i)?);
                let last = i64::from(be_i32(bytes, lasts + 4 * i)?);
                let entry = be_offset(bytes, offsets + 8 * i)?;
                let size = record_size(bytes, entry)?;
                match be_i32(bytes, entry + 8)? {
                    VXR => self.collect_segments(variable, entry, depth + 1, out)?,
                    VVR => out.push(Segment {
                        first,
                        last,
                        data: slice(bytes, entry + 12, size - 12)?.to_vec(),
                    }),
                    CVVR => {
                        match variable.compression {
                            Some(GZIP) => {}
                            Some(other) => return Err(DecodeError::UnsupportedCompression(other)),
                            None => {
                                return Err(DecodeError::bad_variable(
                                    &variable.name,
                                    "compressed block in an uncompressed variable",
                                ));
                            }
                        }
                        let compressed_len = be_offset(bytes, entry + 16)?;
                        let data = gunzip(slice(bytes, entry + 24, compressed_len)?)?;
                        out.push(Segment { first, last, data });
                    }
                    found => {
                        return Err(DecodeError::UnexpectedRecord {
                            offset: entry,
                            expected: "VXR, VVR or CVVR",
                            found,
                        });
                    }
                }
            }
            offset = next;
        }
        Ok(())
    }
}

struct Segment {
    first: i64,
    last: i64,
    data: Vec<u8>,
}

fn parse_vdr(
    bytes: &[u8],
    offset: usize,
    z: bool,
    r_dim_sizes: &[usize],
) -> Result<(Variable, usize), DecodeError> {
    let (kind, name) = if z { (ZVDR, "zVDR") } else { (RVDR, "rVDR") };
    expect_record(bytes, offset, kind, name)?;
    let next = be_offset(bytes, offset + 12)?;
    let data_type = be_i32(bytes, offset + 20)?;
    let max_rec = i64::from(be_i32(bytes, offset + 24)?);
    let vxr_head = be_offset(bytes, offset + 28)?;
    let flags = be_i32(bytes, offset + 44)?;
    let num_elems = be_count(bytes, offset + 64)?.max(1);
    let cpr_offset = be_offset(bytes, offset + 72)?;
    let name = parse_name(slice(bytes, offset + VDR_NAME_OFFSET, VDR_NAME_LEN)?);

    let mut pos = offset + VDR_DIMS_OFFSET;
    let dim_sizes = if z {
        let n = be_count(bytes, pos)?;
        pos += 4;
        let sizes = (0..n)
            .map(|i| be_count(bytes, pos + 4 * i))
            .collect::<Result<Vec<_>, _>>()?;
        pos += 4 * n;
        sizes
    } else {
        r_dim_sizes.to_vec()
    };
    let mut record_shape = Vec::with_capacity(dim_sizes.len());
    for (i, size) in dim_sizes.iter().enumerate() {
        if be_i32(bytes, pos + 4 * i)? != 0 {
            record_shape.push(*size);
        }
    }

    let compression = if flags & VDR_FLAG_COMPRESSED != 0 && cpr_offset != 0 {
        expect_record(bytes, cpr_offset, CPR, "CPR")?;
        Some(be_i32(bytes, cpr_offset + 12)?)
    } else {
        None
    };

    Ok((
        Variable {
            name,
            data_type,
            num_elems,
            max_rec,
            record_shape,
            vxr_head,
            compression,
        },
        next,
    ))
}

fn parse_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

/// Rebuilds an uncompressed image from a whole-file-compressed CDF.
fn decompress_file(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let size = expect_record(bytes, 8, CCR, "CCR")?;
    let cpr_offset = be_offset(bytes, 8 + 12)?;
    let ctype = {
        // CPR offsets refer to the compressed file itself.
        expect_record(bytes, cpr_offset, CPR, "CPR")?;
        be_i32(bytes, cpr_offset + 12)?
    };
    if ctype != GZIP {
        return Err(DecodeError::UnsupportedCompression(ctype));
    }
    let payload = slice(bytes, 8 + 32, size.saturating_sub(32))?;
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC_V3.to_be_bytes());
    out.extend_from_slice(&MAGIC_UNCOMPRESSED.to_be_bytes());
    out.extend(gunzip(payload)?);
    Ok(out)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(DecodeError::Decompress)?;
    Ok(out)
}

fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(DecodeError::Truncated {
            offset,
            needed: len,
            len: bytes.len(),
        })
}

fn be_u32(bytes: &[u8], offset: usize) -> Result<u32, DecodeError> {
    Ok(BigEndian::read_u32(slice(bytes, offset, 4)?))
}

fn be_i32(bytes: &[u8], offset: usize) -> Result<i32, DecodeError> {
    Ok(BigEndian::read_i32(slice(bytes, offset, 4)?))
}

fn be_i64(bytes: &[u8], offset: usize) -> Result<i64, DecodeError> {
    Ok(BigEndian::read_i64(slice(bytes, offset, 8)?))
}

/// An 8-byte file offset or length; negative values are treated as absent.
fn be_offset(bytes: &[u8], offset: usize) -> Result<usize, DecodeError> {
    Ok(usize::try_from(be_i64(bytes, offset)?).unwrap_or(0))
}

/// A 4-byte count; negative values are treated as zero.
fn be_count(bytes: &[u8], offset: usize) -> Result<usize, DecodeError> {
    Ok(usize::try_from(be_i32(bytes, offset)?).unwrap_or(0))
}

fn record_size(bytes: &[u8], offset: usize) -> Result<usize, DecodeError> {
    let size = be_offset(bytes, offset)?;
    if size < 12 {
        return Err(DecodeError::Truncated {
            offset,
            needed: 12,
            len: size,
        });
    }
    slice(bytes, offset, size)?;
    Ok(size)
}

/// Checks the record type at `offset` and returns the record size.
fn expect_record(
    bytes: &[u8],
    offset: usize,
    kind: i32,
    name: &'static str,
) -> Result<usize, DecodeError> {
    let size = record_size(bytes, offset)?;
    let found = be_i32(bytes, offset + 8)?;
    if found != kind {
        return Err(DecodeError::UnexpectedRecord {
            offset,
            expected: name,
            found,
        });
    }
    Ok(size)
}
