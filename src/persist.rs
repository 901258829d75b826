//! Binary model persistence.
//!
//! Two layouts share one parameter payload: the flat `f32` sequence produced by
//! [`Mlp::export_parameters`] (all weights, then all biases), little-endian.
//!
//! - [`Format::Legacy`]: the payload alone. There is no shape metadata, so a load only
//!   checks the total element count against the receiving network.
//! - [`Format::Framed`] (default): a header carrying the topology, followed by the payload.
//!
//! Framed layout, all fields little-endian:
//!
//! ```text
//! magic "PMLP" | version u32 | activation u32 | learning_rate f32
//! | width_count u32 | widths u32 * width_count | payload f32 * param_count
//! ```

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::store::validate_widths;
use crate::{Activation, Error, LayerStore, Mlp, NetworkConfig, Result};

pub const MAGIC: [u8; 4] = *b"PMLP";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Header with topology, then parameters.
    #[default]
    Framed,
    /// Headerless flat parameters.
    Legacy,
}

/// Framed files start with [`MAGIC`]; anything else is treated as legacy.
pub fn detect_format(bytes: &[u8]) -> Format {
    if bytes.starts_with(&MAGIC) {
        Format::Framed
    } else {
        Format::Legacy
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Header {
    activation: Activation,
    learning_rate: f32,
    widths: Vec<usize>,
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.bytes.len() - self.pos < n {
            return Err(Error::InvalidData(format!(
                "truncated model: missing {what} at byte {}",
                self.pos
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self, what: &str) -> Result<f32> {
        let b = self.take(4, what)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

fn encode_params(params: &[f32], out: &mut Vec<u8>) {
    out.reserve(params.len() * 4);
    for v in params {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn decode_params(bytes: &[u8], expected: usize) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::ShapeMismatch(format!(
            "parameter payload of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    let count = bytes.len() / 4;
    if count != expected {
        return Err(Error::ShapeMismatch(format!(
            "payload holds {count} parameters, network expects {expected}"
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn param_count_for(widths: &[usize]) -> Result<usize> {
    widths.windows(2).try_fold(0_usize, |acc, w| {
        w[0].checked_mul(w[1])
            .and_then(|n| n.checked_add(w[1]))
            .and_then(|n| n.checked_add(acc))
            .ok_or_else(|| Error::InvalidData("parameter count overflow".to_owned()))
    })
}

fn decode_framed(bytes: &[u8]) -> Result<(Header, Vec<f32>)> {
    let mut r = ByteReader::new(bytes);
    if r.take(4, "magic")? != MAGIC {
        return Err(Error::InvalidData("missing framed model magic".to_owned()));
    }
    let version = r.u32("version")?;
    if version != FORMAT_VERSION {
        return Err(Error::InvalidData(format!(
            "unsupported model format version {version}; expected {FORMAT_VERSION}"
        )));
    }
    let tag = r.u32("activation")?;
    let activation = Activation::from_tag(tag)
        .ok_or_else(|| Error::InvalidData(format!("unknown activation tag {tag}")))?;
    let learning_rate = r.f32("learning rate")?;
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(Error::InvalidData(format!(
            "stored learning rate must be finite and > 0, got {learning_rate}"
        )));
    }

    let count = r.u32("width count")? as usize;
    // Every width takes 4 bytes; refuse counts the remaining input cannot hold.
    if count > r.rest().len() / 4 {
        return Err(Error::InvalidData(format!(
            "width count {count} exceeds the remaining input"
        )));
    }
    let mut widths = Vec::with_capacity(count);
    for i in 0..count {
        widths.push(r.u32(&format!("width {i}"))? as usize);
    }
    validate_widths(&widths).map_err(|e| Error::InvalidData(e.to_string()))?;

    let params = decode_params(r.rest(), param_count_for(&widths)?)?;
    let header = Header {
        activation,
        learning_rate,
        widths,
    };
    Ok((header, params))
}

fn write_all<W: Write>(mut w: W, bytes: &[u8]) -> Result<()> {
    w.write_all(bytes)
        .and_then(|()| w.flush())
        .map_err(|e| Error::persistence("failed to write model", e))
}

fn read_all<R: Read>(mut r: R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)
        .map_err(|e| Error::persistence("failed to read model", e))?;
    Ok(bytes)
}

impl Mlp {
    /// Encode the network in `format`.
    pub fn to_bytes(&self, format: Format) -> Vec<u8> {
        let params = self.export_parameters();
        let mut out = Vec::new();
        if format == Format::Framed {
            let widths = self.widths();
            out.extend_from_slice(&MAGIC);
            out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
            out.extend_from_slice(&self.activation().tag().to_le_bytes());
            out.extend_from_slice(&self.learning_rate().to_le_bytes());
            out.extend_from_slice(&(widths.len() as u32).to_le_bytes());
            for w in widths {
                out.extend_from_slice(&(w as u32).to_le_bytes());
            }
        }
        encode_params(&params, &mut out);
        out
    }

    /// Build a network from framed bytes alone.
    pub fn from_framed_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, params) = decode_framed(bytes)?;
        let mut store = LayerStore::zeros(&header.widths, header.learning_rate)?;
        store.import_parameters(&params)?;
        Ok(Mlp::new(store, header.activation))
    }

    /// Overwrite parameters from bytes in either format.
    ///
    /// Framed input must declare exactly this network's widths and activation. The
    /// learning rate stored in a framed header is ignored here.
    ///
    /// A legacy payload can start with the magic by chance. When such input does not
    /// parse as framed but has exactly this network's legacy size, it is read as legacy.
    pub fn load_bytes_into(&mut self, bytes: &[u8]) -> Result<Format> {
        match detect_format(bytes) {
            Format::Framed => {
                let (header, params) = match decode_framed(bytes) {
                    Ok(decoded) => decoded,
                    Err(e) if !self.fits_legacy(bytes) => return Err(e),
                    Err(e) => {
                        debug!(error = %e, "not a framed model, reading as legacy");
                        self.import_legacy(bytes)?;
                        return Ok(Format::Legacy);
                    }
                };
                if header.widths != self.widths() {
                    return Err(Error::ShapeMismatch(format!(
                        "saved widths {:?} do not match network widths {:?}",
                        header.widths,
                        self.widths()
                    )));
                }
                if header.activation != self.activation() {
                    return Err(Error::InvalidData(format!(
                        "saved activation {:?} does not match network activation {:?}",
                        header.activation,
                        self.activation()
                    )));
                }
                self.import_parameters(&params)?;
                Ok(Format::Framed)
            }
            Format::Legacy => {
                self.import_legacy(bytes)?;
                Ok(Format::Legacy)
            }
        }
    }

    fn fits_legacy(&self, bytes: &[u8]) -> bool {
        self.store()
            .param_count()
            .checked_mul(4)
            .is_some_and(|len| len == bytes.len())
    }

    fn import_legacy(&mut self, bytes: &[u8]) -> Result<()> {
        let params = decode_params(bytes, self.store().param_count())?;
        self.import_parameters(&params)
    }

    pub fn write_legacy<W: Write>(&self, w: W) -> Result<()> {
        write_all(w, &self.to_bytes(Format::Legacy))
    }

    /// Read the headerless layout into this (already shaped) network.
    pub fn read_legacy<R: Read>(&mut self, r: R) -> Result<()> {
        self.import_legacy(&read_all(r)?)
    }

    pub fn write_framed<W: Write>(&self, w: W) -> Result<()> {
        write_all(w, &self.to_bytes(Format::Framed))
    }

    pub fn read_framed<R: Read>(r: R) -> Result<Self> {
        Self::from_framed_bytes(&read_all(r)?)
    }

    /// Write a snapshot to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P, format: Format) -> Result<()> {
        let p = path.as_ref();
        let file = File::create(p)
            .map_err(|e| Error::persistence(format!("failed to create {}", p.display()), e))?;
        write_all(BufWriter::new(file), &self.to_bytes(format))?;
        debug!(path = %p.display(), ?format, params = self.store().param_count(), "model saved");
        Ok(())
    }

    /// Build a network from a framed file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let bytes = read_file(p)?;
        let mlp = Self::from_framed_bytes(&bytes)?;
        debug!(path = %p.display(), widths = ?mlp.widths(), "model loaded");
        Ok(mlp)
    }

    /// Overwrite this network's parameters from a file in either format.
    pub fn load_into<P: AsRef<Path>>(&mut self, path: P) -> Result<Format> {
        let p = path.as_ref();
        let bytes = read_file(p)?;
        let format = self.load_bytes_into(&bytes)?;
        debug!(path = %p.display(), ?format, "parameters loaded");
        Ok(format)
    }
}

/// Build a network from a snapshot file in either format.
///
/// Framed files carry their own topology and activation. Legacy files only hold
/// parameters, so the network is shaped from `cfg` first.
pub fn load_any<P: AsRef<Path>>(path: P, cfg: &NetworkConfig) -> Result<Mlp> {
    let p = path.as_ref();
    let bytes = read_file(p)?;
    let framed = if detect_format(&bytes) == Format::Framed {
        Some(Mlp::from_framed_bytes(&bytes))
    } else {
        None
    };

    let mlp = match framed {
        Some(Ok(mlp)) => mlp,
        Some(Err(e)) => {
            let mut mlp = cfg.build_zeroed()?;
            if !mlp.fits_legacy(&bytes) {
                return Err(e);
            }
            debug!(error = %e, "not a framed model, reading as legacy");
            mlp.import_legacy(&bytes)?;
            mlp
        }
        None => {
            let mut mlp = cfg.build_zeroed()?;
            mlp.import_legacy(&bytes)?;
            mlp
        }
    };
    debug!(path = %p.display(), widths = ?mlp.widths(), "model loaded");
    Ok(mlp)
}

/// Read a whole snapshot file.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::persistence(format!("failed to open {}", path.display()), e))
}
