//! Pixel plumbing between images and the network.
//!
//! A [`Raster`] holds normalized channel values (`[0, 1]`) in row-major pixel order. Each
//! pixel is predicted from its predecessor in raster order: the network input is the
//! previous pixel's channels followed by a constant `1.0`, and the output is the pixel's
//! channels. So a raster with `c` channels needs a network of input width `c + 1` and
//! output width `c`.
//!
//! Which pixels are corrupt is decided here by a [`CorruptionMask`], never by the network.

use tracing::debug;

use crate::{Blend, Error, Mlp, Result, Sample};

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
}

/// Rule for telling corrupt pixels apart from intact ones.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CorruptionMask {
    /// Every pixel is intact.
    #[default]
    None,
    /// A pixel is corrupt when its first channel is below the threshold.
    Threshold(f32),
}

impl CorruptionMask {
    /// Dark-pixel threshold used when none is configured.
    pub const DEFAULT_THRESHOLD: f32 = 0.1;

    #[inline]
    pub fn is_corrupt(self, pixel: &[f32]) -> bool {
        match self {
            CorruptionMask::None => false,
            CorruptionMask::Threshold(t) => pixel.first().is_some_and(|&v| v < t),
        }
    }
}

impl Raster {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(Error::InvalidData(format!(
                "raster dims must be > 0, got {width}x{height}x{channels}"
            )));
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(Error::ShapeMismatch(format!(
                "raster data len {} does not match {width}x{height}x{channels} ({expected})",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// From 8-bit samples, mapped to `[0, 1]`.
    pub fn from_u8(width: usize, height: usize, channels: usize, bytes: &[u8]) -> Result<Self> {
        let data = bytes.iter().map(|&b| f32::from(b) / 255.0).collect();
        Self::new(width, height, channels, data)
    }

    /// To 8-bit samples, clamping to the displayable range.
    pub fn to_u8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8)
            .collect()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn pixel(&self, idx: usize) -> &[f32] {
        let start = idx * self.channels;
        &self.data[start..start + self.channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, idx: usize) -> &mut [f32] {
        let start = idx * self.channels;
        &mut self.data[start..start + self.channels]
    }

    /// Network input for pixel `idx`: the previous pixel plus a constant `1.0`.
    pub fn encode_input(&self, idx: usize, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.channels + 1);
        if idx == 0 {
            out[..self.channels].fill(0.0);
        } else {
            out[..self.channels].copy_from_slice(self.pixel(idx - 1));
        }
        out[self.channels] = 1.0;
    }

    fn check_network(&self, mlp: &Mlp) -> Result<()> {
        if mlp.input_dim() != self.channels + 1 || mlp.output_dim() != self.channels {
            return Err(Error::ShapeMismatch(format!(
                "a {}-channel raster needs input width {} and output width {}, network has {} and {}",
                self.channels,
                self.channels + 1,
                self.channels,
                mlp.input_dim(),
                mlp.output_dim()
            )));
        }
        Ok(())
    }
}

/// One sample per intact pixel, in raster order.
pub fn training_samples(raster: &Raster, mask: CorruptionMask) -> Vec<Sample> {
    let mut input = vec![0.0; raster.channels() + 1];
    (0..raster.len())
        .filter(|&i| !mask.is_corrupt(raster.pixel(i)))
        .map(|i| {
            raster.encode_input(i, &mut input);
            Sample::new(input.clone(), raster.pixel(i).to_vec())
        })
        .collect()
}

/// Replace every corrupt pixel with the network's prediction, in raster order.
///
/// Later pixels are predicted from already reconstructed neighbours. Predictions are
/// clamped to `[0, 1]`. Returns the number of replaced pixels.
pub fn reconstruct(
    mlp: &Mlp,
    raster: &mut Raster,
    mask: CorruptionMask,
    blend: Option<Blend>,
) -> Result<usize> {
    raster.check_network(mlp)?;

    let mut cache = mlp.activations();
    let mut input = vec![0.0; mlp.input_dim()];
    let mut prediction = vec![0.0; mlp.output_dim()];
    let mut blended = vec![0.0; mlp.output_dim()];
    let mut replaced = 0;

    for i in 0..raster.len() {
        if !mask.is_corrupt(raster.pixel(i)) {
            continue;
        }
        raster.encode_input(i, &mut input);
        mlp.predict_into(&input, &mut cache, &mut prediction)?;
        let value = match blend {
            Some(b) => {
                b.apply(&input, &prediction, &mut blended)?;
                &blended
            }
            None => &prediction,
        };
        for (dst, &v) in raster.pixel_mut(i).iter_mut().zip(value.iter()) {
            *dst = v.clamp(0.0, 1.0);
        }
        replaced += 1;
    }

    debug!(pixels = raster.len(), replaced, "raster reconstructed");
    Ok(replaced)
}
