//! Reconciles requested array shapes with the bytes that are really there.

use std::fmt;
use std::str::FromStr;

use crate::diagnostics::Diagnostics;
use crate::error::WaveError;
use crate::prelude::*;

/// Which axis of a two-dimensional view holds frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// `(frames, channels)`; numpy's `'C'`.
    #[default]
    RowMajor,
    /// `(channels, frames)`; numpy's `'F'`.
    ColumnMajor,
}

impl Order {
    pub fn token(self) -> &'static str {
        match self {
            Order::RowMajor => "C",
            Order::ColumnMajor => "F",
        }
    }
}

impl FromStr for Order {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> R<Self> {
        match s {
            "C" => Ok(Order::RowMajor),
            "F" => Ok(Order::ColumnMajor),
            _ => Err(WaveError::BadOrder(s.to_string()).into()),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    One(usize),
    Two(usize, usize),
}

impl Shape {
    /// Wave data has one or two dimensions, never more or fewer.
    pub fn from_dims(dims: &[usize]) -> R<Self> {
        match *dims {
            [n] => Ok(Shape::One(n)),
            [a, b] => Ok(Shape::Two(a, b)),
            _ => Err(WaveError::BadShape(format!(
                "Wave files must have 1 or 2 dimensions, got {}",
                dims.len()
            ))
            .into()),
        }
    }

    /// Lays out `frames` x `channels`, squeezing mono unless `always_2d`.
    pub fn new(frames: usize, channels: usize, order: Order, always_2d: bool) -> Self {
        if channels == 1 && !always_2d {
            Shape::One(frames)
        } else {
            match order {
                Order::RowMajor => Shape::Two(frames, channels),
                Order::ColumnMajor => Shape::Two(channels, frames),
            }
        }
    }

    pub fn dims(&self) -> Vec<usize> {
        match *self {
            Shape::One(n) => vec![n],
            Shape::Two(a, b) => vec![a, b],
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            Shape::One(_) => 1,
            Shape::Two(..) => 2,
        }
    }

    /// Total number of elements, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    /// Total number of elements, or `None` if that overflows `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        match *self {
            Shape::One(n) => Some(n),
            Shape::Two(a, b) => a.checked_mul(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Order that keeps frames on the longer axis.
    pub fn inferred_order(&self) -> Order {
        match *self {
            Shape::Two(a, b) if a < b => Order::ColumnMajor,
            _ => Order::RowMajor,
        }
    }
}

impl From<usize> for Shape {
    fn from(n: usize) -> Self {
        Shape::One(n)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((a, b): (usize, usize)) -> Self {
        Shape::Two(a, b)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::One(n) => write!(f, "({},)", n),
            Shape::Two(a, b) => write!(f, "({}, {})", a, b),
        }
    }
}

/// How samples are arranged in a mapped view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub channels: usize,
    pub frames: usize,
    pub shape: Shape,
    pub order: Order,
    /// Bytes of the available span not covered by whole frames.
    pub discarded: u64,
}

impl FrameLayout {
    /// Bytes spanned by all frames. Fails if the count overflows.
    pub fn byte_len(&self, element_size: usize) -> R<u64> {
        self.frames
            .checked_mul(self.channels)
            .and_then(|n| n.checked_mul(element_size))
            .map(|n| n as u64)
            .ok_or_else(|| {
                WaveError::BadShape(format!(
                    "{} of {}-byte samples is too large",
                    self.shape, element_size
                ))
                .into()
            })
    }
}

/// Fits whole frames into `available` bytes.
///
/// Partial trailing frames are dropped and reported. A `requested` frame
/// count only ever shrinks the result.
pub fn read_layout(
    available: u64,
    element_size: usize,
    channels: usize,
    requested: Option<usize>,
    order: Order,
    always_2d: bool,
    diagnostics: &mut Diagnostics,
) -> R<FrameLayout> {
    if channels == 0 {
        return Err(WaveError::BadShape("channel count must be positive".to_string()).into());
    }

    let frame_size = (element_size * channels) as u64;
    let mut frames = (available / frame_size) as usize;

    match requested {
        Some(req) if req < frames => {
            diagnostics.warn(format!("Requested {} frames, got {}", req, frames));
            frames = req;
        }
        Some(req) if req > frames => {
            diagnostics.warn(format!("Requested {} frames, got {}", req, frames));
        }
        _ => {}
    }

    let extra = available % frame_size;
    if extra > 0 {
        diagnostics.warn(format!("{} bytes after end-of-frame discarded", extra));
    }

    Ok(FrameLayout {
        channels,
        frames,
        shape: Shape::new(frames, channels, order, always_2d),
        order,
        discarded: extra,
    })
}

/// Derives channels and frames for a file about to be created.
///
/// With no explicit `order`, the longer axis is taken to be frames and the
/// order is chosen so that the caller's dimension order is kept. An
/// explicit order decides which axis is which, even when that leaves more
/// channels than frames.
pub fn write_layout(shape: Shape, order: Option<Order>) -> FrameLayout {
    let (channels, frames, order) = match (shape, order) {
        (Shape::One(n), order) => (1, n, order.unwrap_or_default()),
        (Shape::Two(a, b), None) => {
            let order = shape.inferred_order();
            (a.min(b), a.max(b), order)
        }
        (Shape::Two(a, b), Some(Order::RowMajor)) => (b, a, Order::RowMajor),
        (Shape::Two(a, b), Some(Order::ColumnMajor)) => (a, b, Order::ColumnMajor),
    };

    FrameLayout {
        channels,
        frames,
        shape,
        order,
        discarded: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(
        available: u64,
        size: usize,
        channels: usize,
        requested: Option<usize>,
        always_2d: bool,
    ) -> (FrameLayout, Vec<String>) {
        let mut diagnostics = Diagnostics::collect();
        let layout = read_layout(
            available,
            size,
            channels,
            requested,
            Order::RowMajor,
            always_2d,
            &mut diagnostics,
        )
        .unwrap();
        (layout, diagnostics.take())
    }

    #[test]
    fn test_order_tokens() {
        assert_eq!("C".parse::<Order>().unwrap(), Order::RowMajor);
        assert_eq!("F".parse::<Order>().unwrap(), Order::ColumnMajor);
        let err = "K".parse::<Order>().unwrap_err();
        assert_eq!(
            err.downcast_ref::<WaveError>(),
            Some(&WaveError::BadOrder("K".to_string()))
        );
        assert_eq!(Order::ColumnMajor.to_string(), "F");
    }

    #[test]
    fn test_shape_dimensionality() {
        assert_eq!(Shape::from_dims(&[5]).unwrap(), Shape::One(5));
        assert_eq!(Shape::from_dims(&[5, 2]).unwrap(), Shape::Two(5, 2));
        assert!(Shape::from_dims(&[]).is_err());
        let err = Shape::from_dims(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WaveError>(),
            Some(WaveError::BadShape(_))
        ));
        assert_eq!(Shape::Two(3, 4).len(), 12);
        assert_eq!(Shape::Two(usize::MAX, 2).checked_len(), None);
        assert_eq!(Shape::Two(usize::MAX, 2).len(), usize::MAX);
        assert_eq!(Shape::One(7).to_string(), "(7,)");
    }

    #[test]
    fn test_exact_fit() {
        let (layout, warnings) = read(10, 2, 1, None, false);
        assert_eq!(layout.shape, Shape::One(5));
        assert_eq!(layout.discarded, 0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_partial_frame_discarded() {
        let (layout, warnings) = read(9, 2, 1, None, false);
        assert_eq!(layout.shape, Shape::One(4));
        assert_eq!(layout.discarded, 1);
        assert_eq!(warnings, vec!["1 bytes after end-of-frame discarded".to_string()]);

        let (layout, warnings) = read(23, 4, 2, None, false);
        assert_eq!(layout.shape, Shape::Two(2, 2));
        assert_eq!(warnings, vec!["7 bytes after end-of-frame discarded".to_string()]);
        assert!(layout.byte_len(4).unwrap() <= 23);
    }

    #[test]
    fn test_mono_squeeze() {
        let (layout, _) = read(10, 2, 1, None, true);
        assert_eq!(layout.shape, Shape::Two(5, 1));

        let mut diagnostics = Diagnostics::Silent;
        let layout =
            read_layout(10, 2, 1, None, Order::ColumnMajor, true, &mut diagnostics).unwrap();
        assert_eq!(layout.shape, Shape::Two(1, 5));
    }

    #[test]
    fn test_stereo_orders() {
        let mut diagnostics = Diagnostics::Silent;
        let row = read_layout(16, 2, 2, None, Order::RowMajor, false, &mut diagnostics).unwrap();
        let col = read_layout(16, 2, 2, None, Order::ColumnMajor, false, &mut diagnostics).unwrap();
        assert_eq!(row.shape, Shape::Two(4, 2));
        assert_eq!(col.shape, Shape::Two(2, 4));
    }

    #[test]
    fn test_requested_frames() {
        let (layout, warnings) = read(20, 2, 1, Some(3), false);
        assert_eq!(layout.frames, 3);
        assert_eq!(warnings, vec!["Requested 3 frames, got 10".to_string()]);

        let (layout, warnings) = read(20, 2, 1, Some(50), false);
        assert_eq!(layout.frames, 10);
        assert_eq!(warnings, vec!["Requested 50 frames, got 10".to_string()]);

        let (_, warnings) = read(20, 2, 1, Some(10), false);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_zero_channels_is_fatal() {
        let mut diagnostics = Diagnostics::Silent;
        assert!(read_layout(10, 2, 0, None, Order::RowMajor, false, &mut diagnostics).is_err());
    }

    #[test]
    fn test_write_layout_infers_order() {
        let layout = write_layout(Shape::Two(100, 2), None);
        assert_eq!((layout.frames, layout.channels), (100, 2));
        assert_eq!(layout.order, Order::RowMajor);

        let layout = write_layout(Shape::Two(2, 100), None);
        assert_eq!((layout.frames, layout.channels), (100, 2));
        assert_eq!(layout.order, Order::ColumnMajor);

        let layout = write_layout(Shape::One(8), None);
        assert_eq!((layout.frames, layout.channels), (8, 1));
        assert_eq!(layout.shape, Shape::One(8));
    }

    #[test]
    fn test_write_layout_explicit_order() {
        // Fewer frames than channels only works with an explicit order
        let layout = write_layout(Shape::Two(2, 6), Some(Order::RowMajor));
        assert_eq!((layout.frames, layout.channels), (2, 6));

        let layout = write_layout(Shape::Two(6, 2), Some(Order::ColumnMajor));
        assert_eq!((layout.frames, layout.channels), (2, 6));

        // An explicit order wins over "channels is the smaller dimension"
        let layout = write_layout(Shape::Two(100, 2), Some(Order::ColumnMajor));
        assert_eq!((layout.frames, layout.channels), (2, 100));
    }

    #[test]
    fn test_byte_len_overflow() {
        let layout = write_layout(Shape::One(1usize << 63), None);
        let err = layout.byte_len(2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WaveError>(),
            Some(WaveError::BadShape(_))
        ));
        assert_eq!(write_layout(Shape::Two(4, 2), None).byte_len(8).unwrap(), 64);
    }
}
