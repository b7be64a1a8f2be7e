//! Frames and frame catalogs.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::core::CatalogError;

/// One complete protocol message, written as a single unit.
///
/// The contents are opaque: the driver only looks at the length.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Arc<[u8]>);

impl Frame {
    /// Create a frame from owned bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

impl<const N: usize> From<[u8; N]> for Frame {
    fn from(bytes: [u8; N]) -> Self {
        Self(Arc::from(bytes.as_slice()))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.0.len())
            .field("bytes", &hex::encode(&self.0))
            .finish()
    }
}

/// Ordered, immutable list of frames making up one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence(Arc<[Frame]>);

impl FrameSequence {
    /// Create a sequence from frames.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self(Arc::from(frames))
    }

    /// Parse a hex catalog: one frame per line.
    ///
    /// Whitespace inside a line is ignored, blank lines are skipped, and
    /// `#` starts a comment.
    ///
    /// ```
    /// use gatt_replay::job::FrameSequence;
    ///
    /// let frames = FrameSequence::from_hex_lines(
    ///     "# wake\n66 06 00 10 00 84\n\n6602 # status\n",
    /// )
    /// .unwrap();
    /// assert_eq!(frames.len(), 2);
    /// assert_eq!(frames[1].as_bytes(), &[0x66, 0x02]);
    /// ```
    pub fn from_hex_lines(text: &str) -> Result<Self, CatalogError> {
        let mut frames = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let content = line.split('#').next().unwrap_or_default();
            let digits: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            if digits.is_empty() {
                continue;
            }
            let bytes = hex::decode(&digits).map_err(|e| CatalogError::InvalidHex {
                line: index + 1,
                message: e.to_string(),
            })?;
            frames.push(Frame::from(bytes));
        }

        if frames.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self::new(frames))
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Frame at `index`.
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.0.get(index)
    }

    /// Iterate over the frames.
    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.0.iter()
    }

    /// Sum of all frame lengths.
    pub fn total_bytes(&self) -> usize {
        self.0.iter().map(|frame| frame.len()).sum()
    }
}

impl Deref for FrameSequence {
    type Target = [Frame];

    fn deref(&self) -> &[Frame] {
        &self.0
    }
}

impl FromIterator<Frame> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<Frame>> for FrameSequence {
    fn from(frames: Vec<Frame>) -> Self {
        Self::new(frames)
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_views() {
        let frame = Frame::from([0x66, 0x35, 0x00]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.as_bytes(), &[0x66, 0x35, 0x00]);
        assert_eq!(frame.clone(), frame);
        assert!(format!("{frame:?}").contains("663500"));
    }

    #[test]
    fn test_sequence_from_frames() {
        let frames: FrameSequence = vec![vec![1u8], vec![2, 3], vec![4, 5, 6]]
            .into_iter()
            .map(Frame::from)
            .collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.total_bytes(), 6);
        assert_eq!(frames.get(1).unwrap().as_bytes(), &[2, 3]);
        assert!(frames.get(3).is_none());
    }

    #[test]
    fn test_hex_catalog() {
        let text = "\
# frame 1
66 35 00 1b
  # indented comment

66 2f00 1b # trailing
";
        let frames = FrameSequence::from_hex_lines(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_bytes(), &[0x66, 0x35, 0x00, 0x1b]);
        assert_eq!(frames[1].as_bytes(), &[0x66, 0x2f, 0x00, 0x1b]);
    }

    #[test]
    fn test_hex_catalog_errors() {
        assert_eq!(
            FrameSequence::from_hex_lines("# nothing\n\n"),
            Err(CatalogError::Empty)
        );

        let err = FrameSequence::from_hex_lines("6600\n66 0\n").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidHex { line: 2, .. }));

        let err = FrameSequence::from_hex_lines("zz").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidHex { line: 1, .. }));
    }
}
