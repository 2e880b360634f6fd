/// Default maximum characters per outbound segment.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// 1-based position of a segment within a multi-part reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPosition {
    pub ordinal: usize,
    pub total: usize,
}

impl std::fmt::Display for SegmentPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ordinal, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// `None` when the reply fit in a single message.
    pub position: Option<SegmentPosition>,
}

/// Split a reply into outbound segments of at most `chunk_size` characters.
///
/// Replies that fit are returned whole with no position. Longer replies are
/// cut into consecutive chunks numbered `1/n..n/n`; concatenating the chunk
/// texts gives back the original reply. Lengths count chars, not bytes.
pub fn split_reply(reply: &str, chunk_size: usize) -> Vec<Segment> {
    let chunk_size = chunk_size.max(1);
    if reply.chars().count() <= chunk_size {
        return vec![Segment {
            text: reply.to_string(),
            position: None,
        }];
    }

    let chars: Vec<char> = reply.chars().collect();
    let chunks: Vec<String> = chars
        .chunks(chunk_size)
        .map(|chunk| chunk.iter().collect())
        .collect();
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment {
            text,
            position: Some(SegmentPosition {
                ordinal: index + 1,
                total,
            }),
        })
        .collect()
}
