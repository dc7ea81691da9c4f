use derive_more::Display;
use serde::{Deserialize, Serialize};

/// One of the three independently paced feeds.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Fast-horizon prediction stream.
    #[display("hft")]
    Hft,
    /// Slow-horizon prediction stream.
    #[display("idt")]
    Idt,
    /// Market snapshot stream.
    #[display("snapshot")]
    Snapshot,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::Hft, StreamKind::Idt, StreamKind::Snapshot];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Hft => "hft",
            StreamKind::Idt => "idt",
            StreamKind::Snapshot => "snapshot",
        }
    }

    /// Prediction profile used on the wire, `None` for the snapshot stream.
    pub fn profile(&self) -> Option<&'static str> {
        match self {
            StreamKind::Hft => Some("hft"),
            StreamKind::Idt => Some("idt"),
            StreamKind::Snapshot => None,
        }
    }

    pub fn is_prediction(&self) -> bool {
        matches!(self, StreamKind::Hft | StreamKind::Idt)
    }

    fn slot(&self) -> usize {
        match self {
            StreamKind::Hft => 0,
            StreamKind::Idt => 1,
            StreamKind::Snapshot => 2,
        }
    }
}

/// Exactly one `T` per [`StreamKind`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamMap<T>([T; 3]);

impl<T> StreamMap<T> {
    pub fn from_fn(mut init: impl FnMut(StreamKind) -> T) -> Self {
        Self(StreamKind::ALL.map(&mut init))
    }

    pub fn get(&self, stream: StreamKind) -> &T {
        &self.0[stream.slot()]
    }

    pub fn get_mut(&mut self, stream: StreamKind) -> &mut T {
        &mut self.0[stream.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (StreamKind, &T)> {
        StreamKind::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T> std::ops::Index<StreamKind> for StreamMap<T> {
    type Output = T;

    fn index(&self, stream: StreamKind) -> &Self::Output {
        self.get(stream)
    }
}

impl<T> std::ops::IndexMut<StreamKind> for StreamMap<T> {
    fn index_mut(&mut self, stream: StreamKind) -> &mut Self::Output {
        self.get_mut(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_display_and_profile() {
        assert_eq!(StreamKind::Hft.to_string(), "hft");
        assert_eq!(StreamKind::Idt.to_string(), "idt");
        assert_eq!(StreamKind::Snapshot.to_string(), "snapshot");
        assert_eq!(StreamKind::Snapshot.profile(), None);
        assert!(StreamKind::Idt.is_prediction());
        assert!(!StreamKind::Snapshot.is_prediction());
    }

    #[test]
    fn test_stream_map_slots_are_independent() {
        let mut map = StreamMap::from_fn(|stream| stream.as_str().len());
        map[StreamKind::Idt] += 10;

        assert_eq!(map[StreamKind::Hft], 3);
        assert_eq!(map[StreamKind::Idt], 13);
        assert_eq!(map[StreamKind::Snapshot], 8);
        assert_eq!(
            map.iter().map(|(stream, _)| stream).collect::<Vec<_>>(),
            StreamKind::ALL.to_vec()
        );
    }
}
