use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "r"),
            Self::Write => write!(f, "w"),
        }
    }
}

/// 针对块设备的分散/聚集请求
///
/// `sector` 以设备自身的扇区为单位。各个段按顺序被写出（write）或填充（read），
/// 合起来是从 `sector * sector_size` 开始的一段连续字节。
#[derive(Debug)]
pub enum Request<'a> {
    Read {
        sector: u64,
        segments: Vec<&'a mut [u8]>,
    },
    Write {
        sector: u64,
        segments: Vec<&'a [u8]>,
    },
}

impl<'a> Request<'a> {
    pub fn read(sector: u64, buf: &'a mut [u8]) -> Self {
        Self::Read {
            sector,
            segments: vec![buf],
        }
    }

    pub fn write(sector: u64, buf: &'a [u8]) -> Self {
        Self::Write {
            sector,
            segments: vec![buf],
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Read { .. } => Direction::Read,
            Self::Write { .. } => Direction::Write,
        }
    }

    pub fn sector(&self) -> u64 {
        match self {
            Self::Read { sector, .. } | Self::Write { sector, .. } => *sector,
        }
    }

    pub fn segment_count(&self) -> usize {
        match self {
            Self::Read { segments, .. } => segments.len(),
            Self::Write { segments, .. } => segments.len(),
        }
    }

    pub fn segment_len(&self, index: usize) -> usize {
        match self {
            Self::Read { segments, .. } => segments[index].len(),
            Self::Write { segments, .. } => segments[index].len(),
        }
    }

    /// 请求从 `base` 开始时，每个段的 `(字节偏移, 长度)`
    pub fn segment_spans(&self, base: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.segment_count()).scan(base, move |offset, i| {
            let len = self.segment_len(i);
            let start = *offset;
            *offset += len;
            Some((start, len))
        })
    }

    /// 所有段的总字节数
    pub fn len(&self) -> u64 {
        match self {
            Self::Read { segments, .. } => segments.iter().map(|s| s.len() as u64).sum(),
            Self::Write { segments, .. } => segments.iter().map(|s| s.len() as u64).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 请求处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub direction: Direction,
    pub sector: u64,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_sums_all_segments() {
        let (a, b) = ([0u8; 512], [0u8; 1024]);
        let req = Request::Write {
            sector: 7,
            segments: vec![&a[..], &b[..], &[]],
        };
        assert_eq!(req.len(), 1536);
        assert_eq!(req.segment_count(), 3);
        assert_eq!(req.sector(), 7);
        assert_eq!(req.direction(), Direction::Write);
    }

    #[test]
    fn segment_spans_are_contiguous() {
        let (a, b, c) = ([0u8; 100], [0u8; 412], [0u8; 512]);
        let req = Request::Write {
            sector: 3,
            segments: vec![&a[..], &b[..], &c[..]],
        };
        let spans: Vec<_> = req.segment_spans(1536).collect();
        assert_eq!(spans, vec![(1536, 100), (1636, 412), (2048, 512)]);
        assert_eq!(req.segment_len(1), 412);
    }

    #[test]
    fn single_buffer_constructors() {
        let mut buf = [0u8; 512];
        let req = Request::read(3, &mut buf);
        assert_eq!(req.direction(), Direction::Read);
        assert_eq!(req.len(), 512);
        assert!(!req.is_empty());
    }
}
