use serde::{Deserialize, Serialize};

/// Result of probing a store for an id.
///
/// A stat never fails merely because the target is absent: absence is
/// reported as `exists == false` with a zero size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatInfo {
    pub exists: bool,
    /// Byte length for objects, top-level field count for documents.
    pub size: u64,
}

impl StatInfo {
    pub const fn absent() -> Self {
        Self {
            exists: false,
            size: 0,
        }
    }

    pub const fn present(size: u64) -> Self {
        Self { exists: true, size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_default() {
        assert_eq!(StatInfo::absent(), StatInfo::default());
        assert!(!StatInfo::absent().exists);
        assert_eq!(StatInfo::absent().size, 0);
    }

    #[test]
    fn present_carries_size() {
        let stat = StatInfo::present(42);
        assert!(stat.exists);
        assert_eq!(stat.size, 42);
    }
}
