use bitflags::bitflags;

use crate::error::ValidationError;

bitflags! {
    /// Backend hints attached to a scatter handle. Bit layout matches the
    /// acquisition backend's own flag word; unknown bits are preserved
    /// rather than masked so a newer backend's flags still round-trip.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScatterFlags: u32 {
        const NONE                           = 0;
        const NOCACHE                        = 1 << 0;
        const ZEROPAD_ON_FAIL                = 1 << 1;
        const FORCECACHE_READ                = 1 << 2;
        const NOPAGING                       = 1 << 3;
        const NOPAGING_IO                    = 1 << 4;
        const NOCACHEPUT                     = 1 << 5;
        const CACHE_RECENT_ONLY              = 1 << 6;
        const NO_PREDICTIVE_READ             = 1 << 7;
        const FORCECACHE_READ_DISABLE        = 1 << 8;
        const SCATTER_PREPAREEX_NOMEMZERO    = 1 << 9;
        const NOMEMCALLBACK                  = 1 << 10;
        const SCATTER_FORCE_PAGEREAD         = 1 << 11;
    }
}

impl ScatterFlags {
    /// Rejects combinations the backend defines as mutually exclusive.
    pub fn validate(self) -> Result<(), ValidationError> {
        if self.contains(ScatterFlags::FORCECACHE_READ)
            && (self.contains(ScatterFlags::NOCACHE) || self.contains(ScatterFlags::ZEROPAD_ON_FAIL))
        {
            return Err(ValidationError::IncompatibleFlags {
                flags: self.bits(),
            });
        }
        Ok(())
    }
}

impl Default for ScatterFlags {
    fn default() -> Self {
        ScatterFlags::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forcecache_with_nocache_is_rejected() {
        let f = ScatterFlags::FORCECACHE_READ | ScatterFlags::NOCACHE;
        assert!(f.validate().is_err());
    }

    #[test]
    fn forcecache_with_zeropad_is_rejected() {
        let f = ScatterFlags::FORCECACHE_READ | ScatterFlags::ZEROPAD_ON_FAIL;
        assert!(f.validate().is_err());
    }

    #[test]
    fn forcecache_alone_is_accepted() {
        let f = ScatterFlags::FORCECACHE_READ;
        assert!(f.validate().is_ok());
    }

    #[test]
    fn unrelated_combinations_are_accepted() {
        let f = ScatterFlags::NOCACHE | ScatterFlags::NOPAGING | ScatterFlags::NO_PREDICTIVE_READ;
        assert!(f.validate().is_ok());
    }
}
