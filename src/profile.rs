//! Primary-profile guard
//!
//! The private root is only valid for the device's primary profile. Secondary
//! profiles get their own uid range (`uid / 100000` is the profile serial) and
//! the bundled binaries cannot run there, so installing is refused outright.
//! Detection only runs on Android; `profile.serial` overrides it.

use crate::error::{HostError, Result};

/// Serial number of the primary profile
pub const PRIMARY_PROFILE: u64 = 0;

/// Number of uids reserved per profile
pub const PER_PROFILE_UID_RANGE: u32 = 100_000;

/// Profile serial that owns `uid`
pub fn serial_for_uid(uid: u32) -> u64 {
    u64::from(uid / PER_PROFILE_UID_RANGE)
}

/// Serial of the profile this process runs under.
///
/// The uid split only means something on Android. Other hosts hand out
/// large uids for directory users and user namespaces, so they always count
/// as the primary profile. Set `profile.serial` in the config to override
/// the detected value on any host.
pub fn current_profile_serial() -> u64 {
    #[cfg(target_os = "android")]
    {
        use std::os::unix::fs::MetadataExt;
        // /proc/self is owned by the process's effective uid
        if let Ok(meta) = std::fs::metadata("/proc/self") {
            return serial_for_uid(meta.uid());
        }
    }
    PRIMARY_PROFILE
}

/// Fail with `UnsupportedProfile` unless `serial` is the primary profile
pub fn ensure_primary(serial: u64) -> Result<()> {
    if serial == PRIMARY_PROFILE {
        Ok(())
    } else {
        Err(HostError::UnsupportedProfile { serial })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secondary_profile_is_rejected() {
        assert!(ensure_primary(PRIMARY_PROFILE).is_ok());
        let err = ensure_primary(10).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_serial_for_uid() {
        assert_eq!(serial_for_uid(10_123), PRIMARY_PROFILE);
        assert_eq!(serial_for_uid(1_010_123), 10);
    }

    #[cfg(not(target_os = "android"))]
    #[test]
    fn test_large_uid_hosts_count_as_primary() {
        assert_eq!(current_profile_serial(), PRIMARY_PROFILE);
    }
}
