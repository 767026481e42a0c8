//! Built-in device profiles.
//!
//! | Module | Device | Dump |
//! |---|---|---|
//! | [`roland_jv880`] | Roland JV-80 / JV-880 | 5 blocks, 553 bytes |
//! | [`waldorf_blofeld`] | Waldorf Blofeld | 1 block, 392 bytes |
//! | [`emu_planet_phatt`] | E-mu Planet Phatt, Orbit, Carnaval, Vintage Keys | 1 block, 281 bytes |
//!
//! ```
//! let profiles = patchwire_devices::all_profiles()?;
//! assert_eq!(profiles.len(), 3);
//! # Ok::<(), patchwire_sysex::Error>(())
//! ```

pub mod emu_planet_phatt;
pub mod roland_jv880;
pub mod waldorf_blofeld;

use patchwire_sysex::{DeviceProfile, Result};
use std::sync::Arc;

pub use emu_planet_phatt::{PhattTables, SynthType};

/// Every built-in profile.
pub fn all_profiles() -> Result<Vec<Arc<DeviceProfile>>> {
    Ok(vec![
        Arc::new(roland_jv880::profile()?),
        Arc::new(waldorf_blofeld::profile()?),
        Arc::new(emu_planet_phatt::profile()?),
    ])
}

/// Names of the built-in profiles, in [`all_profiles`] order.
pub fn builtin_names() -> [&'static str; 3] {
    [roland_jv880::NAME, waldorf_blofeld::NAME, emu_planet_phatt::NAME]
}
