//! "Version made by" / "version needed to extract" fields.

use winnow::binary::{le_u16, le_u8};
use winnow::{seq, PResult, Partial};

/// The host OS/filesystem a CDFH's "version made by" field claims, plus the
/// ZIP spec version (as `major*10+minor`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Host system that produced the archive.
    pub host_system: HostSystem,
    /// ZIP spec version, e.g. `20` for 2.0.
    pub version: u8,
}

impl std::fmt::Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} ({:?})",
            self.version / 10,
            self.version % 10,
            self.host_system
        )
    }
}

impl Version {
    /// Parse a little-endian `u16` as `(host_system, version)`.
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<Version> {
        seq! {Version {
            version: le_u8,
            host_system: le_u8.map(HostSystem::from),
        }}
        .parse_next(i)
    }

    /// Parse a combined little-endian `u16` field directly.
    pub fn parser_u16(i: &mut Partial<&[u8]>) -> PResult<Version> {
        let raw = le_u16.parse_next(i)?;
        Ok(Version {
            version: (raw & 0xFF) as u8,
            host_system: HostSystem::from((raw >> 8) as u8),
        })
    }
}

/// The host system / filesystem that produced a ZIP entry, per APPNOTE's
/// "version made by" upper byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum HostSystem {
    /// MS-DOS and OS/2 (FAT / VFAT / FAT32 file systems).
    MsDos = 0,
    /// Amiga.
    Amiga = 1,
    /// OpenVMS.
    OpenVms = 2,
    /// UNIX.
    Unix = 3,
    /// VM/CMS.
    VmCms = 4,
    /// Atari ST.
    AtariSt = 5,
    /// OS/2 H.P.F.S.
    Hpfs = 6,
    /// Macintosh.
    Macintosh = 7,
    /// Z-System.
    ZSystem = 8,
    /// CP/M.
    CpM = 9,
    /// Windows NTFS.
    WindowsNtfs = 10,
    /// MVS (OS/390 - Z/OS).
    Mvs = 11,
    /// VSE.
    Vse = 12,
    /// Acorn Risc.
    AcornRisc = 13,
    /// VFAT.
    Vfat = 14,
    /// Alternate MVS.
    AlternateMvs = 15,
    /// BeOS.
    BeOs = 16,
    /// Tandem.
    Tandem = 17,
    /// OS/400.
    Os400 = 18,
    /// OS X (Darwin).
    Osx = 19,
    /// Any value not named above.
    #[num_enum(catch_all)]
    Unknown(u8),
}
