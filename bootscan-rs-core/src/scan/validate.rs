// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Loader validation.
//!
//! A file is only offered as a loader if its header says it can run on this machine. This reads the first 512 bytes
//! of the file and accepts either a PE image for the running architecture, or an Apple fat binary.

use bytemuck::pod_read_unaligned;

use crate::system::{fs::VolumeFs, helper::Arch};

/// The number of bytes read from the start of a candidate.
pub const HEADER_SIZE: usize = 512;

/// The offset of the field holding the offset of the PE header.
const PE_OFFSET_FIELD: usize = 0x3c;

/// The PE header must start before this offset, so that it fits inside of [`HEADER_SIZE`].
const PE_OFFSET_LIMIT: usize = 0x180;

/// The first four bytes of an Apple fat binary, which may hold images for several architectures.
const FAT_BINARY_MAGIC: u32 = 0x0ef1_fab9;

/// Reads a little endian `u32` at an offset.
fn read_u32(header: &[u8], offset: usize) -> Option<u32> {
    header
        .get(offset..offset + 4)
        .map(|bytes| u32::from_le(pod_read_unaligned(bytes)))
}

/// Reads a little endian `u16` at an offset.
fn read_u16(header: &[u8], offset: usize) -> Option<u16> {
    header
        .get(offset..offset + 2)
        .map(|bytes| u16::from_le(pod_read_unaligned(bytes)))
}

/// Checks if a header belongs to an image that can run on an architecture.
#[must_use = "Has no effect if the result is unused"]
pub fn check_header(header: &[u8], arch: Arch) -> bool {
    if read_u32(header, 0) == Some(FAT_BINARY_MAGIC) {
        return true;
    }

    if header.get(0..2) != Some(b"MZ") {
        return false;
    }

    let Some(offset) = read_u32(header, PE_OFFSET_FIELD).and_then(|x| usize::try_from(x).ok()) else {
        return false;
    };

    offset < PE_OFFSET_LIMIT
        && header.get(offset..offset + 4) == Some(b"PE\0\0")
        && read_u16(header, offset + 4) == Some(arch.machine())
}

/// Checks if a file can be started as a loader on this machine.
///
/// Without a volume or a path there is nothing to check, and the file is trusted. A file shorter than
/// [`HEADER_SIZE`] bytes is never a valid loader.
#[must_use = "Has no effect if the result is unused"]
pub fn is_valid_loader(fs: Option<&mut dyn VolumeFs>, path: Option<&str>) -> bool {
    let (Some(fs), Some(path)) = (fs, path) else {
        return true;
    };

    let mut header = [0; HEADER_SIZE];
    match fs.read_head(path, &mut header) {
        Ok(read) if read == HEADER_SIZE => check_header(&header, Arch::current()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fs::mem::{MemVolume, pe_image};
    use proptest::prelude::*;

    #[test]
    fn test_pe_header() {
        assert!(check_header(&pe_image(Arch::X64), Arch::X64));
        assert!(!check_header(&pe_image(Arch::Aa64), Arch::X64));
        assert!(check_header(&pe_image(Arch::Ia32), Arch::Ia32));
    }

    #[test]
    fn test_bad_offset() {
        let mut image = pe_image(Arch::X64);
        image[PE_OFFSET_FIELD..PE_OFFSET_FIELD + 4].copy_from_slice(&0x200u32.to_le_bytes());
        assert!(!check_header(&image, Arch::X64));

        let mut image = pe_image(Arch::X64);
        image[0] = b'X';
        assert!(!check_header(&image, Arch::X64));
    }

    #[test]
    fn test_fat_binary() {
        let mut image = alloc::vec![0u8; HEADER_SIZE];
        image[0..4].copy_from_slice(&FAT_BINARY_MAGIC.to_le_bytes());
        assert!(check_header(&image, Arch::Aa64));
    }

    #[test]
    fn test_is_valid_loader() {
        let mut volume = MemVolume::new("ESP")
            .with_file("good.efi", &pe_image(Arch::current()))
            .with_file("short.efi", &pe_image(Arch::current())[..300])
            .with_file("text.efi", &[b'#'; 600]);

        assert!(is_valid_loader(Some(&mut volume), Some("good.efi")));
        assert!(!is_valid_loader(Some(&mut volume), Some("short.efi")));
        assert!(!is_valid_loader(Some(&mut volume), Some("text.efi")));
        assert!(!is_valid_loader(Some(&mut volume), Some("missing.efi")));
        assert!(is_valid_loader(None, Some("missing.efi")));
        assert!(is_valid_loader(Some(&mut volume), None));
    }

    proptest! {
        #[test]
        fn doesnt_panic(x in any::<Vec<u8>>()) {
            let _ = check_header(&x, Arch::current());
        }
    }
}
