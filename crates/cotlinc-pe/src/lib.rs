//! cotlinc-pe - PE32+ container writer.
//!
//! Lays out `.rdata` (string literals plus the whole import machinery for
//! `kernel32.dll`) and writes a minimal two-section x86-64 console
//! executable: DOS stub, COFF header, optional header with the import
//! data directory, section table, `.text`, `.rdata`.

mod image;
mod layout;

pub use image::{write_image, write_image_file};
pub use layout::{ImportRvas, RdataLayout};

use thiserror::Error;

/// RVA of the `.text` section; also the image entry point.
pub const TEXT_RVA: u32 = 0x1000;

/// RVA of the `.rdata` section.
pub const RDATA_RVA: u32 = 0x2000;

/// Preferred load address of the image.
pub const IMAGE_BASE: u64 = 0x1_4000_0000;

/// On-disk section granularity.
pub const FILE_ALIGN: usize = 0x200;

/// In-memory section granularity.
pub const SECTION_ALIGN: usize = 0x1000;

/// The imported `kernel32.dll` symbols, in IAT slot order.
pub const IMPORT_NAMES: [&str; 6] = [
    "GetStdHandle",
    "WriteFile",
    "ExitProcess",
    "SetConsoleOutputCP",
    "GetProcessHeap",
    "HeapAlloc",
];

/// The single imported DLL.
pub const DLL_NAME: &str = "kernel32.dll";

/// Errors raised while writing the image.
#[derive(Debug, Error)]
pub enum PeError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
