//! PE32+ image emission.
//!
//! The geometry is fixed: headers occupy the first 0x200 bytes of the
//! file, `.text` follows at file offset 0x200 / RVA 0x1000, `.rdata`
//! after it at RVA 0x2000. The entry point is the start of `.text`.

use std::io::{self, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use cotlinc_par::StringTable;
use cotlinc_util::align_up;

use crate::{
    layout::RdataLayout, PeError, DLL_NAME, FILE_ALIGN, IMAGE_BASE, IMPORT_NAMES, RDATA_RVA,
    SECTION_ALIGN, TEXT_RVA,
};

const DOS_STUB_SIZE: usize = 0x80;
const HEADERS_SIZE: usize = 0x200;
const OPTIONAL_HEADER_SIZE: u16 = 0xF0;

/// Writes the complete image to `w`.
pub fn write_image<W: Write>(
    w: &mut W,
    code: &[u8],
    strings: &StringTable,
    layout: &RdataLayout,
) -> io::Result<()> {
    let text_raw_size = align_up(code.len(), FILE_ALIGN);
    let rdata_raw_size = align_up(layout.size, FILE_ALIGN);
    let size_of_image = align_up(RDATA_RVA as usize + layout.size, SECTION_ALIGN) as u32;

    write_dos_stub(w)?;

    w.write_all(b"PE\0\0")?;
    write_coff_header(w)?;
    write_optional_header(w, text_raw_size, rdata_raw_size, size_of_image, layout)?;

    write_section_header(
        w,
        b".text\0\0\0",
        code.len() as u32,
        TEXT_RVA,
        text_raw_size as u32,
        HEADERS_SIZE as u32,
        0x6000_0020, // code | execute | read
    )?;
    write_section_header(
        w,
        b".rdata\0\0",
        layout.size as u32,
        RDATA_RVA,
        rdata_raw_size as u32,
        (HEADERS_SIZE + text_raw_size) as u32,
        0x4000_0040, // initialized data | read
    )?;

    // Header area is fixed-size; everything emitted so far fits below it.
    let header_bytes = DOS_STUB_SIZE + 4 + 20 + OPTIONAL_HEADER_SIZE as usize + 2 * 40;
    write_zeros(w, HEADERS_SIZE - header_bytes)?;

    w.write_all(code)?;
    write_zeros(w, text_raw_size - code.len())?;

    let rdata = build_rdata(strings, layout)?;
    w.write_all(&rdata)?;
    write_zeros(w, rdata_raw_size - rdata.len())?;

    Ok(())
}

/// Writes the image to a file.
pub fn write_image_file(
    path: &Path,
    code: &[u8],
    strings: &StringTable,
    layout: &RdataLayout,
) -> Result<(), PeError> {
    let io_err = |source: std::io::Error| PeError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::create(path).map_err(&io_err)?;
    let mut w = io::BufWriter::new(file);
    write_image(&mut w, code, strings, layout).map_err(&io_err)?;
    w.into_inner().map_err(|e| io_err(e.into_error()))?;
    Ok(())
}

fn write_dos_stub<W: Write>(w: &mut W) -> io::Result<()> {
    let mut stub = [0u8; DOS_STUB_SIZE];
    stub[0] = b'M';
    stub[1] = b'Z';
    stub[0x3C] = DOS_STUB_SIZE as u8; // e_lfanew
    w.write_all(&stub)
}

fn write_coff_header<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_u16::<LittleEndian>(0x8664)?; // machine: x86-64
    w.write_u16::<LittleEndian>(2)?; // section count
    w.write_u32::<LittleEndian>(0)?; // timestamp
    w.write_u32::<LittleEndian>(0)?; // symbol table
    w.write_u32::<LittleEndian>(0)?; // symbol count
    w.write_u16::<LittleEndian>(OPTIONAL_HEADER_SIZE)?;
    w.write_u16::<LittleEndian>(0x0022) // executable | large address aware
}

fn write_optional_header<W: Write>(
    w: &mut W,
    text_raw_size: usize,
    rdata_raw_size: usize,
    size_of_image: u32,
    layout: &RdataLayout,
) -> io::Result<()> {
    w.write_u16::<LittleEndian>(0x20B)?; // PE32+
    w.write_u8(0)?; // linker major
    w.write_u8(0)?; // linker minor
    w.write_u32::<LittleEndian>(text_raw_size as u32)?; // size of code
    w.write_u32::<LittleEndian>(rdata_raw_size as u32)?; // size of initialized data
    w.write_u32::<LittleEndian>(0)?; // size of uninitialized data
    w.write_u32::<LittleEndian>(TEXT_RVA)?; // entry point
    w.write_u32::<LittleEndian>(TEXT_RVA)?; // base of code
    w.write_u64::<LittleEndian>(IMAGE_BASE)?;
    w.write_u32::<LittleEndian>(SECTION_ALIGN as u32)?;
    w.write_u32::<LittleEndian>(FILE_ALIGN as u32)?;
    w.write_u16::<LittleEndian>(6)?; // OS major
    w.write_u16::<LittleEndian>(0)?; // OS minor
    w.write_u16::<LittleEndian>(0)?; // image major
    w.write_u16::<LittleEndian>(0)?; // image minor
    w.write_u16::<LittleEndian>(6)?; // subsystem major
    w.write_u16::<LittleEndian>(0)?; // subsystem minor
    w.write_u32::<LittleEndian>(0)?; // win32 version
    w.write_u32::<LittleEndian>(size_of_image)?;
    w.write_u32::<LittleEndian>(HEADERS_SIZE as u32)?;
    w.write_u32::<LittleEndian>(0)?; // checksum
    w.write_u16::<LittleEndian>(3)?; // subsystem: console
    w.write_u16::<LittleEndian>(0)?; // dll characteristics
    w.write_u64::<LittleEndian>(0x10_0000)?; // stack reserve
    w.write_u64::<LittleEndian>(0x1000)?; // stack commit
    w.write_u64::<LittleEndian>(0x10_0000)?; // heap reserve
    w.write_u64::<LittleEndian>(0x1000)?; // heap commit
    w.write_u32::<LittleEndian>(0)?; // loader flags
    w.write_u32::<LittleEndian>(16)?; // data directory count

    for dir in 0..16u32 {
        if dir == 1 {
            w.write_u32::<LittleEndian>(layout.import_dir_rva())?;
            w.write_u32::<LittleEndian>(40)?;
        } else {
            w.write_u64::<LittleEndian>(0)?;
        }
    }
    Ok(())
}

fn write_section_header<W: Write>(
    w: &mut W,
    name: &[u8; 8],
    virtual_size: u32,
    virtual_address: u32,
    raw_size: u32,
    raw_offset: u32,
    characteristics: u32,
) -> io::Result<()> {
    w.write_all(name)?;
    w.write_u32::<LittleEndian>(virtual_size)?;
    w.write_u32::<LittleEndian>(virtual_address)?;
    w.write_u32::<LittleEndian>(raw_size)?;
    w.write_u32::<LittleEndian>(raw_offset)?;
    w.write_u32::<LittleEndian>(0)?; // relocations
    w.write_u32::<LittleEndian>(0)?; // line numbers
    w.write_u16::<LittleEndian>(0)?;
    w.write_u16::<LittleEndian>(0)?;
    w.write_u32::<LittleEndian>(characteristics)
}

/// Assembles the `.rdata` contents according to the precomputed layout.
fn build_rdata(strings: &StringTable, layout: &RdataLayout) -> io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::with_capacity(layout.size);

    for (lit, rva) in strings.iter().zip(&layout.string_rvas) {
        pad_to(&mut buf, (rva - RDATA_RVA) as usize);
        buf.extend_from_slice(lit.as_bytes());
        buf.push(0);
    }

    pad_to(&mut buf, layout.import_desc_off);
    buf.write_u32::<LittleEndian>(RDATA_RVA + layout.ilt_off as u32)?; // original first thunk
    buf.write_u32::<LittleEndian>(0)?; // timestamp
    buf.write_u32::<LittleEndian>(0)?; // forwarder chain
    buf.write_u32::<LittleEndian>(RDATA_RVA + layout.dll_name_off as u32)?;
    buf.write_u32::<LittleEndian>(RDATA_RVA + layout.iat_off as u32)?; // first thunk
    pad_to(&mut buf, layout.import_desc_off + 40); // null descriptor

    // ILT and IAT carry identical hint/name RVAs; the loader rewrites
    // the IAT in place.
    for _ in 0..2 {
        for off in layout.hint_name_offs {
            buf.write_u64::<LittleEndian>((RDATA_RVA + off as u32) as u64)?;
        }
        buf.write_u64::<LittleEndian>(0)?;
    }

    for (slot, name) in IMPORT_NAMES.iter().enumerate() {
        pad_to(&mut buf, layout.hint_name_offs[slot]);
        buf.write_u16::<LittleEndian>(0)?; // hint
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
    }

    pad_to(&mut buf, layout.dll_name_off);
    buf.extend_from_slice(DLL_NAME.as_bytes());
    buf.push(0);

    debug_assert_eq!(buf.len(), layout.size);
    Ok(buf)
}

fn pad_to(buf: &mut Vec<u8>, off: usize) {
    debug_assert!(buf.len() <= off);
    buf.resize(off, 0);
}

fn write_zeros<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    const ZEROS: [u8; 64] = [0; 64];
    let mut left = n;
    while left > 0 {
        let chunk = left.min(ZEROS.len());
        w.write_all(&ZEROS[..chunk])?;
        left -= chunk;
    }
    Ok(())
}
