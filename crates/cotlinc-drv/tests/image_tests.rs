//! Structural validation of produced executables.
//!
//! The generated programs are Windows binaries, so the suite does not
//! execute them; it checks the invariants a loader relies on instead.

use cotlinc_drv::compile_source_to;

fn rd_u16(img: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([img[off], img[off + 1]])
}

fn rd_u32(img: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(img[off..off + 4].try_into().unwrap())
}

fn build(source: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.exe");
    compile_source_to(source, &out).expect("program compiles");
    std::fs::read(&out).unwrap()
}

/// Checks every structural invariant shared by all produced images.
fn validate(img: &[u8]) {
    // DOS stub and PE signature.
    assert_eq!(&img[0..2], b"MZ");
    let e_lfanew = rd_u32(img, 0x3C) as usize;
    assert_eq!(e_lfanew, 0x80);
    assert_eq!(&img[e_lfanew..e_lfanew + 4], b"PE\0\0");

    // COFF: x86-64, two sections.
    assert_eq!(rd_u16(img, 0x84), 0x8664);
    assert_eq!(rd_u16(img, 0x86), 2);

    // Optional header: PE32+, console subsystem, entry at .text.
    assert_eq!(rd_u16(img, 0x98), 0x20B);
    let entry = rd_u32(img, 0x98 + 16);
    assert_eq!(entry, 0x1000);
    assert_eq!(rd_u16(img, 0x98 + 68), 3);

    // Section table consistency.
    let text = 0x188;
    let rdata = text + 40;
    assert_eq!(&img[text..text + 5], b".text");
    assert_eq!(&img[rdata..rdata + 6], b".rdata");

    let text_rva = rd_u32(img, text + 12);
    let text_raw_size = rd_u32(img, text + 16);
    let text_raw_off = rd_u32(img, text + 20);
    let rdata_rva = rd_u32(img, rdata + 12);
    let rdata_vsize = rd_u32(img, rdata + 8);
    let rdata_raw_size = rd_u32(img, rdata + 16);
    let rdata_raw_off = rd_u32(img, rdata + 20);

    assert_eq!(text_rva, 0x1000);
    assert_eq!(rdata_rva, 0x2000);
    assert_eq!(text_raw_off, 0x200);
    assert_eq!(rdata_raw_off, text_raw_off + text_raw_size);
    assert_eq!(text_raw_size % 0x200, 0);
    assert_eq!(rdata_raw_size % 0x200, 0);
    assert!(text_rva + rd_u32(img, text + 8) <= rdata_rva, "RVAs overlap");
    assert_eq!(img.len() as u32, rdata_raw_off + rdata_raw_size);

    // Import directory points inside .rdata...
    let import_rva = rd_u32(img, 0x110);
    assert!(import_rva >= rdata_rva && import_rva < rdata_rva + rdata_vsize);

    // ...and its descriptor wires ILT, IAT and DLL name correctly.
    let to_file = |rva: u32| (rva - rdata_rva + rdata_raw_off) as usize;
    let desc = to_file(import_rva);
    let ilt_rva = rd_u32(img, desc);
    let dll_rva = rd_u32(img, desc + 12);
    let iat_rva = rd_u32(img, desc + 16);
    for rva in [ilt_rva, dll_rva, iat_rva] {
        assert!(rva >= rdata_rva && rva < rdata_rva + rdata_vsize);
    }

    let dll = to_file(dll_rva);
    assert_eq!(&img[dll..dll + 13], b"kernel32.dll\0");

    let expected = [
        "GetStdHandle",
        "WriteFile",
        "ExitProcess",
        "SetConsoleOutputCP",
        "GetProcessHeap",
        "HeapAlloc",
    ];
    for (slot, name) in expected.iter().enumerate() {
        let ilt_entry = rd_u32(img, to_file(ilt_rva) + slot * 8);
        let iat_entry = rd_u32(img, to_file(iat_rva) + slot * 8);
        assert_eq!(ilt_entry, iat_entry, "ILT/IAT slot {slot} must agree");
        let hint_name = to_file(ilt_entry);
        assert_eq!(rd_u16(img, hint_name), 0);
        let got = &img[hint_name + 2..hint_name + 2 + name.len()];
        assert_eq!(got, name.as_bytes(), "import slot {slot}");
        assert_eq!(img[hint_name + 2 + name.len()], 0);
    }
    // Both tables are null-terminated.
    assert_eq!(rd_u32(img, to_file(ilt_rva) + 48), 0);
    assert_eq!(rd_u32(img, to_file(iat_rva) + 48), 0);

    // The code really is the generated entry function.
    assert_eq!(img[0x200], 0x55, "entry starts with push rbp");
}

#[test]
fn arithmetic_print_program() {
    validate(&build("исп.команду.print(1 + 2 * 3)\n"));
}

#[test]
fn countdown_loop_program() {
    validate(&build(
        "пусть x = 10\nповторять.раз 3 { исп.команду.print(x) x = x - 1 }\n",
    ));
}

#[test]
fn branch_program() {
    validate(&build(
        "в таком случае 1 == 2 { исп.команду.print(1) } иначе.если { исп.команду.print(2) }\n",
    ));
}

#[test]
fn range_and_index_program() {
    validate(&build(
        "пусть r = диапазон.от.0.до(4)\n\
         исп.команду.print(сколько.внутри(r))\n\
         исп.команду.print(дай.по.индексу(r, 3))\n",
    ));
}

#[test]
fn list_push_pop_program() {
    validate(&build(
        "пусть l = создать.лист.цифр()\n\
         впихни.в.лист(l, 42)\n\
         исп.команду.print(достань.последний(l))\n\
         исп.команду.print(достань.последний(l))\n",
    ));
}

#[test]
fn cyrillic_string_program_embeds_utf8_bytes() {
    let img = build("исп.команду.print(\"привет\")\n");
    validate(&img);
    // The literal is placed at the start of .rdata, NUL-terminated.
    let rdata_raw_off = rd_u32(&img, 0x188 + 40 + 20) as usize;
    let expected = "привет".as_bytes();
    assert_eq!(&img[rdata_raw_off..rdata_raw_off + expected.len()], expected);
    assert_eq!(img[rdata_raw_off + expected.len()], 0);
}

#[test]
fn short_circuit_with_guarded_division() {
    validate(&build(
        "исп.команду.print(0 и.также 1 / 0)\nисп.команду.print(1 или.иначе 1 / 0)\n",
    ));
}

#[test]
fn deeply_nested_program_resolves_all_fixups() {
    validate(&build(
        "пусть m = создать.массив.цифр(4)\n\
         повторять.раз 2 {\n\
           повторять.раз 2 {\n\
             в таком случае сколько.внутри(m) > 2 {\n\
               сунь.по.индексу(m, 0, 1 + (2 + (3 + 4)))\n\
             } иначе.если {\n\
               исп.команду.print(не.а 0)\n\
             }\n\
           }\n\
         }\n",
    ));
}
