use std::fs::File;

use arclist::DecodeError;
use arclist::text::{CHUNK_SIZE, Cp1252, TextResource};

fn header(lines: &[(u8, u16)], block_sizes: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in [1i32, lines.len() as i32, 0, block_sizes.len() as i32] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for size in block_sizes {
        out.extend_from_slice(&size.to_le_bytes());
    }
    for (block, offset) in lines {
        out.push(*block);
        out.push(0);
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out
}

fn block(triples: &[[u8; 3]], raw: &[u8]) -> Vec<u8> {
    let mut out = ((triples.len() * 3) as i32).to_le_bytes().to_vec();
    for t in triples {
        out.extend_from_slice(t);
    }
    out.extend_from_slice(raw);
    out
}

#[test]
fn decodes_resource_file_across_blocks() {
    // 0x90 => "ing " (4 bytes), 1024 of them fill the first chunk
    let mut raw = b"Load".to_vec();
    raw.extend_from_slice(&[0x90; 1023]);
    let first = block(&[[0x91, b'i', b'n'], [0x92, b'g', b' '], [0x90, 0x91, 0x92]], &raw);
    let second = block(&[], b"Caf\xE9 ready");

    let mut data = header(&[(0, 0), (0, 4), (1, 0)], &[CHUNK_SIZE as i32, 10]);
    data.extend_from_slice(&first);
    data.extend_from_slice(&second);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strings.bin");
    std::fs::write(&path, &data).unwrap();

    let resource = TextResource::read(File::open(&path).unwrap(), &Cp1252).unwrap();

    assert_eq!(resource.header.block_sizes, [CHUNK_SIZE as i32, 10]);
    assert_eq!(resource.lines.len(), 3);
    assert_eq!(resource.lines[0], "Load");
    assert_eq!(resource.lines[1].len(), 1023 * 4);
    assert!(resource.lines[1].starts_with("ing ing "));
    assert_eq!(resource.lines[2], "Café ready");
    assert_eq!(resource.header.lines[2].unpacked_range(), Some(4096..4106));
}

#[test]
fn truncated_directory_is_reported() {
    let mut data = header(&[(0, 0), (0, 1)], &[]);
    data.truncate(data.len() - 2);
    assert!(matches!(
        TextResource::read(data.as_slice(), &Cp1252),
        Err(DecodeError::TruncatedStream { .. })
    ));
}
