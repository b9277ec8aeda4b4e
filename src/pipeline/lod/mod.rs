// LOD resource archive: a flat table of named entries, optionally zlib-compressed

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::def::reader::name_from_field;
use super::fs_ops::is_plain_file_name;

/// `LOD\0` read as a little-endian u32.
pub const LOD_MAGIC: u32 = 0x0044_4F4C;
const HEADER_RESERVED_LEN: i64 = 80;
const ENTRY_NAME_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum LodError {
    #[error("not a LOD archive (magic 0x{found:08x})")]
    BadMagic { found: u32 },

    #[error("LOD archive truncated at offset {offset}")]
    Truncated { offset: u64 },

    #[error("can't inflate entry {name}: {source}")]
    Decompress {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("entry name {name:?} is not usable as a file name")]
    UnsafeEntryName { name: String },

    #[error("bad LOD manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("I/O error on LOD archive: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LodError>;

/// Archive type word. Serialized as the raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum LodKind {
    Base,
    Expansion,
    Other(u32),
}

impl From<u32> for LodKind {
    fn from(value: u32) -> Self {
        match value {
            0x01 => LodKind::Base,
            0x02 => LodKind::Expansion,
            other => LodKind::Other(other),
        }
    }
}

impl From<LodKind> for u32 {
    fn from(kind: LodKind) -> Self {
        match kind {
            LodKind::Base => 0x01,
            LodKind::Expansion => 0x02,
            LodKind::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodEntry {
    pub name: String,
    pub offset: u32,
    pub original_size: u32,
    pub compressed_size: u32,
}

impl LodEntry {
    pub fn is_compressed(&self) -> bool {
        self.compressed_size != 0
    }

    /// Number of bytes the entry occupies inside the archive.
    pub fn stored_size(&self) -> u32 {
        if self.is_compressed() {
            self.compressed_size
        } else {
            self.original_size
        }
    }

    pub fn is_def(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("def"))
    }
}

#[derive(Debug, Clone)]
pub struct LodArchive {
    path: PathBuf,
    kind: LodKind,
    entries: Vec<LodEntry>,
}

impl LodArchive {
    pub fn can_parse(data: &[u8]) -> bool {
        data.len() >= 4 && data[0..4] == LOD_MAGIC.to_le_bytes()
    }

    /// Reads the file table. The archive is reopened by every worker through
    /// [`LodArchive::open_handle`]; this handle is closed before returning.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_table(&mut reader, path)
    }

    pub fn read_table<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let magic = read_u32(reader)?;
        if magic != LOD_MAGIC {
            return Err(LodError::BadMagic { found: magic });
        }
        let kind = LodKind::from(read_u32(reader)?);
        let count = read_u32(reader)?;
        reader.seek(SeekFrom::Current(HEADER_RESERVED_LEN))?;

        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(read_entry_record(reader)?);
        }

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> LodKind {
        self.kind
    }

    pub fn list_entries(&self) -> &[LodEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&LodEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn manifest(&self) -> LodManifest {
        LodManifest {
            file_path: self.path.clone(),
            lod_type: self.kind,
            number_of_files: self.entries.len() as u32,
            files: self.entries.clone(),
        }
    }

    /// Rebuilds the archive view from a saved manifest, without touching the
    /// archive until a handle is opened.
    pub fn from_manifest(manifest: LodManifest) -> Self {
        Self {
            path: manifest.file_path,
            kind: manifest.lod_type,
            entries: manifest.files,
        }
    }

    /// A fresh read handle onto the archive. Seeks are stateful, so concurrent
    /// readers each need their own.
    pub fn open_handle(&self) -> io::Result<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }
}

/// JSON description of an archive's file table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodManifest {
    pub file_path: PathBuf,
    pub lod_type: LodKind,
    pub number_of_files: u32,
    pub files: Vec<LodEntry>,
}

impl LodManifest {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn read_u32<R: Read + Seek>(reader: &mut R) -> Result<u32> {
    let offset = reader.stream_position()?;
    reader.read_u32::<LittleEndian>().map_err(|e| truncated(e, offset))
}

fn read_entry_record<R: Read + Seek>(reader: &mut R) -> Result<LodEntry> {
    let offset = reader.stream_position()?;
    let mut name = [0u8; ENTRY_NAME_LEN];
    reader.read_exact(&mut name).map_err(|e| truncated(e, offset))?;

    let entry_offset = read_u32(reader)?;
    let original_size = read_u32(reader)?;
    reader.seek(SeekFrom::Current(4))?;
    let compressed_size = read_u32(reader)?;

    Ok(LodEntry {
        name: name_from_field(&name),
        offset: entry_offset,
        original_size,
        compressed_size,
    })
}

fn truncated(err: io::Error, offset: u64) -> LodError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LodError::Truncated { offset }
    } else {
        LodError::Io(err)
    }
}

/// Reads an entry's payload, inflating it when it is stored compressed.
pub fn read_entry<R: Read + Seek>(source: &mut R, entry: &LodEntry) -> Result<Vec<u8>> {
    source.seek(SeekFrom::Start(entry.offset as u64))?;

    let mut stored = vec![0u8; entry.stored_size() as usize];
    source
        .read_exact(&mut stored)
        .map_err(|e| truncated(e, entry.offset as u64))?;

    if !entry.is_compressed() {
        return Ok(stored);
    }

    let mut data = Vec::with_capacity(entry.original_size as usize);
    ZlibDecoder::new(&stored[..])
        .read_to_end(&mut data)
        .map_err(|source| LodError::Decompress {
            name: entry.name.clone(),
            source,
        })?;
    Ok(data)
}

/// Writes an entry's payload verbatim to `dst_dir/<entry name>`. Names that are
/// not a single plain path component are refused.
pub fn extract_entry<R: Read + Seek>(
    source: &mut R,
    entry: &LodEntry,
    dst_dir: &Path,
) -> Result<PathBuf> {
    if !is_plain_file_name(&entry.name) {
        return Err(LodError::UnsafeEntryName {
            name: entry.name.clone(),
        });
    }
    let data = read_entry(source, entry)?;
    fs::create_dir_all(dst_dir)?;
    let path = dst_dir.join(&entry.name);
    fs::write(&path, data)?;
    Ok(path)
}


#[cfg(test)]
mod tests {
    use super::testing::build_lod;
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sample() -> Vec<u8> {
        build_lod(&[
            ("AVArnd1.def", &b"compressed sprite payload, compressed sprite payload"[..], true),
            ("AVArnd1.msk", &b"mask"[..], false),
            ("advevent.txt", &b""[..], false),
        ])
    }

    #[test]
    fn test_list_entries() {
        let mut reader = Cursor::new(sample());
        let archive = LodArchive::read_table(&mut reader, Path::new("HotA_lng.lod")).unwrap();

        assert_eq!(archive.kind(), LodKind::Base);
        let entries = archive.list_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "AVArnd1.def");
        assert!(entries[0].is_compressed());
        assert!(entries[0].is_def());
        assert!(!entries[1].is_compressed());
        assert!(!entries[1].is_def());
        assert_eq!(entries[1].original_size, 4);
        assert!(archive.find("avarnd1.MSK").is_some());
        assert!(archive.find("missing.def").is_none());
    }

    #[test]
    fn test_read_entry_inflates_compressed() {
        let mut reader = Cursor::new(sample());
        let archive = LodArchive::read_table(&mut reader, Path::new("a.lod")).unwrap();

        let def = read_entry(&mut reader, &archive.list_entries()[0]).unwrap();
        assert_eq!(def, b"compressed sprite payload, compressed sprite payload");

        let mask = read_entry(&mut reader, &archive.list_entries()[1]).unwrap();
        assert_eq!(mask, b"mask");

        let empty = read_entry(&mut reader, &archive.list_entries()[2]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let mut reader = Cursor::new(b"DEF\0\0\0\0\0\0\0\0\0".to_vec());
        assert!(matches!(
            LodArchive::read_table(&mut reader, Path::new("x.lod")),
            Err(LodError::BadMagic { .. })
        ));
        assert!(LodArchive::can_parse(&sample()));
        assert!(!LodArchive::can_parse(b"LOD"));
    }

    #[test]
    fn test_truncated_table() {
        let mut data = sample();
        data.truncate(100);
        let mut reader = Cursor::new(data);
        assert!(matches!(
            LodArchive::read_table(&mut reader, Path::new("x.lod")),
            Err(LodError::Truncated { .. })
        ));
    }

    #[test]
    fn test_corrupt_payload() {
        let mut data = sample();
        let archive =
            LodArchive::read_table(&mut Cursor::new(data.clone()), Path::new("x.lod")).unwrap();
        let entry = archive.list_entries()[0].clone();
        let start = entry.offset as usize;
        for byte in &mut data[start..start + entry.compressed_size as usize] {
            *byte = 0x55;
        }

        assert!(matches!(
            read_entry(&mut Cursor::new(data), &entry),
            Err(LodError::Decompress { .. })
        ));
    }

    #[test]
    fn test_open_and_extract_entry() {
        let dir = tempdir().unwrap();
        let lod_path = dir.path().join("H3sprite.lod");
        fs::write(&lod_path, sample()).unwrap();

        let archive = LodArchive::open(&lod_path).unwrap();
        let mut handle = archive.open_handle().unwrap();
        let out = extract_entry(&mut handle, &archive.list_entries()[1], &dir.path().join("raw"))
            .unwrap();

        assert_eq!(out, dir.path().join("raw").join("AVArnd1.msk"));
        assert_eq!(fs::read(out).unwrap(), b"mask");
    }

    #[test]
    fn test_extract_entry_refuses_escaping_names() {
        let dir = tempdir().unwrap();
        let data = build_lod(&[("../escaped.txt", &b"x"[..], false), ("..", &b"y"[..], false)]);
        let mut reader = Cursor::new(data);
        let archive = LodArchive::read_table(&mut reader, Path::new("x.lod")).unwrap();
        let out = dir.path().join("raw");

        for entry in archive.list_entries() {
            assert!(matches!(
                extract_entry(&mut reader, entry, &out),
                Err(LodError::UnsafeEntryName { .. })
            ));
        }
        assert!(!dir.path().join("escaped.txt").exists());
        assert!(!out.exists());
    }

    #[test]
    fn test_manifest_json() {
        let dir = tempdir().unwrap();
        let lod_path = dir.path().join("H3bitmap.lod");
        fs::write(&lod_path, sample()).unwrap();
        let archive = LodArchive::open(&lod_path).unwrap();

        let manifest = archive.manifest();
        assert_eq!(manifest.number_of_files, 3);

        let json: serde_json::Value =
            serde_json::from_str(&manifest.to_json_string().unwrap()).unwrap();
        assert_eq!(json["lod_type"], 1);
        assert_eq!(json["number_of_files"], 3);
        assert_eq!(json["files"][1]["name"], "AVArnd1.msk");
        assert_eq!(json["files"][1]["original_size"], 4);
        assert_eq!(json["files"][1]["compressed_size"], 0);

        let saved = dir.path().join("meta").join("H3bitmap.json");
        manifest.write_json(&saved).unwrap();
        let loaded = LodManifest::load(&saved).unwrap();
        assert_eq!(loaded, manifest);

        let reopened = LodArchive::from_manifest(loaded);
        let entry = reopened.find("avarnd1.msk").unwrap().clone();
        let mut handle = reopened.open_handle().unwrap();
        assert_eq!(read_entry(&mut handle, &entry).unwrap(), b"mask");
    }

    #[test]
    fn test_kind_keeps_unknown_values() {
        assert_eq!(u32::from(LodKind::from(0x1f4)), 0x1f4);
        assert_eq!(LodKind::from(0x02), LodKind::Expansion);
        let kind: LodKind = serde_json::from_str("2").unwrap();
        assert_eq!(kind, LodKind::Expansion);
    }
}
