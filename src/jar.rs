use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use zip::read::ZipArchive;

/// Name of the manifest, always written as the first file entry.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Result alias for JAR (ZIP) operations.
pub type JarResult<T> = Result<T, JarError>;

/// Errors surfaced by the JAR packing/unpacking helpers.
#[derive(Debug)]
pub enum JarError {
    Io(io::Error),
    Zip(zip::result::ZipError),
    InvalidInput(String),
}

impl std::fmt::Display for JarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JarError::Io(err) => write!(f, "I/O error: {err}"),
            JarError::Zip(err) => write!(f, "ZIP error: {err}"),
            JarError::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for JarError {}

impl From<io::Error> for JarError {
    fn from(value: io::Error) -> Self {
        JarError::Io(value)
    }
}

impl From<zip::result::ZipError> for JarError {
    fn from(value: zip::result::ZipError) -> Self {
        JarError::Zip(value)
    }
}

/// Compression preference for a JAR entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JarCompression {
    Stored,
    Deflated,
}

/// A single file entry stored in [`JarFile`].
#[derive(Clone, Debug)]
pub struct JarEntry {
    pub data: Vec<u8>,
    pub unix_mode: Option<u32>,
    pub compression: Option<JarCompression>,
}

impl JarEntry {
    pub fn new(data: Vec<u8>) -> Self {
        JarEntry { data, unix_mode: None, compression: None }
    }

    pub fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.unix_mode = mode;
        self
    }

    pub fn with_compression(mut self, compression: Option<JarCompression>) -> Self {
        self.compression = compression;
        self
    }
}

/// An in-memory MIDlet suite JAR.
///
/// Entries live in a `BTreeMap`, so writing the same contents twice yields the
/// same bytes. The manifest, if any, is the first file entry written.
#[derive(Clone, Debug, Default)]
pub struct JarFile {
    entries: BTreeMap<String, JarEntry>,
}

impl JarFile {
    pub fn new() -> Self {
        JarFile { entries: BTreeMap::new() }
    }

    /// Load a JAR from disk into memory.
    pub fn from_file(path: impl AsRef<Path>) -> JarResult<Self> {
        let file = File::open(path.as_ref())?;
        JarFile::from_reader(file)
    }

    pub fn from_bytes(bytes: &[u8]) -> JarResult<Self> {
        JarFile::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> JarResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let Some(enclosed) = entry.enclosed_name() else {
                return Err(JarError::InvalidInput(format!("unsafe entry name {}", entry.name())));
            };
            let name = path_to_entry_name(&enclosed)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            let compression = match entry.compression() {
                zip::CompressionMethod::Stored => Some(JarCompression::Stored),
                zip::CompressionMethod::Deflated => Some(JarCompression::Deflated),
                _ => None,
            };
            let jar_entry = JarEntry::new(data).with_mode(entry.unix_mode()).with_compression(compression);
            entries.insert(name, jar_entry);
        }
        Ok(JarFile { entries })
    }

    /// Snapshot a directory tree into an in-memory JAR.
    pub fn from_directory(dir: impl AsRef<Path>) -> JarResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(JarError::InvalidInput(format!("{} is not a directory", dir.display())));
        }
        let mut entries = BTreeMap::new();
        gather_directory_entries(dir, dir, &mut entries)?;
        Ok(JarFile { entries })
    }

    /// Serialize the JAR to bytes.
    pub fn to_bytes(&self) -> JarResult<Vec<u8>> {
        let manifest = self.entries.get_key_value(MANIFEST_NAME).map(|(k, _)| k);
        let others = self.entries.keys().filter(|n| n.as_str() != MANIFEST_NAME);
        let file_names: Vec<&String> = manifest.into_iter().chain(others).collect();
        let mut buffer = Vec::new();
        let mut central_records = Vec::new();

        // Directory records first, so unpacking tools create them before their files
        let directory_names = collect_directory_names(self.entries.keys());
        for dir in directory_names {
            central_records.push(write_directory_entry(&mut buffer, &dir));
        }
        for name in file_names {
            let entry = &self.entries[name];
            let compression = entry.compression.unwrap_or_else(|| classify_entry(name));
            central_records.push(write_local_entry(&mut buffer, name, entry, compression)?);
        }

        let central_start = buffer.len() as u32;
        for record in &central_records {
            write_central_directory_entry(&mut buffer, record);
        }
        let central_size = buffer.len() as u32 - central_start;
        write_end_of_central_directory(&mut buffer, central_records.len(), central_size, central_start);
        Ok(buffer)
    }

    /// Serialize the in-memory JAR back to disk.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> JarResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Materialize the entries into a directory on disk (overwrites existing files).
    pub fn write_to_directory(&self, dir: impl AsRef<Path>) -> JarResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (name, entry) in &self.entries {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &entry.data)?;
        }
        Ok(())
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn entry(&self, name: &str) -> Option<&JarEntry> {
        self.entries.get(name)
    }

    /// Names of all `.class` entries
    pub fn class_entries(&self) -> impl Iterator<Item = &str> {
        self.entry_names().filter(|n| n.ends_with(".class"))
    }

    /// The bytes of a class by internal name, e.g. `com/example/Main`
    pub fn class_bytes(&self, class_name: &str) -> Option<&[u8]> {
        self.entries.get(&format!("{}.class", class_name)).map(|e| e.data.as_slice())
    }

    /// Replace the contents of an entry (or add a new entry). Compression of
    /// an existing entry is kept.
    pub fn replace_entry(&mut self, name: impl AsRef<str>, data: Vec<u8>) -> JarResult<()> {
        let normalized = normalize_entry_name(name.as_ref())?;
        let compression = self.entries.get(&normalized).and_then(|e| e.compression);
        self.entries.insert(normalized, JarEntry::new(data).with_compression(compression));
        Ok(())
    }
}

struct CentralDirectoryRecord {
    file_name: Vec<u8>,
    compression: JarCompression,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
    external_attrs: u32,
    is_directory: bool,
}

fn write_local_entry(
    buf: &mut Vec<u8>,
    name: &str,
    entry: &JarEntry,
    compression: JarCompression,
) -> JarResult<CentralDirectoryRecord> {
    let offset = buf.len() as u32;
    let (compressed_bytes, compression_method) = match compression {
        JarCompression::Stored => (entry.data.clone(), 0u16),
        JarCompression::Deflated => (deflate_bytes(&entry.data)?, 8u16),
    };

    let mut crc = Crc32::new();
    crc.update(&entry.data);
    let crc32 = crc.finalize();

    write_u32(buf, 0x04034b50);
    write_u16(buf, 20);
    write_u16(buf, 0);
    write_u16(buf, compression_method);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u32(buf, crc32);
    write_u32(buf, compressed_bytes.len() as u32);
    write_u32(buf, entry.data.len() as u32);
    write_u16(buf, name.len() as u16);
    write_u16(buf, 0);
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&compressed_bytes);

    Ok(CentralDirectoryRecord {
        file_name: name.as_bytes().to_vec(),
        compression,
        crc32,
        compressed_size: compressed_bytes.len() as u32,
        uncompressed_size: entry.data.len() as u32,
        local_header_offset: offset,
        external_attrs: entry.unix_mode.unwrap_or(0o644) << 16,
        is_directory: false,
    })
}

fn write_directory_entry(buf: &mut Vec<u8>, name: &str) -> CentralDirectoryRecord {
    let offset = buf.len() as u32;
    write_u32(buf, 0x04034b50);
    write_u16(buf, 10);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u32(buf, 0);
    write_u32(buf, 0);
    write_u32(buf, 0);
    write_u16(buf, name.len() as u16);
    write_u16(buf, 0);
    buf.extend_from_slice(name.as_bytes());

    CentralDirectoryRecord {
        file_name: name.as_bytes().to_vec(),
        compression: JarCompression::Stored,
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
        local_header_offset: offset,
        external_attrs: (0o755u32 << 16) | 0x10,
        is_directory: true,
    }
}

fn write_central_directory_entry(buf: &mut Vec<u8>, record: &CentralDirectoryRecord) {
    write_u32(buf, 0x02014b50);
    write_u16(buf, 0x031E);
    write_u16(buf, 20);
    write_u16(buf, 0);
    let method = match record.compression {
        JarCompression::Stored => 0u16,
        JarCompression::Deflated => 8u16,
    };
    write_u16(buf, method);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u32(buf, record.crc32);
    write_u32(buf, record.compressed_size);
    write_u32(buf, record.uncompressed_size);
    write_u16(buf, record.file_name.len() as u16);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u16(buf, if record.is_directory { 0x10 } else { 0 });
    write_u32(buf, record.external_attrs);
    write_u32(buf, record.local_header_offset);
    buf.extend_from_slice(&record.file_name);
}

fn write_end_of_central_directory(buf: &mut Vec<u8>, entry_count: usize, central_size: u32, central_offset: u32) {
    write_u32(buf, 0x06054b50);
    write_u16(buf, 0);
    write_u16(buf, 0);
    write_u16(buf, entry_count as u16);
    write_u16(buf, entry_count as u16);
    write_u32(buf, central_size);
    write_u32(buf, central_offset);
    write_u16(buf, 0);
}

fn deflate_bytes(data: &[u8]) -> JarResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gather_directory_entries(root: &Path, current: &Path, entries: &mut BTreeMap<String, JarEntry>) -> JarResult<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            gather_directory_entries(root, &path, entries)?;
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        let rel = path.strip_prefix(root).map_err(|_| {
            JarError::InvalidInput(format!("{} is not under {}", path.display(), root.display()))
        })?;
        let name = path_to_entry_name(rel)?;
        entries.insert(name, JarEntry::new(fs::read(&path)?));
    }
    Ok(())
}

fn path_to_entry_name(path: &Path) -> JarResult<String> {
    let mut components = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(part) => components.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(JarError::InvalidInput(format!("invalid entry path component in {}", path.display())));
            }
            Component::ParentDir => {
                return Err(JarError::InvalidInput("entry paths may not contain parent components".to_string()));
            }
        }
    }
    if components.is_empty() {
        return Err(JarError::InvalidInput("entry name must not be empty".to_string()));
    }
    Ok(components.join("/"))
}

fn normalize_entry_name(name: &str) -> JarResult<String> {
    path_to_entry_name(Path::new(name))
}

fn collect_directory_names<'a>(file_names: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut dirs = BTreeSet::new();
    for name in file_names {
        let mut path = PathBuf::new();
        let components: Vec<_> = Path::new(name).components().collect();
        for component in components.iter().take(components.len().saturating_sub(1)) {
            if let Component::Normal(part) = component {
                path.push(part);
                dirs.insert(format!("{}/", path.to_string_lossy()));
            }
        }
    }
    dirs.into_iter().collect()
}

fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Media is already compressed; everything else deflates well
fn classify_entry(name: &str) -> JarCompression {
    let lower = name.to_ascii_lowercase();
    match lower.rsplit('.').next() {
        Some("png" | "jpg" | "jpeg" | "gif" | "mp3" | "amr" | "aac" | "m4a" | "3gp" | "mp4") => JarCompression::Stored,
        _ => JarCompression::Deflated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip_keeps_entries() {
        let mut jar = JarFile::new();
        jar.replace_entry("com/example/Main.class", vec![0xca, 0xfe, 0xba, 0xbe]).unwrap();
        jar.replace_entry(MANIFEST_NAME, b"Manifest-Version: 1.0\r\n".to_vec()).unwrap();
        jar.replace_entry("icon.png", vec![1, 2, 3]).unwrap();
        let bytes = jar.to_bytes().unwrap();

        let again = JarFile::from_bytes(&bytes).unwrap();
        let names: Vec<_> = again.entry_names().collect();
        assert_eq!(names, vec![MANIFEST_NAME, "com/example/Main.class", "icon.png"]);
        assert_eq!(again.class_bytes("com/example/Main"), Some(&[0xca, 0xfe, 0xba, 0xbe][..]));
        assert_eq!(again.entry("icon.png").unwrap().compression, Some(JarCompression::Stored));
        assert_eq!(again.entry(MANIFEST_NAME).unwrap().compression, Some(JarCompression::Deflated));
    }

    #[test]
    fn writing_is_deterministic() {
        let mut jar = JarFile::new();
        jar.replace_entry("b/B.class", vec![2; 64]).unwrap();
        jar.replace_entry("a/A.class", vec![1; 64]).unwrap();
        assert_eq!(jar.to_bytes().unwrap(), jar.clone().to_bytes().unwrap());
    }

    #[test]
    fn manifest_is_the_first_local_entry() {
        let mut jar = JarFile::new();
        jar.replace_entry("a.txt", b"a".to_vec()).unwrap();
        jar.replace_entry(MANIFEST_NAME, b"Manifest-Version: 1.0\r\n".to_vec()).unwrap();
        let bytes = jar.to_bytes().unwrap();
        // First local header is the META-INF/ directory, then the manifest
        let first_name_len = u16::from_le_bytes([bytes[26], bytes[27]]) as usize;
        assert_eq!(&bytes[30..30 + first_name_len], b"META-INF/");
        let second = 30 + first_name_len;
        let second_name_len = u16::from_le_bytes([bytes[second + 26], bytes[second + 27]]) as usize;
        assert_eq!(&bytes[second + 30..second + 30 + second_name_len], MANIFEST_NAME.as_bytes());
    }

    #[test]
    fn parent_components_are_rejected() {
        let mut jar = JarFile::new();
        assert!(jar.replace_entry("../evil.class", vec![]).is_err());
    }
}
