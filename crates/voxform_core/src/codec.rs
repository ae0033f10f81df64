//! # Codec Entry Points
//!
//! ```text
//! read:  bytes ─► ChunkReader ─► VoxDocument ─► flatten ─► ParsedModel
//! write: VoxelModel ─► synthesize ─► VoxDocument ─► chunks ─► bytes
//! ```
//!
//! ## Output Strategies
//!
//! - `Buffered`: the whole file is built in memory, so the `MAIN` header is
//!   written with its final length.
//! - `Patch`: children are streamed after a placeholder `MAIN` header and
//!   the length is patched with one seek at the end.
//!
//! Both produce the same bytes. File writes go to a hidden sibling first
//! and replace the target by rename once every byte is on disk.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::chunk::{self, Chunk, ChunkId, ChunkReader, ChunkWriter};
use crate::config::{CodecConfig, WriteStrategy};
use crate::document::VoxDocument;
use crate::error::{VoxError, VoxResult};
use crate::model::{self, ParsedModel, VoxelModel};

/// Reads and writes voxel model files.
///
/// Holds only its configuration; every call is independent.
#[derive(Clone, Debug, Default)]
pub struct VoxCodec {
    config: CodecConfig,
}

impl VoxCodec {
    /// Creates a codec with the given settings.
    #[must_use]
    pub const fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Active settings.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &CodecConfig {
        &self.config
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Decodes a whole file from a stream positioned at its first byte.
    ///
    /// # Errors
    ///
    /// Any parse error, or `FileTooLarge` before anything is read.
    pub fn read_document<R: Read + Seek>(&self, reader: R) -> VoxResult<VoxDocument> {
        let mut chunks = ChunkReader::new(reader)?;
        let size = chunks.remaining();
        if size > self.config.max_file_size {
            return Err(VoxError::FileTooLarge { size, limit: self.config.max_file_size });
        }

        chunks.read_file_header()?;
        let root = chunks.read_root()?;
        tracing::debug!(bytes = size, children = root.children.len(), "read MAIN chunk");
        VoxDocument::decode(&root, self.config.render_key_order)
    }

    /// Decodes a file and flattens its model.
    ///
    /// # Errors
    ///
    /// Any parse error, `MissingModel` or `MultiModelUnsupported`.
    pub fn read<R: Read + Seek>(&self, reader: R) -> VoxResult<ParsedModel> {
        model::flatten(self.read_document(reader)?, self.config.single_model)
    }

    /// Decodes an in-memory file and flattens its model.
    ///
    /// # Errors
    ///
    /// Same as [`VoxCodec::read`].
    pub fn read_bytes(&self, bytes: &[u8]) -> VoxResult<ParsedModel> {
        self.read(Cursor::new(bytes))
    }

    /// Opens a file and decodes it whole.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be opened, else as [`VoxCodec::read_document`].
    pub fn read_document_path(&self, path: impl AsRef<Path>) -> VoxResult<VoxDocument> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VoxError::io("opening file", 0, e))?;
        tracing::debug!(path = %path.display(), "reading voxel file");
        self.read_document(BufReader::new(file))
    }

    /// Opens a file, decodes it and flattens its model.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be opened, else as [`VoxCodec::read`].
    pub fn read_path(&self, path: impl AsRef<Path>) -> VoxResult<ParsedModel> {
        model::flatten(self.read_document_path(path)?, self.config.single_model)
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Encodes a flat model into a complete file.
    ///
    /// # Errors
    ///
    /// `EmptyModel`, `VoxelOutOfBounds` or `TooManyColors`.
    pub fn encode(&self, model: &VoxelModel) -> VoxResult<Vec<u8>> {
        self.encode_document(&model::synthesize(model)?)
    }

    /// Encodes a document into a complete file.
    ///
    /// # Errors
    ///
    /// Any check failed by [`VoxDocument::children`].
    pub fn encode_document(&self, document: &VoxDocument) -> VoxResult<Vec<u8>> {
        chunk::encode_file(&document.encode()?)
    }

    /// Writes a document to a seekable sink using the configured strategy.
    ///
    /// The sink is returned so callers can reuse it.
    ///
    /// # Errors
    ///
    /// Document checks run before the first byte; after that, `Io`.
    pub fn write_document<W: Write + Seek>(&self, document: &VoxDocument, writer: W) -> VoxResult<W> {
        self.write_chunks(document.children()?, writer)
    }

    fn write_chunks<W: Write + Seek>(&self, children: Vec<Chunk>, mut writer: W) -> VoxResult<W> {
        match self.config.write_strategy {
            WriteStrategy::Buffered => {
                let bytes = chunk::encode_file(&Chunk::container(ChunkId::MAIN, children))?;
                writer
                    .write_all(&bytes)
                    .map_err(|e| VoxError::io("writing file", 0, e))?;
                writer.flush().map_err(|e| VoxError::io("flushing", bytes.len() as u64, e))?;
                Ok(writer)
            }
            WriteStrategy::Patch => {
                let mut out = ChunkWriter::new(writer)?;
                out.begin()?;
                for child in &children {
                    out.write_child(child)?;
                }
                out.finish()
            }
        }
    }

    /// Writes a flat model to `path`.
    ///
    /// # Errors
    ///
    /// Model checks fail before the file system is touched; the target is
    /// left as it was on any error.
    pub fn write_path(&self, path: impl AsRef<Path>, model: &VoxelModel) -> VoxResult<()> {
        self.write_document_path(path, &model::synthesize(model)?)
    }

    /// Writes a document to `path`.
    ///
    /// # Errors
    ///
    /// Same as [`VoxCodec::write_path`].
    pub fn write_document_path(&self, path: impl AsRef<Path>, document: &VoxDocument) -> VoxResult<()> {
        let path = path.as_ref();
        let children = document.children()?;
        replace_file(path, |sink| self.write_chunks(children, sink))?;

        tracing::debug!(
            path = %path.display(),
            strategy = ?self.config.write_strategy,
            "wrote voxel file"
        );
        Ok(())
    }
}

/// Writes `path` through a hidden sibling that is renamed over it.
///
/// On any error the sibling is removed and `path` keeps its old contents.
fn replace_file<F>(path: &Path, write: F) -> VoxResult<()>
where
    F: FnOnce(BufWriter<File>) -> VoxResult<BufWriter<File>>,
{
    let temp = temp_sibling(path)?;
    if let Err(err) = write_temp(&temp, write) {
        discard_temp(&temp);
        return Err(err);
    }
    if let Err(err) = fs::rename(&temp, path) {
        discard_temp(&temp);
        return Err(VoxError::io("replacing output file", 0, err));
    }
    Ok(())
}

fn write_temp<F>(temp: &Path, write: F) -> VoxResult<()>
where
    F: FnOnce(BufWriter<File>) -> VoxResult<BufWriter<File>>,
{
    let file = File::create(temp).map_err(|e| VoxError::io("creating temporary file", 0, e))?;
    let writer = write(BufWriter::new(file))?;
    let file = writer
        .into_inner()
        .map_err(|e| VoxError::io("flushing temporary file", 0, e.into_error()))?;
    file.sync_all()
        .map_err(|e| VoxError::io("syncing temporary file", 0, e))
}

fn discard_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %temp.display(), error = %e, "could not remove temporary file"),
    }
}

/// `dir/name` → `dir/.name.tmp`
fn temp_sibling(path: &Path) -> VoxResult<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        VoxError::io(
            "resolving output path",
            0,
            io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"),
        )
    })?;
    let mut temp = OsString::from(".");
    temp.push(name);
    temp.push(".tmp");
    Ok(path.with_file_name(temp))
}
