//! BAM file I/O utilities.
//!
//! Readers and writers are built over boxed byte streams so the same code path serves
//! regular files, standard input/output and named pipes. Every reader is returned together
//! with the header it read, and every writer has already written the header it was given.
//!
//! # Threading Model
//!
//! - `threads <= 1` uses a single-threaded BGZF codec (lowest overhead, used for pipes)
//! - `threads > 1` uses noodles' multi-threaded BGZF reader or writer

use anyhow::{Context, Result};
use noodles::bgzf;
use noodles::bgzf::io::writer::CompressionLevel;
use noodles::bgzf::io::{MultithreadedReader, MultithreadedWriter, multithreaded_writer};
use noodles::sam::Header;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Read, Write};
use std::num::NonZero;
use std::path::Path;

/// Byte source feeding a BGZF reader.
pub type InputStream = Box<dyn Read + Send>;

/// Byte sink fed by a BGZF writer.
pub type OutputStream = Box<dyn Write + Send>;

/// Single- or multi-threaded BGZF reader.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader
    SingleThreaded(bgzf::io::Reader<InputStream>),
    /// Multi-threaded BGZF reader
    MultiThreaded(MultithreadedReader<InputStream>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// BAM reader over any supported input.
pub type BamReader = noodles::bam::io::Reader<BgzfReaderEnum>;

/// Single- or multi-threaded BGZF writer.
pub enum BgzfWriterEnum {
    /// Single-threaded BGZF writer
    SingleThreaded(bgzf::io::Writer<OutputStream>),
    /// Multi-threaded BGZF writer
    MultiThreaded(MultithreadedWriter<OutputStream>),
}

impl Write for BgzfWriterEnum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.write(buf),
            BgzfWriterEnum::MultiThreaded(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.flush(),
            BgzfWriterEnum::MultiThreaded(w) => w.flush(),
        }
    }
}

impl BgzfWriterEnum {
    /// Flushes all blocks, writes the BGZF EOF marker and flushes the underlying sink.
    ///
    /// # Errors
    /// Returns an error if any block cannot be written.
    pub fn finish(self) -> io::Result<()> {
        let mut inner = match self {
            BgzfWriterEnum::SingleThreaded(w) => w.finish()?,
            BgzfWriterEnum::MultiThreaded(mut w) => w.finish()?,
        };
        inner.flush()
    }
}

/// BAM writer over any supported output.
pub type BamWriter = noodles::bam::io::Writer<BgzfWriterEnum>;

/// Returns true if the path names standard input (`-`, `stdin` or `/dev/stdin`).
///
/// ```
/// use umirescue_lib::bam_io::is_stdin_path;
///
/// assert!(is_stdin_path("-"));
/// assert!(is_stdin_path("stdin"));
/// assert!(!is_stdin_path("input.bam"));
/// ```
pub fn is_stdin_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "stdin" || path_str == "/dev/stdin"
}

/// Returns true if the path names standard output (`-`, `stdout` or `/dev/stdout`).
pub fn is_stdout_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "stdout" || path_str == "/dev/stdout"
}

fn open_input(path: &Path) -> Result<InputStream> {
    if is_stdin_path(path) {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open input BAM: {}", path.display()))?;
    Ok(Box::new(file))
}

fn open_output(path: &Path) -> Result<OutputStream> {
    if is_stdout_path(path) {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create output BAM: {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Opens a BAM from a path (or stdin) and reads its header.
///
/// # Errors
/// Returns an error if the input cannot be opened or the header cannot be read.
///
/// # Example
/// ```no_run
/// use umirescue_lib::bam_io::create_bam_reader;
///
/// let (mut reader, header) = create_bam_reader("input.bam", 1).unwrap();
/// ```
pub fn create_bam_reader<P: AsRef<Path>>(path: P, threads: usize) -> Result<(BamReader, Header)> {
    let path_ref = path.as_ref();
    let input = open_input(path_ref)?;
    create_bam_reader_from(input, threads, &path_ref.display().to_string())
}

/// Wraps an already-open byte stream in a BAM reader and reads its header.
///
/// # Errors
/// Returns an error if the header cannot be read.
pub fn create_bam_reader_from(
    input: InputStream,
    threads: usize,
    description: &str,
) -> Result<(BamReader, Header)> {
    let bgzf_reader = match NonZero::new(threads).filter(|n| n.get() > 1) {
        Some(worker_count) => {
            BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(worker_count, input))
        }
        None => BgzfReaderEnum::SingleThreaded(bgzf::io::Reader::new(input)),
    };

    let mut reader = noodles::bam::io::Reader::from(bgzf_reader);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {description}"))?;

    Ok((reader, header))
}

/// Creates a BAM writer for a path (or stdout) and writes the header.
///
/// # Errors
/// Returns an error if the output cannot be created or the header cannot be written.
///
/// # Example
/// ```no_run
/// use umirescue_lib::bam_io::create_bam_writer;
/// use noodles::sam::Header;
///
/// let header = Header::default();
/// let mut writer = create_bam_writer("output.bam", &header, 1, 6).unwrap();
/// ```
pub fn create_bam_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
    compression_level: u32,
) -> Result<BamWriter> {
    let path_ref = path.as_ref();
    let output = open_output(path_ref)?;
    create_bam_writer_from(output, header, threads, compression_level, &path_ref.display().to_string())
}

/// Wraps an already-open byte sink in a BAM writer and writes the header.
///
/// Compression level 0 writes uncompressed BGZF blocks, which is what downstream
/// pipe consumers expect.
///
/// # Errors
/// Returns an error if the compression level is invalid or the header cannot be written.
pub fn create_bam_writer_from(
    output: OutputStream,
    header: &Header,
    threads: usize,
    compression_level: u32,
    description: &str,
) -> Result<BamWriter> {
    let level = u8::try_from(compression_level)
        .ok()
        .and_then(CompressionLevel::new)
        .with_context(|| format!("Invalid compression level: {compression_level}"))?;

    let bgzf_writer = match NonZero::new(threads).filter(|n| n.get() > 1) {
        Some(worker_count) => BgzfWriterEnum::MultiThreaded(
            multithreaded_writer::Builder::default()
                .set_worker_count(worker_count)
                .set_compression_level(level)
                .build_from_writer(output),
        ),
        None => BgzfWriterEnum::SingleThreaded(
            bgzf::io::writer::Builder::default()
                .set_compression_level(level)
                .build_from_writer(output),
        ),
    };

    let mut writer = noodles::bam::io::Writer::from(bgzf_writer);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write header to: {description}"))?;
    Ok(writer)
}

/// Finishes a BAM writer, writing the EOF block.
///
/// # Errors
/// Returns an error if the final blocks cannot be written.
pub fn finish_bam_writer(writer: BamWriter, description: &str) -> Result<()> {
    writer
        .into_inner()
        .finish()
        .with_context(|| format!("Failed to finish output BAM: {description}"))
}
