use std::{
  fs::File,
  io::{Read, Write},
  path::Path,
};

use flate2::{Compression, write::GzEncoder};
use zip::{ZipWriter, write::SimpleFileOptions};

use super::ArchiveError;

/// One sink for both supported formats. Paths inside the archive always
/// use forward slashes.
pub(crate) enum ArchiveWriter {
  Tgz(tar::Builder<GzEncoder<File>>),
  Zip(ZipWriter<File>),
}

impl ArchiveWriter {
  pub(crate) fn tgz(file: File) -> Self {
    Self::Tgz(tar::Builder::new(GzEncoder::new(file, Compression::default())))
  }

  pub(crate) fn zip(file: File) -> Self {
    Self::Zip(ZipWriter::new(file))
  }

  pub(crate) fn add_bytes(&mut self, archive_path: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
    match self {
      Self::Tgz(builder) => {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
          .append_data(&mut header, archive_path, bytes)
          .map_err(|source| ArchiveError::Write {
            entry: archive_path.to_string(),
            source,
          })
      }
      Self::Zip(writer) => {
        writer
          .start_file(archive_path, SimpleFileOptions::default())
          .map_err(|source| ArchiveError::Zip {
            entry: archive_path.to_string(),
            source,
          })?;
        writer.write_all(bytes).map_err(|source| ArchiveError::Write {
          entry: archive_path.to_string(),
          source,
        })
      }
    }
  }

  pub(crate) fn add_file(&mut self, archive_path: &str, disk_path: &Path) -> Result<(), ArchiveError> {
    let mut content = Vec::new();
    File::open(disk_path)
      .and_then(|mut file| file.read_to_end(&mut content))
      .map_err(|source| ArchiveError::Read {
        path: disk_path.display().to_string(),
        source,
      })?;
    self.add_bytes(archive_path, &content)
  }

  pub(crate) fn finish(self) -> Result<(), ArchiveError> {
    let into_error = |source: std::io::Error| ArchiveError::Write {
      entry: "<finish>".to_string(),
      source,
    };
    match self {
      Self::Tgz(builder) => {
        let encoder = builder.into_inner().map_err(into_error)?;
        encoder.finish().map_err(into_error)?;
        Ok(())
      }
      Self::Zip(writer) => {
        writer.finish().map_err(|source| ArchiveError::Zip {
          entry: "<finish>".to_string(),
          source,
        })?;
        Ok(())
      }
    }
  }
}
