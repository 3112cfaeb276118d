//! Gzip decompression of downloaded zone files

use crate::error::{Error, Result};
use crate::utils::humanize_bytes;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Decompress a gzip file to a sibling path without the `.gz` suffix.
///
/// The decompressed output is written directly to the sibling path and
/// removed again if decompression fails partway, so a corrupt archive never
/// leaves a truncated zone file behind. The compressed original is deleted
/// on success unless `keep_compressed` is set.
///
/// Returns the path of the decompressed file.
pub async fn gzip_decompress(path: &Path, keep_compressed: bool) -> Result<PathBuf> {
    let output = path.with_extension("");
    if output == path || path.extension().and_then(|e| e.to_str()) != Some("gz") {
        return Err(Error::Decompress {
            path: path.to_path_buf(),
            reason: "no .gz suffix to strip".to_string(),
        });
    }

    let compressed_size = tokio::fs::metadata(path).await?.len();
    tracing::debug!(
        path = %path.display(),
        size = %humanize_bytes(compressed_size),
        "Decompressing"
    );

    let source = path.to_path_buf();
    let dest = output.clone();
    let copied = tokio::task::spawn_blocking(move || -> std::io::Result<u64> {
        let input = std::fs::File::open(&source)?;
        let mut decoder = flate2::read::GzDecoder::new(std::io::BufReader::new(input));
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&dest)?);
        let copied = std::io::copy(&mut decoder, &mut writer)?;
        writer.flush()?;
        Ok(copied)
    })
    .await
    .map_err(|e| Error::Decompress {
        path: path.to_path_buf(),
        reason: format!("decompression task panicked: {e}"),
    })?;

    let decompressed_size = match copied {
        Ok(size) => size,
        Err(e) => {
            tokio::fs::remove_file(&output).await.ok();
            return Err(Error::Decompress {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    tracing::debug!(
        path = %output.display(),
        size = %humanize_bytes(decompressed_size),
        "Decompressed"
    );

    if !keep_compressed {
        tokio::fs::remove_file(path).await?;
        tracing::debug!(path = %path.display(), "Removed compressed original");
    }

    Ok(output)
}
