//! In-place overwrite of record files before they are unlinked
//!
//! Overwriting in place only helps on filesystems that rewrite blocks where
//! they are (ext4 without data journaling, xfs). On copy-on-write or
//! log-structured filesystems and on SSDs with wear leveling the old blocks
//! may survive; encryption at rest is what actually protects them.

use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use rand::RngCore;

const BLOCK_SIZE: usize = 64 * 1024;

/// Overwrite the full extent of `path` with random bytes `passes` times,
/// syncing after each pass.
pub fn overwrite(path: &Path, passes: u32) -> io::Result<()> {
    if passes == 0 {
        return Ok(());
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    let mut block = vec![0u8; BLOCK_SIZE.min(len as usize).max(1)];
    let mut rng = rand::thread_rng();

    for _ in 0..passes {
        file.seek(SeekFrom::Start(0))?;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(block.len() as u64) as usize;
            rng.fill_bytes(&mut block[..n]);
            file.write_all(&block[..n])?;
            remaining -= n as u64;
        }
        file.sync_data()?;
    }
    Ok(())
}
