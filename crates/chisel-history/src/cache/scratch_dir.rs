use super::CacheError;

use fs2::FileExt;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use walkdir::WalkDir;

/// Every scratch directory is named `{SCRATCH_DIR_PREFIX}{id}-{unix seconds at creation}`.
pub const SCRATCH_DIR_PREFIX: &str = "chiseltmp";

/// Scratch directories older than this are candidates for [`clear_stale_scratch_dirs`].
pub const STALE_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const LOCK_FILE_NAME: &str = "lock";

/// A process-owned temporary directory.
///
/// The directory holds a `lock` file that stays exclusively locked for as long as this value is alive, which is how other
/// processes tell a live scratch directory from one left behind by a crash. Dropping the value releases the lock and deletes
/// the directory with everything in it, so anything stored inside must be closed first.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    lock: Option<File>,
}

impl ScratchDir {
    /// Creates a new scratch directory inside `base/group`, creating `base/group` if needed.
    pub fn create(base: &Path, group: &str) -> Result<Self, CacheError> {
        let parent = base.join(group);
        fs::create_dir_all(&parent)?;

        let name = format!(
            "{}{}-{}",
            SCRATCH_DIR_PREFIX,
            Uuid::new_v4().simple(),
            unix_time(SystemTime::now())
        );
        let path = parent.join(name);
        fs::create_dir(&path)?;

        let lock = match lock_dir(&path) {
            Ok(lock) => lock,
            Err(e) => {
                let _ = fs::remove_dir_all(&path);
                return Err(e);
            }
        };
        log::debug!("Created scratch directory {:?}", path);

        Ok(Self {
            path,
            lock: Some(lock),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for ScratchDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            if let Err(e) = FileExt::unlock(&lock) {
                log::warn!("Failed to unlock scratch directory {:?}: {}", self.path, e);
            }
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed scratch directory {:?}", self.path),
            Err(e) => log::warn!("Failed to remove scratch directory {:?}: {}", self.path, e),
        }
    }
}

fn lock_dir(path: &Path) -> Result<File, CacheError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path.join(LOCK_FILE_NAME))?;
    FileExt::try_lock_exclusive(&file)?;
    Ok(file)
}

fn unix_time(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The creation time embedded in a scratch directory name, if `name` is one.
fn scratch_dir_created_at(name: &str) -> Option<u64> {
    let rest = name.strip_prefix(SCRATCH_DIR_PREFIX)?;
    let (_id, time) = rest.rsplit_once('-')?;
    time.parse().ok()
}

/// Deletes scratch directories left behind by processes that no longer exist.
///
/// `base` is searched recursively and the platform temp directory is searched at the top level. A directory is only deleted
/// if its name says it is older than [`STALE_AFTER`] and its lock file can be locked without blocking. Returns the number of
/// directories removed.
pub fn clear_stale_scratch_dirs(base: &Path) -> usize {
    let cutoff = unix_time(SystemTime::now()).saturating_sub(STALE_AFTER.as_secs());

    let mut candidates = find_scratch_dirs(base, usize::MAX);
    candidates.extend(find_scratch_dirs(&env::temp_dir(), 1));

    let mut removed = 0;
    for (path, created_at) in candidates {
        if created_at < cutoff && remove_if_abandoned(&path) {
            removed += 1;
        }
    }
    removed
}

fn find_scratch_dirs(root: &Path, max_depth: usize) -> Vec<(PathBuf, u64)> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable cache entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(created_at) = entry.file_name().to_str().and_then(scratch_dir_created_at) {
            // Nothing inside a scratch directory is another scratch directory.
            walker.skip_current_dir();
            found.push((entry.into_path(), created_at));
        }
    }
    found
}

fn remove_if_abandoned(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let lock_path = path.join(LOCK_FILE_NAME);
    if lock_path.exists() {
        let lock = match File::open(&lock_path) {
            Ok(lock) => lock,
            Err(_) => return false,
        };
        if FileExt::try_lock_exclusive(&lock).is_err() {
            log::debug!("Scratch directory {:?} is still in use", path);
            return false;
        }
        // The lock only needs to be held long enough to prove the owner is gone.
        drop(lock);
    }
    match fs::remove_dir_all(path) {
        Ok(()) => {
            log::debug!("Removed stale scratch directory {:?}", path);
            true
        }
        Err(e) => {
            log::warn!("Failed to remove stale scratch directory {:?}: {}", path, e);
            false
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
