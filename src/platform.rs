//! Platform specific link creation
//!
//! POSIX systems get a real symbolic link. Windows has no unprivileged
//! symlinks, so files get a hard link and directories a junction created
//! through `mklink`.

use std::io;
use std::path::Path;

/// Creates a link at `link` pointing to `target`
pub trait LinkCreator: Send + Sync {
    fn create_link(&self, target: &Path, link: &Path, is_dir: bool) -> io::Result<()>;
}

/// Symlink based links
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkCreator;

#[cfg(unix)]
impl LinkCreator for SymlinkCreator {
    fn create_link(&self, target: &Path, link: &Path, _is_dir: bool) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }
}

/// Hard links for files, junctions for directories
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct JunctionCreator;

#[cfg(windows)]
impl LinkCreator for JunctionCreator {
    fn create_link(&self, target: &Path, link: &Path, is_dir: bool) -> io::Result<()> {
        if !is_dir {
            return std::fs::hard_link(target, link);
        }

        let status = std::process::Command::new("cmd")
            .arg("/C")
            .arg("mklink")
            .arg("/J")
            .arg(link)
            .arg(target)
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("mklink /J exited with {}", status),
            ))
        }
    }
}

/// Link strategy for the platform this binary was built for
pub fn default_link_creator() -> Box<dyn LinkCreator> {
    #[cfg(unix)]
    {
        Box::new(SymlinkCreator)
    }
    #[cfg(windows)]
    {
        Box::new(JunctionCreator)
    }
}
