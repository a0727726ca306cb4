use crate::error::{ProtolabError, Result};
use std::path::Path;

/// Check that a prototype directory can be launched: it must exist, be a
/// directory, and contain the project descriptor (e.g. `package.json`).
///
/// Both failures map to "not found" for callers; the variants only differ
/// in the message.
pub fn verify_project_dir(directory: &Path, descriptor: &str) -> Result<()> {
    if !directory.is_dir() {
        return Err(ProtolabError::DirectoryMissing(directory.to_path_buf()));
    }
    let descriptor_path = directory.join(descriptor);
    if !descriptor_path.is_file() {
        return Err(ProtolabError::DescriptorMissing(descriptor_path));
    }
    Ok(())
}
