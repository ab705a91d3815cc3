//! Recognized top-level folders.
//!
//! Only paths under these folders are visible to source resolution. Anything
//! else at a location (docs, tool output, stray archives) is ignored even if it
//! physically exists.

/// Lower-cased virtual path prefixes that the game reads.
///
/// The empty prefix stands for root-level files (the game executable and
/// libraries). Those only exist for the base installation.
pub const VIRTUAL_PATH_PREFIXES: &[&str] = &[
    "",
    "aiscripts/",
    "assets/",
    "cutscenes/",
    "extensions/",
    "index/",
    "libraries/",
    "maps/",
    "md/",
    "music/",
    "particles/",
    "sfx/",
    "shadergl/",
    "t/",
    "textures/",
    "ui/",
    "addons/",
    "core/",
    "widget/",
    "voice-l044/",
    "voice-l049/",
    "vulkan/",
];

/// Folder holding extensions under the base installation.
pub const EXTENSIONS_PREFIX: &str = "extensions/";

/// Returns `true` if `path` (lower-cased, forward slashes) is under a recognized
/// folder, or is a root-level file.
pub fn is_recognized(path: &str) -> bool {
    VIRTUAL_PATH_PREFIXES
        .iter()
        .any(|prefix| has_prefix(path, prefix))
}

/// Like [`is_recognized`], but rejects root-level files for extensions.
pub fn is_recognized_for(path: &str, is_extension: bool) -> bool {
    VIRTUAL_PATH_PREFIXES
        .iter()
        .filter(|prefix| !(is_extension && prefix.is_empty()))
        .any(|prefix| has_prefix(path, prefix))
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        !path.is_empty() && !path.contains('/')
    } else {
        path.starts_with(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_folders() {
        assert!(is_recognized("libraries/jobs.xml"));
        assert!(is_recognized("t/0001-l044.xml"));
        assert!(is_recognized("voice-l044/npc/hello.ogg"));
        assert!(is_recognized("extensions/ego_dlc_split/content.xml"));
    }

    #[test]
    fn test_unknown_folders() {
        assert!(!is_recognized("docs/readme.txt"));
        assert!(!is_recognized("tmp/t/0001.xml"));
        // Prefix must match a whole folder name.
        assert!(!is_recognized("textures2/a.dds"));
        assert!(!is_recognized(""));
    }

    #[test]
    fn test_root_files() {
        assert!(is_recognized("x4.exe"));
        assert!(is_recognized_for("x4.exe", false));
        assert!(!is_recognized_for("x4.exe", true));
        assert!(is_recognized_for("md/setup.xml", true));
    }
}
