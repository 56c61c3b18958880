//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn source() -> PathBuf {
        "src".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn host_root() -> Option<String> {
        None
    }

    pub fn summary_length() -> usize {
        10
    }

    pub mod extensions {
        pub fn document() -> String {
            "md".into()
        }

        pub fn generated() -> String {
            "mdg".into()
        }

        pub fn comment() -> String {
            "mdc".into()
        }

        pub fn output() -> String {
            "html".into()
        }
    }

    pub mod media {
        pub fn extensions() -> Vec<String> {
            [
                "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp", "pdf", "mp3",
                "mp4", "webm", "ogg", "wav", "zip",
            ]
            .into_iter()
            .map(String::from)
            .collect()
        }
    }
}

// ============================================================================
// [render] Section Defaults
// ============================================================================

pub mod render {
    use super::super::RenderBackend;

    pub fn backend() -> RenderBackend {
        RenderBackend::default()
    }

    pub fn command() -> Vec<String> {
        vec![
            "pandoc".into(),
            "--from=markdown".into(),
            "--to=html5".into(),
            "--template={templates}/page.html".into(),
        ]
    }

    pub fn comment_command() -> Vec<String> {
        vec![
            "pandoc".into(),
            "--from=markdown".into(),
            "--to=html5".into(),
        ]
    }

    pub fn variable_flag() -> String {
        "--variable".into()
    }

    pub fn timeout() -> u64 {
        60
    }
}

// ============================================================================
// [equations] Section Defaults
// ============================================================================

pub mod equations {
    pub fn command() -> Vec<String> {
        Vec::new()
    }

    pub fn extension() -> String {
        "svg".into()
    }

    pub fn timeout() -> u64 {
        30
    }
}

// ============================================================================
// [log] Section Defaults
// ============================================================================

pub mod log {
    use std::path::PathBuf;

    pub fn verbosity() -> u8 {
        1
    }

    pub fn file() -> Option<PathBuf> {
        None
    }
}
