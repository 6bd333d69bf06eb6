//! Mount option parsing
//!
//! mount(8) style option strings mix generic flags (`noatime`, `ro`) with
//! filesystem-specific data (`discard`). The syscall takes them separately.

/// Generic mount flags understood by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFlag {
    ReadOnly,
    NoSuid,
    NoDev,
    NoExec,
    Synchronous,
    NoAtime,
    NoDirAtime,
    RelAtime,
}

/// Parsed mount options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    pub flags: Vec<MountFlag>,
    /// Filesystem-specific options passed through as mount data
    pub data: Vec<String>,
}

impl MountOptions {
    /// Parse a comma-separated option string
    pub fn parse(options: &str) -> Self {
        let mut parsed = Self::default();
        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let flag = match option {
                // mount(8) spellings with no kernel flag of their own
                "defaults" | "rw" | "async" | "suid" | "dev" | "exec" | "atime" => continue,
                "ro" => MountFlag::ReadOnly,
                "nosuid" => MountFlag::NoSuid,
                "nodev" => MountFlag::NoDev,
                "noexec" => MountFlag::NoExec,
                "sync" => MountFlag::Synchronous,
                "noatime" => MountFlag::NoAtime,
                "nodiratime" => MountFlag::NoDirAtime,
                "relatime" => MountFlag::RelAtime,
                other => {
                    parsed.data.push(other.to_string());
                    continue;
                }
            };
            if !parsed.flags.contains(&flag) {
                parsed.flags.push(flag);
            }
        }
        parsed
    }

    /// Data string for the syscall, if any
    pub fn data(&self) -> Option<String> {
        (!self.data.is_empty()).then(|| self.data.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = MountOptions::parse("discard,defaults");
        assert!(opts.flags.is_empty());
        assert_eq!(opts.data().as_deref(), Some("discard"));
    }

    #[test]
    fn test_flags_and_data() {
        let opts = MountOptions::parse(" noatime, ro ,discard,commit=60,noatime");
        assert_eq!(opts.flags, vec![MountFlag::NoAtime, MountFlag::ReadOnly]);
        assert_eq!(opts.data().as_deref(), Some("discard,commit=60"));
    }

    #[test]
    fn test_empty() {
        let opts = MountOptions::parse("");
        assert_eq!(opts, MountOptions::default());
        assert_eq!(opts.data(), None);
    }
}
