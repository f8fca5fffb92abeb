//! Host platform detection
//!
//! Supplies the default target OS name and CPU architecture when neither
//! the image document, the CLI flags, nor the configuration file name one.

use crate::package::CpuArchitecture;
use std::env;

/// The host operating system name as used in package metadata
/// ("windows", "linux", "macos").
pub fn detect_host_os() -> String {
    env::consts::OS.to_string()
}

/// The host CPU architecture, `Unspecified` when unrecognized.
pub fn detect_host_architecture() -> CpuArchitecture {
    match env::consts::ARCH {
        "x86" => CpuArchitecture::X86,
        "x86_64" => CpuArchitecture::X64,
        "arm" => CpuArchitecture::Arm,
        "aarch64" => CpuArchitecture::Arm64,
        _ => CpuArchitecture::Unspecified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_host_os() {
        assert!(!detect_host_os().is_empty());
    }

    #[test]
    fn test_detect_host_architecture_is_stable() {
        assert_eq!(detect_host_architecture(), detect_host_architecture());
    }
}
