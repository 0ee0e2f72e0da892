//! Target platform description and predefined macros

use thiserror::Error;

/// Supported target architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    I386,
    Arm64,
    Arm,
    Riscv64,
    PowerPC64,
}

impl Architecture {
    /// Architecture of the running process
    pub fn host() -> Self {
        if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "x86") {
            Architecture::I386
        } else if cfg!(target_arch = "arm") {
            Architecture::Arm
        } else if cfg!(target_arch = "riscv64") {
            Architecture::Riscv64
        } else if cfg!(target_arch = "powerpc64") {
            Architecture::PowerPC64
        } else {
            Architecture::X86_64
        }
    }

    /// Debian multiarch include directory name
    pub fn multiarch_dir(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64-linux-gnu",
            Architecture::I386 => "i386-linux-gnu",
            Architecture::Arm64 => "aarch64-linux-gnu",
            Architecture::Arm => "arm-linux-gnueabihf",
            Architecture::Riscv64 => "riscv64-linux-gnu",
            Architecture::PowerPC64 => "powerpc64le-linux-gnu",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::I386 => "x86",
            Architecture::Arm64 => "aarch64",
            Architecture::Arm => "arm",
            Architecture::Riscv64 => "riscv64",
            Architecture::PowerPC64 => "powerpc64",
        }
    }

    pub fn pointer_width(&self) -> u32 {
        match self {
            Architecture::I386 | Architecture::Arm => 32,
            _ => 64,
        }
    }

    /// Get architecture-specific predefined macros
    pub fn predefined_macros(&self) -> Vec<MacroDefinition> {
        let mut macros = match self {
            Architecture::X86_64 => vec![
                MacroDefinition::defined("__x86_64__"),
                MacroDefinition::defined("__x86_64"),
                MacroDefinition::defined("__amd64__"),
            ],
            Architecture::I386 => vec![
                MacroDefinition::defined("__i386__"),
                MacroDefinition::defined("__i386"),
            ],
            Architecture::Arm64 => vec![MacroDefinition::defined("__aarch64__")],
            Architecture::Arm => vec![MacroDefinition::defined("__arm__")],
            Architecture::Riscv64 => vec![
                MacroDefinition::defined("__riscv"),
                MacroDefinition::with_value("__riscv_xlen", "64"),
            ],
            Architecture::PowerPC64 => vec![
                MacroDefinition::defined("__powerpc__"),
                MacroDefinition::defined("__powerpc64__"),
            ],
        };

        if self.pointer_width() == 64 {
            macros.push(MacroDefinition::defined("__LP64__"));
            macros.push(MacroDefinition::defined("_LP64"));
            macros.push(MacroDefinition::with_value("__WORDSIZE", "64"));
            macros.push(MacroDefinition::with_value("__TIMESIZE", "64"));
            macros.push(MacroDefinition::defined("__WORDSIZE_TIME64_COMPAT32"));
        } else {
            macros.push(MacroDefinition::defined("_ILP32"));
            macros.push(MacroDefinition::with_value("__WORDSIZE", "32"));
            macros.push(MacroDefinition::with_value("__TIMESIZE", "32"));
        }
        macros
    }
}

impl std::str::FromStr for Architecture {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "i386" | "i686" | "x86" => Ok(Architecture::I386),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            "arm" | "arm32" => Ok(Architecture::Arm),
            "riscv64" => Ok(Architecture::Riscv64),
            "powerpc64" | "ppc64" | "ppc64le" => Ok(Architecture::PowerPC64),
            _ => Err(PlatformError::UnknownArchitecture(s.to_string())),
        }
    }
}

/// Target operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOs {
    Linux,
    MacOs,
    Windows,
    OtherUnix,
}

impl TargetOs {
    pub fn host() -> Self {
        if cfg!(target_os = "linux") {
            TargetOs::Linux
        } else if cfg!(target_os = "macos") {
            TargetOs::MacOs
        } else if cfg!(windows) {
            TargetOs::Windows
        } else {
            TargetOs::OtherUnix
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetOs::Linux => "linux",
            TargetOs::MacOs => "macos",
            TargetOs::Windows => "windows",
            TargetOs::OtherUnix => "unix",
        }
    }

    pub fn predefined_macros(&self) -> Vec<MacroDefinition> {
        match self {
            TargetOs::Linux => vec![
                MacroDefinition::defined("__linux__"),
                MacroDefinition::defined("__linux"),
                MacroDefinition::defined("__unix__"),
                MacroDefinition::defined("__unix"),
                MacroDefinition::defined("__gnu_linux__"),
                MacroDefinition::with_value("__GLIBC__", "2"),
                MacroDefinition::with_value("__GLIBC_MINOR__", "31"),
                MacroDefinition::defined("__USE_MISC"),
                MacroDefinition::defined("__USE_XOPEN"),
            ],
            TargetOs::MacOs => vec![
                MacroDefinition::defined("__APPLE__"),
                MacroDefinition::defined("__MACH__"),
                MacroDefinition::defined("__unix__"),
            ],
            TargetOs::Windows => vec![MacroDefinition::defined("_WIN32")],
            TargetOs::OtherUnix => vec![
                MacroDefinition::defined("__unix__"),
                MacroDefinition::defined("__unix"),
            ],
        }
    }
}

/// Target the headers are interpreted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: TargetOs,
    pub arch: Architecture,
}

impl Platform {
    /// Platform of the running process
    pub fn host() -> Self {
        Self {
            os: TargetOs::host(),
            arch: Architecture::host(),
        }
    }

    /// Every macro a native compiler would predefine for this target
    ///
    /// The compiler identity claims an old GCC so that headers take their
    /// most conservative code paths. `__cplusplus` is never defined.
    pub fn predefined_macros(&self) -> Vec<MacroDefinition> {
        let mut macros = vec![
            MacroDefinition::with_value("__GNUC__", "4"),
            MacroDefinition::with_value("__GNUC_MINOR__", "9"),
            MacroDefinition::with_value("__STDC__", "1"),
            MacroDefinition::with_value("__STDC_VERSION__", "201710L"),
            MacroDefinition::with_value("__STDC_HOSTED__", "1"),
            MacroDefinition::with_value("__CHAR_BIT__", "8"),
        ];
        macros.extend(self.os.predefined_macros());
        macros.extend(self.arch.predefined_macros());
        macros
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

/// A predefined macro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    pub value: String,
}

impl MacroDefinition {
    /// Create a macro that is simply defined (value `1`)
    pub fn defined(name: &str) -> Self {
        Self::with_value(name, "1")
    }

    /// Create a macro with a specific value
    pub fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Platform description errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unknown architecture: {0}")]
    UnknownArchitecture(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_x86_64_macros() {
        let platform = Platform {
            os: TargetOs::Linux,
            arch: Architecture::X86_64,
        };
        let macros = platform.predefined_macros();
        let has = |name: &str| macros.iter().any(|m| m.name == name);

        assert!(has("__linux__"));
        assert!(has("__x86_64__"));
        assert!(has("__LP64__"));
        assert!(has("__GNUC__"));
        assert!(!has("__cplusplus"));
        assert!(!has("_WIN32"));
    }

    #[test]
    fn test_wordsize_follows_pointer_width() {
        let value = |arch: Architecture| {
            arch.predefined_macros()
                .into_iter()
                .find(|m| m.name == "__WORDSIZE")
                .map(|m| m.value)
        };
        assert_eq!(value(Architecture::Arm64), Some("64".to_string()));
        assert_eq!(value(Architecture::I386), Some("32".to_string()));
    }

    #[test]
    fn test_architecture_from_str() {
        assert_eq!("aarch64".parse::<Architecture>().unwrap(), Architecture::Arm64);
        assert_eq!("AMD64".parse::<Architecture>().unwrap(), Architecture::X86_64);
        assert!("sparc".parse::<Architecture>().is_err());
        assert_eq!(Architecture::X86_64.multiarch_dir(), "x86_64-linux-gnu");
    }
}
