// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions,
//! reduced to the conditions this service can actually hit:
//!
//! - **0**: success
//! - **1**: general error
//! - **64**: command line usage error
//! - **65**: data error (malformed configuration)
//! - **69**: unavailable (database unreachable at startup)
//! - **70**: internal software error (barrier corruption, unseal failure)
//! - **78**: configuration rejected

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    UsageError = 64,

    /// Data format error (65)
    DataError = 65,

    /// Service unavailable (69): persistence unreachable at startup
    Unavailable = 69,

    /// Internal software error (70): unseal failure, hierarchy corruption
    Software = 70,

    /// Configuration error (78)
    ConfigError = 78,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Terminate the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self.as_i32())
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitCode::Success => "success",
            ExitCode::Error => "error",
            ExitCode::UsageError => "usage error",
            ExitCode::DataError => "data error",
            ExitCode::Unavailable => "unavailable",
            ExitCode::Software => "internal software error",
            ExitCode::ConfigError => "configuration error",
        };
        write!(f, "{} ({})", name, self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_sysexits() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::UsageError.as_i32(), 64);
        assert_eq!(ExitCode::ConfigError.as_i32(), 78);
        assert_eq!(ExitCode::Software.as_i32(), 70);
    }
}
