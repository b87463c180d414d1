// -------------------------------------------------------------------------------------------------
// ---- LogLevel -----------------------------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ---- AuthMode -----------------------------------------------------------------------------------

/// How principals are established. `None` trusts whatever the client claims;
/// `Strong` verifies against the users file and unlocks delegation tokens.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Strong,
}

impl AuthMode {
    pub fn is_strong(self) -> bool {
        matches!(self, AuthMode::Strong)
    }
}

// -------------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------
