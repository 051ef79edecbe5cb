//! Human-readable error descriptions and structured JSON error formatting.

/// Full error chain, outermost first, joined with ": ".
fn chain_text(err: &eyre::Report) -> String {
    err.chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

/// Coarse classification shared by the exit code and the JSON `reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Telemetry,
    State,
    Build,
    Usage,
    Other,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Config => "Config",
            Self::Telemetry => "Telemetry",
            Self::State => "State",
            Self::Build => "Build",
            Self::Usage => "Usage",
            Self::Other => "Error",
        }
    }
}

pub fn classify(err: &eyre::Report) -> ErrorKind {
    if err.downcast_ref::<soc_core::error::BuildError>().is_some() {
        return ErrorKind::Build;
    }
    let lower = chain_text(err).to_ascii_lowercase();
    if lower.starts_with("--") {
        ErrorKind::Usage
    } else if lower.contains("config") || lower.starts_with("estimator.") {
        ErrorKind::Config
    } else if lower.contains("telemetry") || lower.contains("csv") {
        ErrorKind::Telemetry
    } else if lower.contains("state file") {
        ErrorKind::State
    } else {
        ErrorKind::Other
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use soc_core::error::BuildError;

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource | BuildError::MissingCommand | BuildError::MissingStore => {
                format!(
                    "What happened: The estimator could not be assembled ({be}).\nLikely causes: An adapter failed to initialize.\nHow to fix: Re-run with --log-level=debug and check the adapter setup."
                )
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `socx health`."
            ),
        };
    }

    let msg = chain_text(err);
    let lower = msg.to_ascii_lowercase();

    if lower.contains("telemetry csv must have headers") {
        return "Invalid headers in telemetry CSV. Expected 'timestamp,soc,is_charging,ignition_on,charging_level,time_to_full_l2,time_to_full_l3'.".to_string();
    }
    if lower.contains("time order") {
        return format!(
            "What happened: Telemetry rows are out of order.\nHow to fix: Sort the CSV by timestamp. Detail: {msg}"
        );
    }

    match classify(err) {
        ErrorKind::Config => format!(
            "What happened: Configuration is invalid or unreadable.\nDetail: {msg}\nHow to fix: Edit the TOML config (see etc/socx.toml) and run `socx health`."
        ),
        ErrorKind::Telemetry => format!(
            "What happened: The telemetry recording could not be read.\nDetail: {msg}\nHow to fix: Check the file path and the CSV contents."
        ),
        ErrorKind::State => format!(
            "What happened: The state file could not be used.\nDetail: {msg}\nHow to fix: Check the path; a corrupt file can be deleted to start fresh."
        ),
        ErrorKind::Usage => format!("Invalid argument: {msg}"),
        ErrorKind::Build | ErrorKind::Other => format!(
            "Something went wrong: {msg}\nHow to fix: Re-run with --log-level=debug for details."
        ),
    }
}

/// Stable exit codes; 2 stays reserved for argument parsing errors.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match classify(err) {
        ErrorKind::Usage => 2,
        ErrorKind::Config => 3,
        ErrorKind::Telemetry => 4,
        ErrorKind::State => 5,
        ErrorKind::Build => 6,
        ErrorKind::Other => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": classify(err).name(),
        "message": humanize(err),
    })
    .to_string()
}
