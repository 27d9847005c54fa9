/// Parsed command-line arguments: the one flag `pscatter-config`'s write
/// switch needs, plus everything else forwarded untouched to the backend
/// initializer. This façade never parses backend-specific flags
/// (`-device`, `-waitinitialize`, `-norefresh`, `-printf`, `-v`) — those are
/// the backend's own concern.
#[derive(Debug, Clone, Default)]
pub struct Cli {
    /// `true` if `--no-write` or `--read-only` was present.
    pub read_only: bool,
    /// Every other argument, in order, untouched.
    pub backend_args: Vec<String>,
}

/// Splits `--no-write`/`--read-only` out of `args`, forwarding the rest.
/// Applies [`pscatter_config::WriteGate::global`] as a side effect when the
/// read-only flag is present, since that switch is consulted by the engine
/// itself and cannot be deferred to the backend.
pub fn parse_args(args: impl IntoIterator<Item = String>) -> Cli {
    let mut cli = Cli::default();
    for arg in args {
        match arg.as_str() {
            "--no-write" | "--read-only" => {
                cli.read_only = true;
            }
            _ => cli.backend_args.push(arg),
        }
    }
    if cli.read_only {
        pscatter_config::WriteGate::global().set_enabled(false);
    }
    cli
}
