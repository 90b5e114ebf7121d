//! vt3kr command line client
//!
//! Connects the local terminal to an HP 3000 over a VT socket, a remote
//! login or a serial line.

use std::fs::{self, File};
use std::io;
use std::os::unix::io::{AsFd, AsRawFd};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use vt3kr::config::{default_config_path, SessionConfig};
use vt3kr::controller::{Controller, LoopExit};
use vt3kr::keyboard::BreakDetector;
use vt3kr::session_log::SessionLog;
use vt3kr::terminal::{is_tty, RawTerminal, TerminalOptions};
use vt3kr::translation::TranslationTable;
use vt3kr::{Channel, ConnectionKind, Endpoint, SessionOptions, VtConnection, VtSession};

/// Command line settings; everything but `debug` and `config` overrides the file
#[derive(Debug, Default, PartialEq)]
struct Cli {
    config: Option<PathBuf>,
    save_config: bool,
    debug: u8,
    help: bool,
    overrides: Vec<(String, Override)>,
}

#[derive(Debug, PartialEq)]
enum Override {
    Str(String),
    Int(i64),
    Bool(bool),
}

fn usage() -> &'static str {
    "Usage: vt3kr [-li|-lo|-lio] [-lp] [-f file] [-x] [-8] [-tt n] [-t]\n\
    \x20            [-C breakchar] [-B count] [-T timer] [-X file | --direct-table file]\n\
    \x20            [-a file | -I file] [-p port] [--tty | --rlogin [--user name]]\n\
    \x20            [--config file] [--save-config] [-d[d]] host\n\
    \n\
    \x20  -li|-lo|-lio       log input, output or both\n\
    \x20  -lp                prefix log entries with their direction\n\
    \x20  -f file            log destination [stdout]\n\
    \x20  -x                 disable xon/xoff flow control\n\
    \x20  -8                 8 data bits, no parity on the local terminal\n\
    \x20  -tt n              terminal type; 10 (default) sends DC1 read triggers\n\
    \x20  -t                 enable type-ahead\n\
    \x20  -C breakchar       use 'breakchar' (integer) as the break key [host's]\n\
    \x20  -B count           breaks needed for command mode [3]\n\
    \x20  -T timer           -B time window in seconds [1]\n\
    \x20  -X file            256-byte table, inbound defines outbound\n\
    \x20  --direct-table file  256-byte table applied to output only\n\
    \x20  -a file            read initial input from file\n\
    \x20  -I file            like -a, but stop when the file runs out\n\
    \x20  -p port            host port [1570]\n\
    \x20  --tty              host is 'device|speed|parity'\n\
    \x20  --rlogin           use remote login instead of VT\n\
    \x20  --user name        remote login user\n\
    \x20  --config file      configuration file [$VT3KR_CONFIG]\n\
    \x20  --save-config      write the effective settings back\n\
    \x20  -d[d]              debug (trace) logging\n\
    \x20  host               name or address of the HP 3000"
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut iter = args.iter();
    let set = |cli: &mut Cli, key: &str, value: Override| cli.overrides.push((key.to_string(), value));

    while let Some(arg) = iter.next() {
        let mut value = |name: &str| -> Result<String> {
            iter.next().cloned().ok_or_else(|| anyhow!("{} requires a value", name))
        };
        let int = |name: &str, text: String| -> Result<i64> {
            text.parse::<i64>().with_context(|| format!("{} requires a number, got '{}'", name, text))
        };
        match arg.as_str() {
            "-h" | "--help" => cli.help = true,
            "-d" => cli.debug = cli.debug.max(1),
            "-dd" => cli.debug = 2,
            "-lp" => set(&mut cli, "logging.prefix", Override::Bool(true)),
            flag if flag.starts_with("-l") && flag.len() > 2 => {
                let letters = &flag[2..];
                if !letters.chars().all(|c| c == 'i' || c == 'o' || c == 'p') {
                    bail!("unknown logging option {}", flag);
                }
                set(&mut cli, "logging.mask", Override::Str(letters.to_string()));
            }
            "-f" => set(&mut cli, "logging.file", Override::Str(value("-f")?)),
            "-x" => set(&mut cli, "terminal.disableXonXoff", Override::Bool(true)),
            "-8" => set(&mut cli, "terminal.eightBitNoParity", Override::Bool(true)),
            "-tt" => {
                let n = int("-tt", value("-tt")?)?;
                set(&mut cli, "terminal.type", Override::Int(n));
            }
            "-t" => set(&mut cli, "terminal.typeAhead", Override::Bool(true)),
            "-C" => {
                let n = int("-C", value("-C")?)?;
                set(&mut cli, "break.char", Override::Int(n));
            }
            "-B" => {
                let n = int("-B", value("-B")?)?;
                set(&mut cli, "break.count", Override::Int(n));
            }
            "-T" => {
                let n = int("-T", value("-T")?)?;
                set(&mut cli, "break.timerSeconds", Override::Int(n));
            }
            "-X" => {
                set(&mut cli, "translation.table", Override::Str(value("-X")?));
                set(&mut cli, "translation.mode", Override::Str("inbound".to_string()));
            }
            "--direct-table" => {
                set(&mut cli, "translation.table", Override::Str(value("--direct-table")?));
                set(&mut cli, "translation.mode", Override::Str("direct".to_string()));
            }
            "-a" | "-I" => {
                set(&mut cli, "input.file", Override::Str(value(arg)?));
                set(&mut cli, "input.stopAtEof", Override::Bool(arg == "-I"));
            }
            "-p" => {
                let n = int("-p", value("-p")?)?;
                set(&mut cli, "connection.port", Override::Int(n));
            }
            "--tty" => set(&mut cli, "connection.kind", Override::Str("tty".to_string())),
            "--rlogin" => set(&mut cli, "connection.kind", Override::Str("rlogin".to_string())),
            "--user" => set(&mut cli, "connection.rloginUser", Override::Str(value("--user")?)),
            "--config" => cli.config = Some(PathBuf::from(value("--config")?)),
            "--save-config" => cli.save_config = true,
            flag if flag.starts_with('-') => bail!("unknown option {}", flag),
            host => set(&mut cli, "connection.host", Override::Str(host.to_string())),
        }
    }
    Ok(cli)
}

fn apply(config: &mut SessionConfig, overrides: Vec<(String, Override)>) {
    for (key, value) in overrides {
        // -lp adds to whatever mask is in effect
        if key == "logging.prefix" {
            let mut mask = config.get_string_property_or("logging.mask", "");
            if !mask.contains('p') {
                mask.push('p');
            }
            config.set_property("logging.mask", mask);
            continue;
        }
        match value {
            Override::Str(s) => config.set_property(&key, s),
            Override::Int(i) => config.set_property(&key, i),
            Override::Bool(b) => config.set_property(&key, b),
        }
    }
}

fn init_logging(debug: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match debug {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn build_endpoint(config: &SessionConfig, kind: ConnectionKind) -> Result<Endpoint> {
    if kind != ConnectionKind::ProtocolSocket {
        return Ok(Endpoint::Raw(Box::new(io::stdout())));
    }

    let mut conn = VtConnection::new(config.buffer_size());
    if let Some(path) = config.translation_table() {
        let table = TranslationTable::load(&path, config.translation_mode()?)
            .with_context(|| format!("loading translation table {}", path.display()))?;
        conn.set_translation(Some(table));
    }

    let mask = config.log_mask()?;
    let log = if mask.is_empty() {
        SessionLog::disabled()
    } else {
        let file = config.log_file();
        SessionLog::open(mask, file.as_deref()).context("opening session log")?
    };

    let options = SessionOptions {
        term_type: config.term_type()?,
        type_ahead: config.get_boolean_property_or("terminal.typeAhead", false),
        stop_at_eof: config.get_boolean_property_or("input.stopAtEof", false),
    };
    let mut session = VtSession::new(conn, options, log, Box::new(io::stdout()));

    if let Some(path) = config.input_file() {
        let script = fs::read(&path).with_context(|| format!("reading input file {}", path.display()))?;
        session.preload(&script).context("input file does not fit the input queue")?;
    }
    Ok(Endpoint::Vt(Box::new(session)))
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = SessionConfig::load(&config_path)?;
    apply(&mut config, cli.overrides);
    config.validate()?;
    if cli.save_config {
        config.save()?;
    }

    let kind = config.connection_kind()?;
    let host = config.host()?;
    let endpoint = build_endpoint(&config, kind)?;
    let channel = Channel::connect(kind, &host, config.port()?, &config.rlogin_user(), endpoint)
        .with_context(|| format!("unable to connect to {}", host))?;

    let stdin_fd = io::stdin().as_raw_fd();
    let breaks = BreakDetector::new(config.break_char()?, config.break_count()?, config.break_timer()?);
    if is_tty(stdin_fd) && kind == ConnectionKind::ProtocolSocket {
        print!("{}\r\n", breaks.banner());
    }
    let terminal_options = TerminalOptions {
        eight_bit_no_parity: config.get_boolean_property_or("terminal.eightBitNoParity", false),
        disable_xon_xoff: config.get_boolean_property_or("terminal.disableXonXoff", false),
    };
    let terminal = RawTerminal::enter(stdin_fd, terminal_options).context("setting up the terminal")?;

    let input = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .map(File::from)
        .context("duplicating standard input")?;
    let mut controller = Controller::new(channel, input, Some(terminal), breaks);
    match controller.run()? {
        LoopExit::HostClosed => log::info!("Connection closed"),
        LoopExit::UserExit => log::info!("Exit requested"),
    }
    Ok(0)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("vt3kr: {:#}\n\n{}", err, usage());
            std::process::exit(2);
        }
    };
    if cli.help || args.is_empty() {
        println!("{}", usage());
        std::process::exit(if cli.help { 0 } else { 2 });
    }
    init_logging(cli.debug);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("vt3kr: {:#}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags_into_config() {
        let cli = parse_args(&args(&["-lio", "-lp", "-tt", "0", "-t", "-C", "25", "-I", "script.txt", "hp3k"])).unwrap();
        let mut config = SessionConfig::default();
        apply(&mut config, cli.overrides);
        assert_eq!(config.get_string_property_or("logging.mask", ""), "iop");
        assert_eq!(config.term_type().unwrap(), 0);
        assert!(config.get_boolean_property_or("terminal.typeAhead", false));
        assert_eq!(config.break_char().unwrap(), Some(25));
        assert!(config.get_boolean_property_or("input.stopAtEof", false));
        assert_eq!(config.host().unwrap(), "hp3k");
    }

    #[test]
    fn test_connection_kind_flags() {
        let cli = parse_args(&args(&["--rlogin", "--user", "mgr", "-p", "513", "hp3k"])).unwrap();
        let mut config = SessionConfig::default();
        apply(&mut config, cli.overrides);
        assert_eq!(config.connection_kind().unwrap(), ConnectionKind::RemoteLogin);
        assert_eq!(config.rlogin_user(), "mgr");
        assert_eq!(config.port().unwrap(), Some(513));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_args(&args(&["-p"])).is_err());
        assert!(parse_args(&args(&["-B", "many"])).is_err());
        assert!(parse_args(&args(&["-lq"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_debug_levels() {
        assert_eq!(parse_args(&args(&["-d", "h"])).unwrap().debug, 1);
        assert_eq!(parse_args(&args(&["-dd", "h"])).unwrap().debug, 2);
    }
}
